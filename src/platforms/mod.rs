pub mod jira;
pub mod tapd;
pub mod zentao;

use async_trait::async_trait;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{
    CanonicalField, FieldOption, KnownRecord, RecordDraft, RecordHandle, StatusOption, SyncBatch,
    SyncOutcome,
};
use crate::sync::CreatedCutoff;
use crate::tasks::TaskQueue;

/// Which option list a searchable field loads. Adapters dispatch on this
/// enum through a match, never through a method name looked up at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Users,
    Assignable,
    Sprints,
    Epics,
    IssueLinks,
    LinkTypes,
    Builds,
}

/// Host-facing surface of one tracker adapter.
///
/// The primary write of `add_record`/`update_record` is synchronous; the
/// returned handle carries the remote id and resolved status before any
/// best-effort side work (attachment churn, link rewiring, transition
/// application) runs on [`background`](TrackerPlatform::background).
#[async_trait]
pub trait TrackerPlatform: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap authenticated call proving the integration credentials work.
    async fn validate_integration(&self) -> Result<()>;

    fn supports_default_template(&self) -> bool {
        true
    }

    fn supports_attachments(&self) -> bool {
        true
    }

    /// Normalized custom-field template for the configured project and
    /// issue type.
    async fn default_template_fields(&self) -> Result<Vec<CanonicalField>>;

    async fn add_record(&self, draft: RecordDraft) -> Result<RecordHandle>;

    async fn update_record(&self, remote_id: &str, draft: RecordDraft) -> Result<RecordHandle>;

    async fn delete_record(&self, remote_id: &str) -> Result<()>;

    /// Per-id fetch of known records; remote 404s surface as deleted ids.
    async fn sync_incremental(&self, known: Vec<KnownRecord>) -> Result<SyncOutcome>;

    /// Pages through every remote record, invoking `emit` once per page.
    /// `emit` completes before the next page is fetched.
    async fn sync_full(
        &self,
        cutoff: Option<CreatedCutoff>,
        emit: &mut (dyn FnMut(SyncBatch) -> Result<()> + Send),
    ) -> Result<()>;

    /// Statuses selectable from `current`, or for a new record when `None`.
    async fn resolve_status_options(&self, current: Option<&str>) -> Result<Vec<StatusOption>>;

    /// Option list for a searchable field.
    async fn load_options(&self, kind: OptionKind, query: &str) -> Result<Vec<FieldOption>>;

    /// Queue holding this adapter's pending background side effects; tests
    /// drain it to make them deterministic.
    fn background(&self) -> &TaskQueue;
}

#[cfg(test)]
pub mod tests;

/// Builds one adapter per configured tracker section.
pub fn create_platforms(config: &SyncConfig) -> Vec<Box<dyn TrackerPlatform>> {
    let mut platforms: Vec<Box<dyn TrackerPlatform>> = Vec::new();

    if let Some(cfg) = &config.jira {
        platforms.push(Box::new(jira::JiraPlatform::new(cfg.clone())));
    }
    if let Some(cfg) = &config.tapd {
        platforms.push(Box::new(tapd::TapdPlatform::new(cfg.clone())));
    }
    if let Some(cfg) = &config.zentao {
        platforms.push(Box::new(zentao::ZentaoPlatform::new(cfg.clone())));
    }

    platforms
}
