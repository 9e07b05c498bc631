//! Tapd-style adapter: form-encoded writes, html rich text rebased onto the
//! host URL, step-table workflow, page/limit paging with a 200-record cap.
//!
//! The tracker API supports neither attachment upload nor record deletion;
//! the corresponding capability flags are off and images travel exclusively
//! through rich-text links.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};

use super::{OptionKind, TrackerPlatform};
use crate::config::TapdConfig;
use crate::error::{Error, Result};
use crate::model::{
    CanonicalField, FieldOption, FieldType, FieldValue, KnownRecord, RecordDraft, RecordHandle,
    StatusOption, SyncBatch, SyncOutcome, SyncRecord,
};
use crate::richtext::html;
use crate::status::{self, Resolution, StepEdge, TransitionModel};
use crate::sync::{self, CreatedCutoff, Page};
use crate::tasks::TaskQueue;
use crate::transport::{HttpTransport, Transport, TransportRequest};

const PAGE_SIZE: u64 = 200;
const SYSTEM_BUG: &str = "bug";
const CUSTOM_FIELD_PREFIX: &str = "custom_field_";
const HANDLE_USER_FIELD: &str = "current_owner";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct TapdPlatform {
    transport: Arc<dyn Transport>,
    address: String,
    host_address: String,
    workspace_id: String,
    background: TaskQueue,
}

impl TapdPlatform {
    pub fn new(config: TapdConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::basic(
            &config.account,
            &config.password,
        ));
        Self::with_transport(transport, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: TapdConfig) -> Self {
        Self {
            transport,
            address: config.address.trim_end_matches('/').to_string(),
            host_address: config.host_address.trim_end_matches('/').to_string(),
            workspace_id: config.workspace_id,
            background: TaskQueue::new(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    /// Every list endpoint wraps each row as `{"Bug": {...}}`; this peels
    /// the envelope off.
    async fn bug_page(&self, page: u64, limit: u64) -> Result<Vec<Value>> {
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api("/bugs"))
                    .query("workspace_id", &self.workspace_id)
                    .query("page", page.to_string())
                    .query("limit", limit.to_string()),
            )
            .await?;
        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("Bug").cloned())
            .collect())
    }

    async fn workflow_map(&self, path: &str) -> Result<HashMap<String, String>> {
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api(path))
                    .query("system", SYSTEM_BUG)
                    .query("workspace_id", &self.workspace_id),
            )
            .await?;
        let map = value
            .get("data")
            .and_then(Value::as_object)
            .map(|data| {
                data.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(map)
    }

    async fn workflow_model(&self) -> Result<TransitionModel> {
        let first = self
            .workflow_map("/workflows/first_step")
            .await?
            .into_iter()
            .next()
            .map(|(id, label)| StatusOption::new(id, label));
        let labels = self.workflow_map("/workflows/status_map").await?;
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api("/workflows/all_transitions"))
                    .query("system", SYSTEM_BUG)
                    .query("workspace_id", &self.workspace_id),
            )
            .await?;
        let steps = value
            .get("data")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        Some(StepEdge {
                            previous: row.get("step_previous")?.as_str()?.to_string(),
                            next: row.get("step_next")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(TransitionModel::Steps { first, steps, labels })
    }

    /// Temporary download URL for a tracker-local (`/tfl/…`) image.
    async fn image_download_url(&self, image_path: &str) -> Result<Option<String>> {
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api("/files/down"))
                    .query("workspace_id", &self.workspace_id)
                    .query("file_path", image_path),
            )
            .await?;
        Ok(value
            .pointer("/data/Attachment/download_url")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn build_params(&self, draft: &RecordDraft, handle: &mut RecordHandle) -> (Vec<(String, String)>, Option<String>) {
        let mut params = Vec::new();
        let mut requested_status = None;
        params.push(("title".to_string(), draft.title.clone()));
        if let Some(description) = &draft.description {
            let translated = html::from_canonical(description, &self.host_address);
            handle.description = Some(translated.canonical);
            params.push(("description".to_string(), translated.remote));
        }
        for field in &draft.custom_fields {
            let Some(value) = &field.value else { continue };
            let Some(text) = value.as_text() else { continue };
            if text.is_empty() {
                continue;
            }
            if field.id == "status" {
                requested_status = Some(text.to_string());
                continue;
            }
            if field.id == HANDLE_USER_FIELD {
                handle.handle_user = Some(text.to_string());
            }
            params.push((field.id.clone(), text.to_string()));
        }
        (params, requested_status)
    }

    async fn write_bug(&self, params: Vec<(String, String)>) -> Result<String> {
        let mut request = TransportRequest::post(self.api("/bugs"));
        for (key, value) in params {
            request = request.form(key, value);
        }
        request = request.form("workspace_id", self.workspace_id.clone());
        let value = self.transport.request(request).await?;
        value
            .pointer("/data/Bug/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Transport("bug write returned no id".into()))
    }

    async fn translate_bug(&self, bug: &Value) -> SyncRecord {
        let text = |key: &str| {
            bug.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let mut record = SyncRecord::new(text("id"));
        record.title = text("title");
        record.status = text("status");
        record.handle_user = text(HANDLE_USER_FIELD).replace(';', "");
        record.created_at = parse_local_millis(&text("created"));
        record.updated_at = parse_local_millis(&text("modified"));

        let description = text("description");
        if !description.is_empty() {
            let mut resolved = HashMap::new();
            for source in html::tracker_image_sources(&description) {
                match self.image_download_url(&source).await {
                    Ok(Some(url)) => {
                        resolved.insert(source, url);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%err, source, "image download url unavailable"),
                }
            }
            let translated = html::to_canonical(&description, &resolved);
            record.description = Some(translated.canonical);
            record.pending_downloads = translated.pending_downloads;
        }

        if let Some(map) = bug.as_object() {
            for (key, value) in map {
                if !key.starts_with(CUSTOM_FIELD_PREFIX) {
                    continue;
                }
                let Some(text) = value.as_str().filter(|t| !t.is_empty()) else {
                    continue;
                };
                record.custom_fields.push(
                    CanonicalField::new(key, key, FieldType::Input)
                        .with_value(FieldValue::text(text)),
                );
            }
        }
        record
    }
}

fn parse_local_millis(raw: &str) -> i64 {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map(|stamp| stamp.and_utc().timestamp_millis())
        .unwrap_or_default()
}

#[async_trait]
impl TrackerPlatform for TapdPlatform {
    fn name(&self) -> &str {
        "tapd"
    }

    async fn validate_integration(&self) -> Result<()> {
        self.transport
            .request(TransportRequest::get(self.api("/quickstart/testauth")))
            .await
            .map(|_| ())
    }

    fn supports_default_template(&self) -> bool {
        false
    }

    fn supports_attachments(&self) -> bool {
        false
    }

    async fn default_template_fields(&self) -> Result<Vec<CanonicalField>> {
        Ok(Vec::new())
    }

    async fn add_record(&self, draft: RecordDraft) -> Result<RecordHandle> {
        let mut handle = RecordHandle::default();
        let (mut params, requested_status) = self.build_params(&draft, &mut handle);
        if let Some(requested) = &requested_status {
            let model = self.workflow_model().await?;
            if let Resolution::Apply { handle: status } = status::resolve(&model, requested) {
                params.push(("status".to_string(), status.clone()));
                handle.status = Some(status);
            }
        }
        handle.remote_id = self.write_bug(params).await?;
        Ok(handle)
    }

    async fn update_record(&self, remote_id: &str, draft: RecordDraft) -> Result<RecordHandle> {
        let mut handle = RecordHandle::default();
        let (mut params, requested_status) = self.build_params(&draft, &mut handle);
        params.push(("id".to_string(), remote_id.to_string()));
        if let Some(status) = &requested_status {
            params.push(("status".to_string(), status.clone()));
            handle.status = Some(status.clone());
        }
        self.write_bug(params).await?;
        handle.remote_id = remote_id.to_string();
        Ok(handle)
    }

    async fn delete_record(&self, remote_id: &str) -> Result<()> {
        // The public API has no delete endpoint.
        debug!(remote_id, "tapd does not support record deletion");
        Ok(())
    }

    /// The list endpoint has no per-id fetch worth using; the whole project
    /// is paged once and known records are matched against it, with misses
    /// reported as deletions.
    async fn sync_incremental(&self, known: Vec<KnownRecord>) -> Result<SyncOutcome> {
        let mut remote: HashMap<String, Value> = HashMap::new();
        sync::page_numbers(
            PAGE_SIZE,
            |page, limit| async move {
                Ok(Page {
                    items: self.bug_page(page, limit).await?,
                    total_pages: None,
                })
            },
            |bugs| {
                for bug in bugs {
                    if let Some(id) = bug.get("id").and_then(Value::as_str) {
                        remote.insert(id.to_string(), bug);
                    }
                }
                Ok(())
            },
        )
        .await?;

        let mut outcome = SyncOutcome::default();
        for record in known {
            match remote.get(&record.remote_id) {
                Some(bug) => outcome.updated.push(self.translate_bug(bug).await),
                None => outcome.deleted_ids.push(record.host_id),
            }
        }
        Ok(outcome)
    }

    async fn sync_full(
        &self,
        cutoff: Option<CreatedCutoff>,
        emit: &mut (dyn FnMut(SyncBatch) -> Result<()> + Send),
    ) -> Result<()> {
        sync::page_numbers(
            PAGE_SIZE,
            |page, limit| async move {
                let bugs = self.bug_page(page, limit).await?;
                let mut records = Vec::with_capacity(bugs.len());
                for bug in &bugs {
                    records.push(self.translate_bug(bug).await);
                }
                Ok(Page { items: records, total_pages: None })
            },
            |records| {
                let mut batch = SyncBatch::default();
                for record in records {
                    batch.observed_ids.push(record.remote_id.clone());
                    if let Some(cutoff) = &cutoff {
                        if !cutoff.admits(record.created_at) {
                            continue;
                        }
                    }
                    batch.records.push(record);
                }
                emit(batch)
            },
        )
        .await
        .map(|total| debug!(total, "full sync finished"))
    }

    async fn resolve_status_options(&self, current: Option<&str>) -> Result<Vec<StatusOption>> {
        let model = self.workflow_model().await?;
        Ok(status::status_options(&model, current))
    }

    async fn load_options(&self, kind: OptionKind, _query: &str) -> Result<Vec<FieldOption>> {
        match kind {
            OptionKind::Users => {
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/workspaces/users"))
                            .query("workspace_id", &self.workspace_id),
                    )
                    .await?;
                let users = value
                    .get("data")
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| {
                                row.pointer("/UserWorkspace/user")
                                    .and_then(Value::as_str)
                                    .map(|user| FieldOption::new(user, user))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(users)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn background(&self) -> &TaskQueue {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn request(&self, _req: TransportRequest) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn platform() -> TapdPlatform {
        TapdPlatform::with_transport(
            Arc::new(NullTransport),
            TapdConfig {
                address: "https://api.tapd.cn".into(),
                account: "api-user".into(),
                password: "api-token".into(),
                workspace_id: "41000001".into(),
                host_address: "https://host.example/".into(),
            },
        )
    }

    #[test]
    fn build_params_peels_status_and_owner() {
        let draft = RecordDraft {
            title: "crash on save".into(),
            description: Some("steps".into()),
            custom_fields: vec![
                CanonicalField::new("status", "Status", FieldType::Select)
                    .with_value(FieldValue::text("in_progress")),
                CanonicalField::new(HANDLE_USER_FIELD, "Owner", FieldType::Select)
                    .with_value(FieldValue::text("alice")),
                CanonicalField::new("severity", "Severity", FieldType::Select)
                    .with_value(FieldValue::text("fatal")),
                CanonicalField::new("custom_field_1", "Env", FieldType::Input),
            ],
            ..RecordDraft::default()
        };
        let mut handle = RecordHandle::default();
        let (params, status) = platform().build_params(&draft, &mut handle);

        assert_eq!(status.as_deref(), Some("in_progress"));
        assert_eq!(handle.handle_user.as_deref(), Some("alice"));
        assert!(!params.iter().any(|(k, _)| k == "status"));
        assert!(params.contains(&("severity".to_string(), "fatal".to_string())));
        // valueless fields stay off the wire
        assert!(!params.iter().any(|(k, _)| k == "custom_field_1"));
        assert_eq!(params[0], ("title".to_string(), "crash on save".to_string()));
    }

    #[test]
    fn build_params_rebases_description_onto_host() {
        let draft = RecordDraft {
            title: "t".into(),
            description: Some(
                "<img src=\"/bug/attachment/preview/md/p/f/true\" permalinksrc=\"/bug/attachment/preview/md/p/f/true\">".into(),
            ),
            ..RecordDraft::default()
        };
        let mut handle = RecordHandle::default();
        let (params, _) = platform().build_params(&draft, &mut handle);
        let description = &params
            .iter()
            .find(|(k, _)| k == "description")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        assert!(description.contains("https://host.example/bug/attachment/preview/md"));
        assert!(handle.description.is_some());
    }

    #[test]
    fn timestamps_parse_as_epoch_millis() {
        assert_eq!(parse_local_millis("1970-01-01 00:00:01"), 1000);
        assert_eq!(parse_local_millis("not a time"), 0);
    }
}
