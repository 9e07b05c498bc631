use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::field::CanonicalField;
use crate::files::LocalFile;

/// Attachment pointer on a synchronized record. `file_name` is used for
/// de-duplication on the host side, `file_key` to fetch the content later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_name: String,
    pub file_key: String,
}

/// Canonical normalized issue produced by a sync pass. Handed to the host
/// callback and then discarded; the host owns persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub remote_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub handle_user: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub custom_fields: Vec<CanonicalField>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Rich-text images the host must download and re-host, keyed by a
    /// synthetic host-side file id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pending_downloads: HashMap<String, String>,
}

impl SyncRecord {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: String::new(),
            description: None,
            handle_user: String::new(),
            status: String::new(),
            created_at: 0,
            updated_at: 0,
            custom_fields: Vec::new(),
            attachments: Vec::new(),
            pending_downloads: HashMap::new(),
        }
    }
}

/// A host record previously synchronized from the tracker; input to
/// incremental sync.
#[derive(Debug, Clone)]
pub struct KnownRecord {
    /// Host-side record id, reported back in `deleted_ids`.
    pub host_id: String,
    pub remote_id: String,
}

/// One page of full-sync output: the translated records plus their
/// attachment lists keyed by remote id, and every remote id observed on the
/// page (referenced or not) so the host can compute deletions by set
/// difference.
#[derive(Debug, Default)]
pub struct SyncBatch {
    pub records: Vec<SyncRecord>,
    pub attachment_map: HashMap<String, Vec<AttachmentRef>>,
    pub observed_ids: Vec<String>,
}

/// Result of an incremental sync pass.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub updated: Vec<SyncRecord>,
    /// Host ids whose remote counterpart returned 404.
    pub deleted_ids: Vec<String>,
    pub attachment_map: HashMap<String, Vec<AttachmentRef>>,
}

/// Input to add/update: title, description and custom-field values in
/// canonical form, plus the local temp files referenced by rich-text bodies.
#[derive(Debug, Default)]
pub struct RecordDraft {
    pub title: String,
    pub description: Option<String>,
    pub custom_fields: Vec<CanonicalField>,
    /// Local file reference id -> staged file; consumed by the transcoder.
    pub rich_files: HashMap<String, LocalFile>,
}

/// Outcome of the primary create/update call. Returned before any
/// background side-effect work runs.
#[derive(Debug, Clone, Default)]
pub struct RecordHandle {
    pub remote_id: String,
    /// Status actually applied (transition id, or the unchanged previous
    /// status when no transition matched).
    pub status: Option<String>,
    pub handle_user: Option<String>,
    /// Description after translation, echoed back so the host can persist
    /// the canonical form with synchronized image references.
    pub description: Option<String>,
    /// Per-field canonical markup after translation, keyed by field id.
    pub rich_field_map: HashMap<String, String>,
}

/// Option item for status dropdowns and form selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub id: String,
    pub label: String,
}

impl StatusOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}
