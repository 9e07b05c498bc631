//! Zentao-style adapter: token REST API with JSON bodies, markdown rich
//! text, a flat three-state workflow whose terminal statuses require
//! companion date fields, and page-numbered listing with a reported page
//! total.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{OptionKind, TrackerPlatform};
use crate::config::ZentaoConfig;
use crate::error::{Error, Result};
use crate::model::{
    AttachmentRef, CanonicalField, FieldOption, FieldType, FieldValue, KnownRecord, RecordDraft,
    RecordHandle, StatusOption, SyncBatch, SyncOutcome, SyncRecord,
};
use crate::richtext::markdown;
use crate::status;
use crate::sync::{self, CreatedCutoff, Page};
use crate::transport::{HttpTransport, Transport, TransportRequest};
use crate::tasks::TaskQueue;
use std::sync::Arc;

const PAGE_SIZE: u64 = 200;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NULL_DATE_PREFIX: &str = "0000-00-00";
const DEFAULT_BUILD: &str = "trunk";
const BUILD_FIELD: &str = "openedBuild";

/// Flat statuses the tracker exposes; there is no transition graph.
const STATUSES: [(&str, &str); 3] =
    [("active", "Active"), ("resolved", "Resolved"), ("closed", "Closed")];

pub struct ZentaoPlatform {
    transport: Arc<dyn Transport>,
    address: String,
    product: String,
    project: Option<String>,
    background: TaskQueue,
}

/// One bug lifted off a list page, before project scoping and the created
/// cutoff are applied.
struct FetchedBug {
    record: SyncRecord,
    attachments: Vec<AttachmentRef>,
    in_scope: bool,
}

impl ZentaoPlatform {
    pub fn new(config: ZentaoConfig) -> Self {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::basic(&config.account, &config.password));
        Self::with_transport(transport, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: ZentaoConfig) -> Self {
        let (product, project) = config.product_project();
        let product = product.to_string();
        let project = project.map(str::to_string);
        Self {
            transport,
            address: config.address.trim_end_matches('/').to_string(),
            product,
            project,
            background: TaskQueue::new(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api.php/v1{path}", self.address)
    }

    /// Host-side proxy path for a tracker-relative file, so the browser
    /// never needs tracker credentials.
    fn proxy_path(&self, path: &str) -> String {
        format!(
            "/resource/md/get/path?platform=zentao&path={}",
            urlencoding::encode(path)
        )
    }

    async fn bug_detail(&self, remote_id: &str) -> Result<Value> {
        self.transport
            .request(TransportRequest::get(self.api(&format!("/bugs/{remote_id}"))))
            .await
    }

    async fn upload_file(&self, path: &std::path::Path) -> Result<String> {
        let value = self
            .transport
            .request(TransportRequest::post(self.api("/files")).upload(path))
            .await?;
        value
            .get("id")
            .and_then(value_as_string)
            .or_else(|| {
                // Older deployments answer with `{"data": {"<id>": "<title>"}}`.
                value
                    .get("data")
                    .and_then(Value::as_object)
                    .and_then(|data| data.keys().next().cloned())
            })
            .ok_or_else(|| Error::Transport("file upload returned no id".into()))
    }

    /// Uploads the local images a markdown body references and translates
    /// the body to the tracker form.
    async fn translate_description(
        &self,
        draft: &RecordDraft,
        handle: &mut RecordHandle,
    ) -> Result<Option<String>> {
        let Some(description) = &draft.description else {
            return Ok(None);
        };
        let mut uploaded = HashMap::new();
        for name in markdown::local_refs(description) {
            let Some(file) = draft.rich_files.get(&name) else {
                continue;
            };
            match self.upload_file(&file.path).await {
                Ok(id) => {
                    uploaded.insert(name, id);
                }
                Err(err) => warn!(%err, name, "image upload failed"),
            }
        }
        handle.description = Some(description.clone());
        let remote = markdown::from_canonical(description, &uploaded).replace('\n', "<br/>");
        Ok(Some(remote))
    }

    async fn build_body(
        &self,
        draft: &RecordDraft,
        handle: &mut RecordHandle,
    ) -> Result<Map<String, Value>> {
        let mut body = Map::new();
        body.insert("product".into(), Value::String(self.product.clone()));
        if let Some(project) = &self.project {
            body.insert("project".into(), Value::String(project.clone()));
        }
        body.insert("title".into(), Value::String(draft.title.clone()));
        if let Some(steps) = self.translate_description(draft, handle).await? {
            body.insert("steps".into(), Value::String(steps));
        }

        let mut requested_status = None;
        for field in &draft.custom_fields {
            let Some(value) = &field.value else { continue };
            if value.is_empty() {
                continue;
            }
            if field.id == "status" {
                requested_status = value.as_text().map(str::to_string);
                continue;
            }
            if field.id == "assignedTo" {
                handle.handle_user = value.as_text().map(str::to_string);
            }
            match value {
                FieldValue::List { values } => {
                    body.insert(field.id.clone(), json!(values));
                }
                _ => {
                    if let Some(text) = value.as_text() {
                        body.insert(field.id.clone(), Value::String(text.to_string()));
                    }
                }
            }
        }

        // The tracker rejects a bug without an affected build.
        if !body.contains_key(BUILD_FIELD) {
            body.insert(BUILD_FIELD.into(), json!([DEFAULT_BUILD]));
        }

        if let Some(requested) = requested_status {
            let now = Local::now().format(TIME_FORMAT).to_string();
            let has_resolution = body.contains_key("resolution");
            for (key, value) in status::terminal_companions(&requested, &now, has_resolution) {
                body.insert(key, Value::String(value));
            }
            handle.status = Some(requested.clone());
            body.insert("status".into(), Value::String(requested));
        }
        Ok(body)
    }

    fn translate_bug(&self, bug: &Value) -> SyncRecord {
        let text = |key: &str| {
            bug.get(key).and_then(value_as_string).unwrap_or_default()
        };
        let mut record = SyncRecord::new(text("id"));
        record.title = text("title");
        record.status = text("status");
        if text("deleted") == "1" {
            record.status = "DELETE".into();
        }
        record.handle_user = text("assignedTo");
        record.created_at = parse_date(&text("openedDate"));
        record.updated_at = parse_date(&text("lastEditedDate"));

        let steps = text("steps");
        if !steps.is_empty() {
            record.description =
                Some(markdown::to_canonical(&steps, |path| self.proxy_path(path)));
        }

        for key in ["severity", "pri", "resolution"] {
            let value = text(key);
            if !value.is_empty() {
                record.custom_fields.push(
                    CanonicalField::new(key, key, FieldType::Select)
                        .with_value(FieldValue::text(value)),
                );
            }
        }
        let builds = text(BUILD_FIELD);
        if !builds.is_empty() {
            record.custom_fields.push(
                CanonicalField::new(BUILD_FIELD, BUILD_FIELD, FieldType::MultiSelect).with_value(
                    FieldValue::List {
                        values: builds.split(',').map(str::to_string).collect(),
                    },
                ),
            );
        }
        record
    }

    async fn fetch_bug(&self, bug: &Value) -> FetchedBug {
        let record = self.translate_bug(bug);
        let in_scope = match &self.project {
            Some(project) => {
                bug.get("project").and_then(value_as_string).as_deref() == Some(project)
            }
            None => true,
        };
        let attachments = if in_scope {
            match self.bug_detail(&record.remote_id).await {
                Ok(detail) => attachment_refs(&detail),
                Err(err) => {
                    warn!(remote_id = %record.remote_id, %err, "bug detail unavailable");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        FetchedBug { record, attachments, in_scope }
    }

    async fn bug_page(&self, page: u64, limit: u64) -> Result<(Vec<Value>, Option<u64>)> {
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api(&format!("/products/{}/bugs", self.product)))
                    .query("page", page.to_string())
                    .query("limit", limit.to_string()),
            )
            .await?;
        let bugs = match value.get("bugs") {
            Some(Value::Array(items)) => items.clone(),
            // Some deployments key the list by bug id.
            Some(Value::Object(map)) => map.values().cloned().collect(),
            _ => Vec::new(),
        };
        let total_pages = value.pointer("/pager/pageTotal").and_then(Value::as_u64);
        Ok((bugs, total_pages))
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `files` on a bug detail is an empty array when there are none, otherwise
/// a map of file id to metadata.
fn attachment_refs(detail: &Value) -> Vec<AttachmentRef> {
    let Some(files) = detail.get("files").and_then(Value::as_object) else {
        return Vec::new();
    };
    files
        .iter()
        .filter_map(|(file_id, info)| {
            info.get("title").and_then(Value::as_str).map(|title| AttachmentRef {
                file_name: title.to_string(),
                file_key: file_id.clone(),
            })
        })
        .collect()
}

fn parse_date(raw: &str) -> i64 {
    if raw.is_empty() || raw.starts_with(NULL_DATE_PREFIX) {
        return 0;
    }
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map(|stamp| stamp.and_utc().timestamp_millis())
        .unwrap_or_default()
}

#[async_trait]
impl TrackerPlatform for ZentaoPlatform {
    fn name(&self) -> &str {
        "zentao"
    }

    async fn validate_integration(&self) -> Result<()> {
        let path = match &self.project {
            Some(project) => format!("/projects/{project}"),
            None => format!("/products/{}", self.product),
        };
        let value = self
            .transport
            .request(TransportRequest::get(self.api(&path)))
            .await?;
        if value.get("error").is_some() {
            return Err(Error::Config("zentao product or project does not exist".into()));
        }
        Ok(())
    }

    fn supports_default_template(&self) -> bool {
        false
    }

    async fn default_template_fields(&self) -> Result<Vec<CanonicalField>> {
        Ok(Vec::new())
    }

    async fn add_record(&self, draft: RecordDraft) -> Result<RecordHandle> {
        let mut handle = RecordHandle::default();
        let body = self.build_body(&draft, &mut handle).await?;
        let value = self
            .transport
            .request(
                TransportRequest::post(self.api(&format!("/products/{}/bugs", self.product)))
                    .json(Value::Object(body)),
            )
            .await?;
        handle.remote_id = value
            .get("id")
            .and_then(value_as_string)
            .ok_or_else(|| Error::Transport("bug create returned no id".into()))?;
        if handle.status.is_none() {
            handle.status = value.get("status").and_then(value_as_string);
        }
        Ok(handle)
    }

    async fn update_record(&self, remote_id: &str, draft: RecordDraft) -> Result<RecordHandle> {
        let mut handle = RecordHandle::default();
        let body = self.build_body(&draft, &mut handle).await?;
        self.transport
            .request(
                TransportRequest::put(self.api(&format!("/bugs/{remote_id}")))
                    .json(Value::Object(body)),
            )
            .await?;
        handle.remote_id = remote_id.to_string();
        Ok(handle)
    }

    async fn delete_record(&self, remote_id: &str) -> Result<()> {
        self.transport
            .request(TransportRequest::delete(self.api(&format!("/bugs/{remote_id}"))))
            .await
            .map(|_| ())
    }

    async fn sync_incremental(&self, known: Vec<KnownRecord>) -> Result<SyncOutcome> {
        let (updated, deleted_ids) = sync::fetch_known(known, |remote_id| async move {
            self.bug_detail(&remote_id).await
        })
        .await;

        let mut outcome = SyncOutcome::default();
        outcome.deleted_ids = deleted_ids;
        for (record, detail) in updated {
            let translated = self.translate_bug(&detail);
            outcome
                .attachment_map
                .insert(record.remote_id.clone(), attachment_refs(&detail));
            outcome.updated.push(translated);
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
                let (bugs, total_pages) = self.bug_page(page, limit).await?;
                let mut items = Vec::with_capacity(bugs.len());
                for bug in &bugs {
                    items.push(self.fetch_bug(bug).await);
                }
                Ok(Page { items, total_pages })
            },
            |fetched| {
                let mut batch = SyncBatch::default();
                for bug in fetched {
                    if !bug.in_scope {
                        continue;
                    }
                    batch.observed_ids.push(bug.record.remote_id.clone());
                    if let Some(cutoff) = &cutoff {
                        if !cutoff.admits(bug.record.created_at) {
                            continue;
                        }
                    }
                    batch
                        .attachment_map
                        .insert(bug.record.remote_id.clone(), bug.attachments);
                    batch.records.push(bug.record);
                }
                emit(batch)
            },
        )
        .await
        .map(|total| debug!(total, "full sync finished"))
    }

    async fn resolve_status_options(&self, _current: Option<&str>) -> Result<Vec<StatusOption>> {
        Ok(STATUSES
            .iter()
            .map(|(id, label)| StatusOption::new(*id, *label))
            .collect())
    }

    async fn load_options(&self, kind: OptionKind, _query: &str) -> Result<Vec<FieldOption>> {
        match kind {
            OptionKind::Users => {
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/users"))
                            .query("page", "1")
                            .query("limit", PAGE_SIZE.to_string()),
                    )
                    .await?;
                let users = value
                    .get("users")
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| {
                                let account = row.get("account")?.as_str()?;
                                let name = row
                                    .get("realname")
                                    .and_then(Value::as_str)
                                    .filter(|n| !n.is_empty())
                                    .unwrap_or(account);
                                Some(FieldOption::new(name, account))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(users)
            }
            OptionKind::Builds => {
                let mut options = Vec::new();
                if let Some(project) = &self.project {
                    let value = self
                        .transport
                        .request(TransportRequest::get(
                            self.api(&format!("/projects/{project}/builds")),
                        ))
                        .await?;
                    if let Some(builds) = value.get("builds").and_then(Value::as_array) {
                        for build in builds {
                            let (Some(id), Some(name)) = (
                                build.get("id").and_then(value_as_string),
                                build.get("name").and_then(Value::as_str),
                            ) else {
                                continue;
                            };
                            options.push(FieldOption::new(name, id));
                        }
                    }
                }
                options.push(FieldOption::new("Trunk", DEFAULT_BUILD));
                Ok(options)
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

    fn platform() -> ZentaoPlatform {
        ZentaoPlatform::new(ZentaoConfig {
            address: "http://zentao.local/".into(),
            account: "admin".into(),
            password: "secret".into(),
            zentao_id: "12-7".into(),
        })
    }

    #[test]
    fn bug_translation_lifts_flat_fields() {
        let bug = json!({
            "id": 101,
            "title": "crash on save",
            "status": "resolved",
            "deleted": "0",
            "assignedTo": "alice",
            "openedDate": "2026-08-01 09:30:00",
            "lastEditedDate": "0000-00-00 00:00:00",
            "severity": 2,
            "pri": 1,
            "openedBuild": "trunk,v1.2",
            "steps": "steps text"
        });
        let record = platform().translate_bug(&bug);
        assert_eq!(record.remote_id, "101");
        assert_eq!(record.status, "resolved");
        assert_eq!(record.handle_user, "alice");
        assert!(record.created_at > 0);
        assert_eq!(record.updated_at, 0);
        // numeric severity/pri come back as plain strings
        let severity = record.custom_fields.iter().find(|f| f.id == "severity").unwrap();
        assert_eq!(severity.value, Some(FieldValue::text("2")));
        let builds = record.custom_fields.iter().find(|f| f.id == BUILD_FIELD).unwrap();
        assert_eq!(
            builds.value,
            Some(FieldValue::List { values: vec!["trunk".into(), "v1.2".into()] })
        );
    }

    #[test]
    fn deleted_flag_overrides_status() {
        let bug = json!({ "id": "7", "status": "closed", "deleted": "1" });
        assert_eq!(platform().translate_bug(&bug).status, "DELETE");
    }

    #[test]
    fn attachment_refs_tolerate_empty_list_shape() {
        assert!(attachment_refs(&json!({ "files": [] })).is_empty());
        let refs = attachment_refs(&json!({
            "files": { "31": { "title": "trace.log" } }
        }));
        assert_eq!(refs, vec![AttachmentRef {
            file_name: "trace.log".into(),
            file_key: "31".into(),
        }]);
    }

    #[test]
    fn proxy_path_encodes_tracker_path() {
        let path = platform().proxy_path("/file-read-42.png");
        assert_eq!(
            path,
            "/resource/md/get/path?platform=zentao&path=%2Ffile-read-42.png"
        );
    }

    #[tokio::test]
    async fn terminal_status_adds_companion_fields() {
        let draft = RecordDraft {
            title: "t".into(),
            custom_fields: vec![CanonicalField::new("status", "Status", FieldType::Select)
                .with_value(FieldValue::text("closed"))],
            ..RecordDraft::default()
        };
        let mut handle = RecordHandle::default();
        let body = platform().build_body(&draft, &mut handle).await.unwrap();
        assert_eq!(body.get("status"), Some(&Value::String("closed".into())));
        assert!(body.contains_key("closedDate"));
        assert_eq!(body.get("resolution"), Some(&Value::String("fixed".into())));
        assert_eq!(body.get(BUILD_FIELD), Some(&json!([DEFAULT_BUILD])));
        assert_eq!(handle.status.as_deref(), Some("closed"));
    }
}
