//! Jira-style adapter: create-meta schema discovery, wiki-markup rich text,
//! graph-model status transitions, offset-paged search.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{OptionKind, TrackerPlatform};
use crate::attachment::{self, RemoteAttachment};
use crate::config::{JiraConfig, JiraProjectConfig};
use crate::error::{Error, Result};
use crate::files::LocalFileStore;
use crate::model::{
    AttachmentRef, CanonicalField, FieldOption, FieldType, FieldValue, KnownRecord, RecordDraft,
    RecordHandle, StatusOption, SyncBatch, SyncOutcome, SyncRecord,
};
use crate::richtext::wiki;
use crate::schema::{
    self, OptionBundle, RawFieldSchema, DESCRIPTION_FIELD, ISSUE_LINKS_FIELD,
    ISSUE_LINK_TYPE_FIELD, ORIGINAL_ESTIMATE_FIELD, REMAINING_ESTIMATE_FIELD, SUMMARY_FIELD,
    TIME_TRACKING_FIELD,
};
use crate::status::{self, GraphEdge, Resolution, TransitionModel};
use crate::sync::{self, CreatedCutoff};
use crate::tasks::TaskQueue;
use crate::transport::{HttpTransport, Transport, TransportRequest};

const PAGE_SIZE: u64 = 100;
const ATTACHMENT_FIELD: &str = "attachment";
const STATUS_FIELD: &str = "status";

#[derive(Debug, Deserialize)]
struct IssueResponse {
    key: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct IssuePage {
    #[serde(default)]
    issues: Vec<IssueResponse>,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<TransitionEntry>,
}

#[derive(Debug, Deserialize)]
struct TransitionEntry {
    id: String,
    to: TransitionTarget,
}

#[derive(Debug, Deserialize)]
struct TransitionTarget {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email_address: Option<String>,
}

impl JiraUser {
    fn into_option(self) -> FieldOption {
        let value = self.account_id.or(self.name).unwrap_or_default();
        let label = match &self.email_address {
            Some(email) if !email.is_empty() => format!("{} ({email})", self.display_name),
            _ => self.display_name.clone(),
        };
        FieldOption::new(label, value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkTypesResponse {
    #[serde(default)]
    issue_link_types: Vec<LinkType>,
}

#[derive(Debug, Deserialize)]
struct LinkType {
    #[serde(default)]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SprintPicker {
    #[serde(default)]
    suggestions: Vec<SprintSuggestion>,
    #[serde(default)]
    all_matches: Vec<SprintSuggestion>,
}

#[derive(Debug, Deserialize)]
struct SprintSuggestion {
    id: Value,
    name: String,
}

pub struct JiraPlatform {
    transport: Arc<dyn Transport>,
    address: String,
    project: JiraProjectConfig,
    background: TaskQueue,
}

impl JiraPlatform {
    pub fn new(config: JiraConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.auth));
        Self::with_transport(transport, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: JiraConfig) -> Self {
        Self {
            transport,
            address: config.address.trim_end_matches('/').to_string(),
            project: config.project,
            background: TaskQueue::new(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/rest/api/2{path}", self.address)
    }

    fn agile(&self, path: &str) -> String {
        format!("{}/rest/agile/1.0{path}", self.address)
    }

    async fn issue(&self, key: &str) -> Result<IssueResponse> {
        let value = self
            .transport
            .request(TransportRequest::get(self.api(&format!("/issue/{key}"))))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("malformed issue response: {e}")))
    }

    async fn search_issues(&self, start_at: u64, max_results: u64) -> Result<Vec<IssueResponse>> {
        let jql = format!(
            "project = \"{}\" AND issuetype = {} ORDER BY created ASC",
            self.project.project_key, self.project.bug_type_id
        );
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api("/search"))
                    .query("jql", jql)
                    .query("startAt", start_at.to_string())
                    .query("maxResults", max_results.to_string()),
            )
            .await?;
        let page: IssuePage = serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("malformed search response: {e}")))?;
        Ok(page.issues)
    }

    /// Raw create metadata for the configured project and bug type. The
    /// field id doubles as the map key; older servers omit it from the
    /// field body, so it is backfilled before deserializing.
    async fn create_meta(&self) -> Result<Vec<RawFieldSchema>> {
        let value = self
            .transport
            .request(
                TransportRequest::get(self.api("/issue/createmeta"))
                    .query("projectKeys", &self.project.project_key)
                    .query("issuetypeIds", &self.project.bug_type_id)
                    .query("expand", "projects.issuetypes.fields"),
            )
            .await?;
        let fields = value
            .pointer("/projects/0/issuetypes/0/fields")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Schema("create metadata has no field map".into()))?;
        let mut raw = Vec::with_capacity(fields.len());
        for (field_id, field) in fields {
            let mut field = field.clone();
            if let Value::Object(map) = &mut field {
                map.entry("fieldId").or_insert(json!(field_id));
            }
            raw.push(field);
        }
        schema::parse_raw_fields(&Value::Array(raw))
    }

    async fn transitions(&self, key: &str) -> Result<Vec<GraphEdge>> {
        let value = self
            .transport
            .request(TransportRequest::get(
                self.api(&format!("/issue/{key}/transitions")),
            ))
            .await?;
        let response: TransitionsResponse = serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("malformed transitions response: {e}")))?;
        Ok(response
            .transitions
            .into_iter()
            .map(|t| GraphEdge {
                transition_id: t.id,
                to_id: t.to.id,
                to_label: t.to.name,
            })
            .collect())
    }

    async fn option_bundle(&self) -> OptionBundle {
        // Best-effort; a tracker without the agile module simply yields
        // empty sprint and epic lists.
        let mut bundle = OptionBundle::default();
        for (kind, slot) in [
            (OptionKind::Users, 0usize),
            (OptionKind::Assignable, 1),
            (OptionKind::Sprints, 2),
            (OptionKind::Epics, 3),
            (OptionKind::IssueLinks, 4),
            (OptionKind::LinkTypes, 5),
        ] {
            match self.load_options(kind, "").await {
                Ok(options) => match slot {
                    0 => bundle.users = options,
                    1 => bundle.assignable = options,
                    2 => bundle.sprints = options,
                    3 => bundle.epics = options,
                    4 => bundle.issue_links = options,
                    _ => bundle.link_types = options,
                },
                Err(err) => warn!(kind = ?kind, %err, "option data unavailable"),
            }
        }
        bundle
    }

    /// Builds the `fields` body for create/update plus everything peeled
    /// off it: rich-text translation results, link targets and the
    /// requested status.
    fn build_fields(
        &self,
        draft: &RecordDraft,
        meta: &[RawFieldSchema],
        handle: &mut RecordHandle,
    ) -> Result<WireFields> {
        let mut files = LocalFileStore::new(draft.rich_files.clone());
        let mut wire = WireFields::default();
        let mut fields = Map::new();

        for field in &draft.custom_fields {
            let Some(value) = &field.value else { continue };
            if value.is_empty() {
                continue;
            }
            if field.id == STATUS_FIELD {
                wire.requested_status = value.as_text().map(str::to_string);
                continue;
            }
            if field.id == ISSUE_LINKS_FIELD {
                if let FieldValue::List { values } = value {
                    wire.link_targets = values.clone();
                }
                continue;
            }
            if field.id == ISSUE_LINK_TYPE_FIELD {
                wire.link_type = value.as_text().map(str::to_string);
                continue;
            }
            match field.field_type {
                FieldType::Select | FieldType::Radio => {
                    if let Some(id) = value.as_text() {
                        if field.id == "assignee" {
                            handle.handle_user = Some(id.to_string());
                        }
                        fields.insert(field.id.clone(), json!({ "id": id }));
                    }
                }
                FieldType::MultiSelect | FieldType::Checkbox => {
                    if let FieldValue::List { values } = value {
                        let items: Vec<Value> =
                            values.iter().map(|v| json!({ "id": v })).collect();
                        fields.insert(field.id.clone(), Value::Array(items));
                    }
                }
                FieldType::Cascader => {
                    if let FieldValue::Cascade { parent, child } = value {
                        let mut attr = json!({ "id": parent });
                        if let Some(child) = child {
                            attr["child"] = json!({ "id": child });
                        }
                        fields.insert(field.id.clone(), attr);
                    }
                }
                FieldType::RichText => {
                    if let Some(text) = value.as_text() {
                        let translated = wiki::from_canonical(text, &mut files)?;
                        if field.id == DESCRIPTION_FIELD {
                            handle.description = Some(translated.canonical.clone());
                        }
                        handle
                            .rich_field_map
                            .insert(field.id.clone(), translated.canonical.clone());
                        wire.remain.extend(translated.remain);
                        wire.uploads.extend(translated.uploads);
                        fields.insert(field.id.clone(), json!(translated.remote));
                    }
                }
                FieldType::Datetime => {
                    if let Some(text) = value.as_text() {
                        fields.insert(
                            field.id.clone(),
                            json!(format!(
                                "{}{}",
                                text.trim().replace(' ', "T"),
                                Local::now().format("%:z")
                            )),
                        );
                    }
                }
                FieldType::MultiInput => {
                    if let FieldValue::List { values } = value {
                        fields.insert(field.id.clone(), json!(values));
                    }
                }
                FieldType::Input | FieldType::Date => {
                    if let Some(text) = value.as_text() {
                        fields.insert(field.id.clone(), json!(text));
                    }
                }
            }
        }

        if !fields.contains_key(SUMMARY_FIELD) {
            fields.insert(SUMMARY_FIELD.into(), json!(draft.title));
        }
        if !fields.contains_key(DESCRIPTION_FIELD) {
            if let Some(description) = &draft.description {
                let translated = wiki::from_canonical(description, &mut files)?;
                handle.description = Some(translated.canonical.clone());
                wire.remain.extend(translated.remain);
                wire.uploads.extend(translated.uploads);
                fields.insert(DESCRIPTION_FIELD.into(), json!(translated.remote));
            }
        }

        apply_special_params(&mut fields, meta);
        fields.insert("project".into(), json!({ "key": self.project.project_key }));
        fields.insert("issuetype".into(), json!({ "id": self.project.bug_type_id }));
        wire.fields = Value::Object(fields);
        Ok(wire)
    }

    fn spawn_uploads(&self, key: &str, wire: &WireFields) {
        for file in &wire.uploads {
            let transport = self.transport.clone();
            let url = self.api(&format!("/issue/{key}/attachments"));
            let path = file.path.clone();
            self.background.spawn("jira attachment upload", async move {
                transport
                    .request(TransportRequest::post(url).upload(path))
                    .await
                    .map(|_| ())
            });
        }
    }

    fn spawn_links(&self, key: &str, wire: &WireFields, relink: bool) {
        if wire.link_targets.is_empty() {
            return;
        }
        let transport = self.transport.clone();
        let issue_url = self.api(&format!("/issue/{key}?fields=issuelinks"));
        let link_url = self.api("/issueLink");
        let unlink_base = self.api("/issueLink");
        let key = key.to_string();
        let targets = wire.link_targets.clone();
        let link_type = wire.link_type.clone().unwrap_or_else(|| "Relates".into());
        self.background.spawn("jira issue links", async move {
            if relink {
                // Unlink-then-relink must stay sequential.
                let issue = transport.request(TransportRequest::get(issue_url)).await?;
                if let Some(links) = issue
                    .pointer("/fields/issuelinks")
                    .and_then(Value::as_array)
                {
                    for link in links {
                        if let Some(id) = link.get("id").and_then(Value::as_str) {
                            transport
                                .request(TransportRequest::delete(format!("{unlink_base}/{id}")))
                                .await?;
                        }
                    }
                }
            }
            for target in targets {
                transport
                    .request(TransportRequest::post(link_url.clone()).json(json!({
                        "type": { "name": link_type },
                        "inwardIssue": { "key": key },
                        "outwardIssue": { "key": target },
                    })))
                    .await?;
            }
            Ok::<(), Error>(())
        });
    }

    fn spawn_transition(&self, key: &str, transition_id: &str) {
        let transport = self.transport.clone();
        let url = self.api(&format!("/issue/{key}/transitions"));
        let body = json!({ "transition": { "id": transition_id } });
        self.background.spawn("jira status transition", async move {
            transport
                .request(TransportRequest::post(url).json(body))
                .await
                .map(|_| ())
        });
    }

    /// Deletes rich-text image attachments the edited markup no longer
    /// references, then uploads the newly staged ones.
    fn spawn_attachment_reconcile(&self, key: &str, wire: &WireFields) {
        let transport = self.transport.clone();
        let issue_url = self.api(&format!("/issue/{key}"));
        let attachment_base = self.api("/attachment");
        let remain = wire.remain.clone();
        self.background.spawn("jira attachment cleanup", async move {
            let issue = transport.request(TransportRequest::get(issue_url)).await?;
            let remote = parse_remote_attachments(
                issue.pointer("/fields/attachment").unwrap_or(&Value::Null),
            );
            let delta = attachment::reconcile(&remote, &remain, Vec::new());
            for id in delta.to_delete {
                transport
                    .request(TransportRequest::delete(format!("{attachment_base}/{id}")))
                    .await?;
            }
            Ok::<(), Error>(())
        });
        self.spawn_uploads(key, wire);
    }

    /// Translates one remote issue into a canonical record against the
    /// default template, consuming `edges` to map the wire status onto the
    /// transition handle the host would send back.
    fn translate_issue(
        &self,
        issue: &IssueResponse,
        template: &[CanonicalField],
        edges: &[GraphEdge],
        batch: &mut SyncBatch,
    ) -> SyncRecord {
        let mut record = SyncRecord::new(&issue.key);
        let mut attachments: HashMap<String, String> = HashMap::new();
        if let Some(list) = issue.fields.get(ATTACHMENT_FIELD).and_then(Value::as_array) {
            for attachment in list {
                if let (Some(name), Some(content)) = (
                    attachment.get("filename").and_then(Value::as_str),
                    attachment.get("content").and_then(Value::as_str),
                ) {
                    attachments.insert(name.to_string(), content.to_string());
                }
            }
        }

        record.title = issue
            .fields
            .get(SUMMARY_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(description) = issue.fields.get(DESCRIPTION_FIELD).and_then(Value::as_str) {
            let translated = wiki::to_canonical(description, &mut attachments);
            record.description = Some(translated.canonical);
            record.pending_downloads.extend(translated.pending_downloads);
        }
        record.handle_user = issue
            .fields
            .get("assignee")
            .and_then(|a| a.get("accountId").or_else(|| a.get("name")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let raw_status = issue
            .fields
            .get(STATUS_FIELD)
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        record.status = edges
            .iter()
            .find(|edge| edge.to_id == raw_status)
            .map(|edge| edge.transition_id.clone())
            .unwrap_or_else(|| raw_status.to_string());
        record.created_at = parse_issue_timestamp(issue.fields.get("created"));
        record.updated_at = parse_issue_timestamp(issue.fields.get("updated"));

        for field in template {
            let Some(raw) = issue.fields.get(&field.id) else {
                continue;
            };
            if let Some(value) = read_wire_value(field.field_type, raw) {
                record
                    .custom_fields
                    .push(field.clone().with_value(value));
            }
        }

        let refs: Vec<AttachmentRef> = attachments
            .into_iter()
            .map(|(file_name, file_key)| AttachmentRef { file_name, file_key })
            .collect();
        if !refs.is_empty() {
            batch.attachment_map.insert(issue.key.clone(), refs.clone());
            record.attachments = refs;
        }
        record
    }
}

/// Wire-ready create/update payload with the pieces routed elsewhere.
#[derive(Debug, Default)]
struct WireFields {
    fields: Value,
    uploads: Vec<crate::files::LocalFile>,
    remain: std::collections::HashSet<String>,
    link_targets: Vec<String>,
    link_type: Option<String>,
    requested_status: Option<String>,
}

/// Rewrites fields whose wire representation does not match the canonical
/// shape: the estimate pair folds back into a time-tracking object, sprints
/// take a bare numeric id, user pickers need both `name` and `id`.
fn apply_special_params(fields: &mut Map<String, Value>, meta: &[RawFieldSchema]) {
    for item in meta {
        if item.schema.schema_type.as_deref() == Some(TIME_TRACKING_FIELD) {
            let original = fields.remove(ORIGINAL_ESTIMATE_FIELD);
            let remaining = fields.remove(REMAINING_ESTIMATE_FIELD);
            if original.is_some() || remaining.is_some() {
                let mut tracking = Map::new();
                if let Some(value) = original {
                    tracking.insert(ORIGINAL_ESTIMATE_FIELD.into(), value);
                }
                if let Some(value) = remaining {
                    tracking.insert(REMAINING_ESTIMATE_FIELD.into(), value);
                }
                fields.insert(item.field_id.clone(), Value::Object(tracking));
            }
            continue;
        }
        if !fields.contains_key(&item.field_id) {
            continue;
        }
        if let Some(custom) = item.schema.custom.as_deref() {
            if custom.contains("sprint") {
                if let Some(id) = fields[&item.field_id].get("id").and_then(Value::as_str) {
                    if let Ok(numeric) = id.parse::<i64>() {
                        fields.insert(item.field_id.clone(), json!(numeric));
                    }
                }
            } else if custom.ends_with("pic-link") {
                if let Some(id) = fields[&item.field_id].get("id").cloned() {
                    fields.insert(item.field_id.clone(), id);
                }
            } else if custom.contains("multiuserpicker") {
                if let Some(users) = fields.get_mut(&item.field_id).and_then(Value::as_array_mut)
                {
                    for user in users {
                        if let Some(id) = user.get("id").cloned() {
                            user["name"] = id;
                        }
                    }
                }
            }
        }
        if item.schema.schema_type.as_deref() == Some("user") {
            if let Some(id) = fields[&item.field_id].get("id").cloned() {
                // name is consumed by self-hosted servers, id by cloud
                fields.insert(item.field_id.clone(), json!({ "name": id, "id": id }));
            }
        }
    }
}

fn parse_remote_attachments(value: &Value) -> Vec<RemoteAttachment> {
    value
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|attachment| {
                    Some(RemoteAttachment {
                        id: attachment.get("id")?.as_str()?.to_string(),
                        file_name: attachment.get("filename")?.as_str()?.to_string(),
                        mime_type: attachment
                            .get("mimeType")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_issue_timestamp(value: Option<&Value>) -> i64 {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z").ok())
        .map(|stamp| stamp.timestamp_millis())
        .unwrap_or_default()
}

/// Lifts a raw wire value into the canonical discriminated union for the
/// given field type. Unrecognizable shapes are dropped, not guessed at.
fn read_wire_value(field_type: FieldType, raw: &Value) -> Option<FieldValue> {
    match field_type {
        FieldType::Select | FieldType::Radio => match raw {
            Value::Object(map) => map
                .get("id")
                .and_then(Value::as_str)
                .map(|id| FieldValue::Ref { id: id.to_string() }),
            Value::String(text) => Some(FieldValue::text(text)),
            Value::Number(num) => Some(FieldValue::Ref { id: num.to_string() }),
            _ => None,
        },
        FieldType::MultiSelect | FieldType::Checkbox | FieldType::MultiInput => {
            let items = raw.as_array()?;
            let values: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => map
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    Value::String(text) => Some(text.clone()),
                    _ => None,
                })
                .collect();
            Some(FieldValue::List { values })
        }
        FieldType::Cascader => {
            let parent = raw.get("id").and_then(Value::as_str)?.to_string();
            let child = raw
                .pointer("/child/id")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(FieldValue::Cascade { parent, child })
        }
        _ => raw.as_str().map(FieldValue::text),
    }
}

#[async_trait]
impl TrackerPlatform for JiraPlatform {
    fn name(&self) -> &str {
        "jira"
    }

    async fn validate_integration(&self) -> Result<()> {
        self.transport
            .request(TransportRequest::get(self.api("/myself")))
            .await
            .map(|_| ())
    }

    async fn default_template_fields(&self) -> Result<Vec<CanonicalField>> {
        self.project.validate()?;
        let meta = self.create_meta().await?;
        let bundle = self.option_bundle().await;
        Ok(schema::normalize(meta, &bundle))
    }

    async fn add_record(&self, draft: RecordDraft) -> Result<RecordHandle> {
        self.project.validate()?;
        let meta = self.create_meta().await?;
        let mut handle = RecordHandle::default();
        let wire = self.build_fields(&draft, &meta, &mut handle)?;

        let created = self
            .transport
            .request(
                TransportRequest::post(self.api("/issue"))
                    .json(json!({ "fields": wire.fields.clone() })),
            )
            .await?;
        let key = created
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("issue create returned no key".into()))?
            .to_string();
        handle.remote_id = key.clone();

        // Resolve the transition before returning; applying it is
        // best-effort background work.
        if let Some(requested) = &wire.requested_status {
            let edges = self.transitions(&key).await?;
            if let Resolution::Apply { handle: transition_id } =
                status::resolve(&TransitionModel::Graph { edges }, requested)
            {
                handle.status = Some(transition_id.clone());
                self.spawn_transition(&key, &transition_id);
            }
        }
        self.spawn_uploads(&key, &wire);
        self.spawn_links(&key, &wire, false);
        Ok(handle)
    }

    async fn update_record(&self, remote_id: &str, draft: RecordDraft) -> Result<RecordHandle> {
        self.project.validate()?;
        let meta = self.create_meta().await?;
        let mut handle = RecordHandle::default();
        let wire = self.build_fields(&draft, &meta, &mut handle)?;

        self.transport
            .request(
                TransportRequest::put(self.api(&format!("/issue/{remote_id}")))
                    .json(json!({ "fields": wire.fields.clone() })),
            )
            .await?;
        handle.remote_id = remote_id.to_string();
        handle.status = wire.requested_status.clone();

        self.spawn_attachment_reconcile(remote_id, &wire);
        self.spawn_links(remote_id, &wire, true);
        if let Some(transition_id) = &wire.requested_status {
            self.spawn_transition(remote_id, transition_id);
        }
        Ok(handle)
    }

    async fn delete_record(&self, remote_id: &str) -> Result<()> {
        self.transport
            .request(TransportRequest::delete(
                self.api(&format!("/issue/{remote_id}")),
            ))
            .await
            .map(|_| ())
    }

    async fn sync_incremental(&self, known: Vec<KnownRecord>) -> Result<SyncOutcome> {
        let template = self.default_template_fields().await?;
        let mut outcome = SyncOutcome::default();
        let mut edges: Vec<GraphEdge> = Vec::new();

        let (updated, deleted_ids) =
            sync::fetch_known(known, |remote_id| async move {
                self.issue(&remote_id).await
            })
            .await;
        outcome.deleted_ids = deleted_ids;
        for (_, issue) in &updated {
            if edges.is_empty() {
                // Transition graphs are per-status; one fetch covers the
                // common case of a batch sharing a workflow.
                edges = self.transitions(&issue.key).await.unwrap_or_default();
            }
            let mut batch = SyncBatch::default();
            let record = self.translate_issue(issue, &template, &edges, &mut batch);
            outcome.attachment_map.extend(batch.attachment_map);
            outcome.updated.push(record);
        }
        Ok(outcome)
    }

    async fn sync_full(
        &self,
        cutoff: Option<CreatedCutoff>,
        emit: &mut (dyn FnMut(SyncBatch) -> Result<()> + Send),
    ) -> Result<()> {
        self.project.validate()?;
        let template = self.default_template_fields().await?;
        let edges: Arc<Mutex<Vec<GraphEdge>>> = Arc::new(Mutex::new(Vec::new()));

        let fetch_edges = edges.clone();
        sync::page_offsets(
            PAGE_SIZE,
            |offset, size| {
                let fetch_edges = fetch_edges.clone();
                async move {
                    let issues = self.search_issues(offset, size).await?;
                    if offset == 0 {
                        if let Some(first) = issues.first() {
                            let fetched = self.transitions(&first.key).await.unwrap_or_default();
                            *fetch_edges.lock().unwrap() = fetched;
                        }
                    }
                    Ok(issues)
                }
            },
            |issues| {
                let edges = edges.lock().unwrap().clone();
                let mut batch = SyncBatch::default();
                for issue in &issues {
                    batch.observed_ids.push(issue.key.clone());
                    let record = self.translate_issue(issue, &template, &edges, &mut batch);
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
        // Transitions only exist relative to a live issue; a record that
        // has not been created yet has none.
        let Some(issue_key) = current else {
            return Ok(Vec::new());
        };
        let edges = self.transitions(issue_key).await?;
        Ok(status::status_options(
            &TransitionModel::Graph { edges },
            None,
        ))
    }

    async fn load_options(&self, kind: OptionKind, query: &str) -> Result<Vec<FieldOption>> {
        match kind {
            OptionKind::Users => {
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/user/search"))
                            .query("query", query)
                            .query("username", query),
                    )
                    .await?;
                let users: Vec<JiraUser> = serde_json::from_value(value)
                    .map_err(|e| Error::Transport(format!("malformed user response: {e}")))?;
                Ok(users.into_iter().map(JiraUser::into_option).collect())
            }
            OptionKind::Assignable => {
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/user/assignable/search"))
                            .query("project", &self.project.project_key)
                            .query("query", query),
                    )
                    .await?;
                let users: Vec<JiraUser> = serde_json::from_value(value)
                    .map_err(|e| Error::Transport(format!("malformed user response: {e}")))?;
                Ok(users.into_iter().map(JiraUser::into_option).collect())
            }
            OptionKind::Sprints => {
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.agile("/sprint/picker"))
                            .query("query", query),
                    )
                    .await?;
                let picker: SprintPicker = serde_json::from_value(value)
                    .map_err(|e| Error::Transport(format!("malformed sprint response: {e}")))?;
                Ok(picker
                    .suggestions
                    .into_iter()
                    .chain(picker.all_matches)
                    .map(|sprint| {
                        let id = match &sprint.id {
                            Value::String(id) => id.clone(),
                            other => other.to_string(),
                        };
                        FieldOption::new(sprint.name, id)
                    })
                    .collect())
            }
            OptionKind::Epics => {
                let jql = format!(
                    "project = \"{}\" AND issuetype = Epic",
                    self.project.project_key
                );
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/search"))
                            .query("jql", jql)
                            .query("fields", "summary"),
                    )
                    .await?;
                let page: IssuePage = serde_json::from_value(value)
                    .map_err(|e| Error::Transport(format!("malformed epic response: {e}")))?;
                Ok(page
                    .issues
                    .into_iter()
                    .map(|issue| {
                        let label = issue
                            .fields
                            .get(SUMMARY_FIELD)
                            .and_then(Value::as_str)
                            .unwrap_or(&issue.key)
                            .to_string();
                        FieldOption::new(label, issue.key)
                    })
                    .collect())
            }
            OptionKind::IssueLinks => {
                let jql = format!("project = \"{}\"", self.project.project_key);
                let value = self
                    .transport
                    .request(
                        TransportRequest::get(self.api("/search"))
                            .query("jql", jql)
                            .query("fields", "summary"),
                    )
                    .await?;
                let page: IssuePage = serde_json::from_value(value).map_err(|e| {
                    Error::Transport(format!("malformed issue-link response: {e}"))
                })?;
                Ok(page
                    .issues
                    .into_iter()
                    .map(|issue| {
                        let summary = issue
                            .fields
                            .get(SUMMARY_FIELD)
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        FieldOption::new(format!("{} {summary}", issue.key), issue.key)
                    })
                    .collect())
            }
            OptionKind::LinkTypes => {
                let value = self
                    .transport
                    .request(TransportRequest::get(self.api("/issueLinkType")))
                    .await?;
                let response: LinkTypesResponse = serde_json::from_value(value).map_err(|e| {
                    Error::Transport(format!("malformed link-type response: {e}"))
                })?;
                Ok(response
                    .issue_link_types
                    .into_iter()
                    .map(|link| FieldOption::new(link.name.clone(), link.name))
                    .collect())
            }
            OptionKind::Builds => Ok(Vec::new()),
        }
    }

    fn background(&self) -> &TaskQueue {
        &self.background
    }
}
