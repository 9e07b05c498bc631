use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::jira::JiraPlatform;
use super::tapd::TapdPlatform;
use super::zentao::ZentaoPlatform;
use super::TrackerPlatform;
use crate::config::{AuthConfig, JiraConfig, JiraProjectConfig, TapdConfig, ZentaoConfig};
use crate::error::{Error, Result};
use crate::model::{CanonicalField, FieldType, FieldValue, KnownRecord, RecordDraft};
use crate::sync::CreatedCutoff;
use crate::transport::{Method, Transport, TransportRequest};

/// A mock transport that records every request and answers from canned
/// routes matched by method and URL suffix. Unmatched requests answer 404.
struct MockTransport {
    routes: Vec<(Method, &'static str, Value)>,
    calls: Arc<Mutex<Vec<TransportRequest>>>,
}

impl MockTransport {
    fn new(routes: Vec<(Method, &'static str, Value)>) -> Self {
        Self {
            routes,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Arc<Mutex<Vec<TransportRequest>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, req: TransportRequest) -> Result<Value> {
        let method = req.method.unwrap_or(Method::Get);
        let response = self
            .routes
            .iter()
            .find(|(m, suffix, _)| *m == method && req.url.ends_with(suffix))
            .map(|(_, _, value)| value.clone());
        let url = req.url.clone();
        self.calls.lock().unwrap().push(req);
        response.ok_or(Error::NotFound(url))
    }
}

fn find_call<'a>(
    calls: &'a [TransportRequest],
    method: Method,
    suffix: &str,
) -> Option<&'a TransportRequest> {
    calls
        .iter()
        .find(|call| call.method == Some(method) && call.url.ends_with(suffix))
}

fn jira_config() -> JiraConfig {
    JiraConfig {
        address: "https://jira.example.com".into(),
        auth: AuthConfig::Basic {
            account: "bot".into(),
            password: "secret".into(),
        },
        project: JiraProjectConfig {
            project_key: "PROJ".into(),
            bug_type_id: "10004".into(),
            demand_type_id: None,
        },
    }
}

fn jira_create_meta() -> Value {
    json!({
        "projects": [{
            "issuetypes": [{
                "fields": {
                    "summary": {
                        "name": "Summary",
                        "required": true,
                        "schema": { "system": "summary", "type": "string" }
                    },
                    "description": {
                        "name": "Description",
                        "required": false,
                        "schema": { "system": "description", "type": "string" }
                    }
                }
            }]
        }]
    })
}

fn tapd_config() -> TapdConfig {
    TapdConfig {
        address: "https://api.tapd.cn".into(),
        account: "api-user".into(),
        password: "api-token".into(),
        workspace_id: "41000001".into(),
        host_address: "https://host.example".into(),
    }
}

fn zentao_config() -> ZentaoConfig {
    ZentaoConfig {
        address: "http://zentao.local".into(),
        account: "admin".into(),
        password: "secret".into(),
        zentao_id: "12-7".into(),
    }
}

#[tokio::test]
async fn jira_add_resolves_transition_and_applies_it_in_background() {
    let transport = MockTransport::new(vec![
        (Method::Get, "/issue/createmeta", jira_create_meta()),
        (Method::Post, "/issue", json!({ "key": "PROJ-1" })),
        (
            Method::Get,
            "/issue/PROJ-1/transitions",
            json!({
                "transitions": [
                    { "id": "21", "to": { "id": "10003", "name": "Done" } }
                ]
            }),
        ),
        (Method::Post, "/transitions", Value::Null),
    ]);
    let calls = transport.calls();
    let platform = JiraPlatform::with_transport(Arc::new(transport), jira_config());

    let draft = RecordDraft {
        title: "crash on save".into(),
        description: Some("steps to reproduce".into()),
        custom_fields: vec![CanonicalField::new("status", "Status", FieldType::Select)
            .with_value(FieldValue::text("10003"))],
        ..RecordDraft::default()
    };
    let handle = platform.add_record(draft).await.unwrap();
    assert_eq!(handle.remote_id, "PROJ-1");
    assert_eq!(handle.status.as_deref(), Some("21"));

    platform.background().drain().await;

    let calls = calls.lock().unwrap();
    let create = find_call(&calls, Method::Post, "/issue").unwrap();
    let fields = create.body.as_ref().unwrap().get("fields").unwrap();
    assert_eq!(fields.get("summary"), Some(&json!("crash on save")));
    assert_eq!(fields.pointer("/project/key"), Some(&json!("PROJ")));
    // the transition is applied as a separate call, never inline
    assert!(fields.get("status").is_none());

    let transition = find_call(&calls, Method::Post, "/transitions").unwrap();
    assert_eq!(
        transition.body.as_ref().unwrap().pointer("/transition/id"),
        Some(&json!("21"))
    );
}

#[tokio::test]
async fn jira_incremental_sync_reports_missing_issue_as_deleted() {
    let transport = MockTransport::new(vec![
        (Method::Get, "/issue/createmeta", jira_create_meta()),
        (
            Method::Get,
            "/issue/PROJ-1",
            json!({
                "key": "PROJ-1",
                "fields": {
                    "summary": "login broken",
                    "status": { "id": "10002" },
                    "created": "2026-08-01T10:00:00.000+0000",
                    "updated": "2026-08-02T11:30:00.000+0000"
                }
            }),
        ),
        (
            Method::Get,
            "/transitions",
            json!({
                "transitions": [
                    { "id": "11", "to": { "id": "10002", "name": "In Progress" } }
                ]
            }),
        ),
    ]);
    let platform = JiraPlatform::with_transport(Arc::new(transport), jira_config());

    let known = vec![
        KnownRecord { host_id: "h1".into(), remote_id: "PROJ-1".into() },
        KnownRecord { host_id: "h2".into(), remote_id: "PROJ-404".into() },
    ];
    let outcome = platform.sync_incremental(known).await.unwrap();

    assert_eq!(outcome.deleted_ids, vec!["h2"]);
    assert_eq!(outcome.updated.len(), 1);
    let record = &outcome.updated[0];
    assert_eq!(record.title, "login broken");
    // the wire status maps back onto the matching transition id
    assert_eq!(record.status, "11");
    assert!(record.created_at > 0);
}

#[tokio::test]
async fn tapd_update_sends_form_encoded_write_with_status() {
    let transport = MockTransport::new(vec![(
        Method::Post,
        "/bugs",
        json!({ "data": { "Bug": { "id": "1141" } } }),
    )]);
    let calls = transport.calls();
    let platform = TapdPlatform::with_transport(Arc::new(transport), tapd_config());

    let draft = RecordDraft {
        title: "crash on save".into(),
        custom_fields: vec![
            CanonicalField::new("status", "Status", FieldType::Select)
                .with_value(FieldValue::text("in_progress")),
            CanonicalField::new("severity", "Severity", FieldType::Select)
                .with_value(FieldValue::text("fatal")),
        ],
        ..RecordDraft::default()
    };
    let handle = platform.update_record("1141", draft).await.unwrap();
    assert_eq!(handle.remote_id, "1141");
    assert_eq!(handle.status.as_deref(), Some("in_progress"));

    let calls = calls.lock().unwrap();
    let write = find_call(&calls, Method::Post, "/bugs").unwrap();
    for expected in [
        ("id", "1141"),
        ("status", "in_progress"),
        ("severity", "fatal"),
        ("workspace_id", "41000001"),
        ("title", "crash on save"),
    ] {
        assert!(
            write
                .form
                .iter()
                .any(|(k, v)| k == expected.0 && v == expected.1),
            "missing form param {expected:?}"
        );
    }
}

#[tokio::test]
async fn tapd_full_sync_observes_all_ids_but_filters_by_cutoff() {
    let transport = MockTransport::new(vec![(
        Method::Get,
        "/bugs",
        json!({
            "data": [
                { "Bug": {
                    "id": "1", "title": "old", "status": "new",
                    "created": "2026-01-01 00:00:00", "modified": "2026-01-01 00:00:00"
                } },
                { "Bug": {
                    "id": "2", "title": "new", "status": "new",
                    "created": "2026-08-01 00:00:00", "modified": "2026-08-01 00:00:00"
                } }
            ]
        }),
    )]);
    let platform = TapdPlatform::with_transport(Arc::new(transport), tapd_config());

    let cutoff = CreatedCutoff::After(
        chrono::NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis(),
    );
    let mut batches = Vec::new();
    platform
        .sync_full(Some(cutoff), &mut |batch| {
            batches.push(batch);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].observed_ids, vec!["1", "2"]);
    assert_eq!(batches[0].records.len(), 1);
    assert_eq!(batches[0].records[0].remote_id, "2");
}

#[tokio::test]
async fn tapd_delete_is_a_noop_without_remote_calls() {
    let transport = MockTransport::new(Vec::new());
    let calls = transport.calls();
    let platform = TapdPlatform::with_transport(Arc::new(transport), tapd_config());

    platform.delete_record("1141").await.unwrap();
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn zentao_add_posts_json_body_and_reads_back_id() {
    let transport = MockTransport::new(vec![(
        Method::Post,
        "/products/12/bugs",
        json!({ "id": 77, "status": "active" }),
    )]);
    let calls = transport.calls();
    let platform = ZentaoPlatform::with_transport(Arc::new(transport), zentao_config());

    let draft = RecordDraft {
        title: "crash on save".into(),
        description: Some("first line\nsecond line".into()),
        ..RecordDraft::default()
    };
    let handle = platform.add_record(draft).await.unwrap();
    assert_eq!(handle.remote_id, "77");
    assert_eq!(handle.status.as_deref(), Some("active"));

    let calls = calls.lock().unwrap();
    let create = find_call(&calls, Method::Post, "/products/12/bugs").unwrap();
    let body = create.body.as_ref().unwrap();
    assert_eq!(body.get("product"), Some(&json!("12")));
    assert_eq!(body.get("project"), Some(&json!("7")));
    assert_eq!(body.get("openedBuild"), Some(&json!(["trunk"])));
    // newlines travel as break tags
    assert_eq!(body.get("steps"), Some(&json!("first line<br/>second line")));
}

#[tokio::test]
async fn zentao_delete_hits_the_bug_resource() {
    let transport = MockTransport::new(vec![(Method::Delete, "/bugs/9", Value::Null)]);
    let calls = transport.calls();
    let platform = ZentaoPlatform::with_transport(Arc::new(transport), zentao_config());

    platform.delete_record("9").await.unwrap();
    let calls = calls.lock().unwrap();
    assert!(find_call(&calls, Method::Delete, "/bugs/9").is_some());
}

#[tokio::test]
async fn zentao_statuses_are_flat_regardless_of_current() {
    let platform =
        ZentaoPlatform::with_transport(Arc::new(MockTransport::new(Vec::new())), zentao_config());
    let fresh = platform.resolve_status_options(None).await.unwrap();
    let from_active = platform.resolve_status_options(Some("active")).await.unwrap();
    assert_eq!(fresh, from_active);
    let ids: Vec<&str> = fresh.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["active", "resolved", "closed"]);
}

#[test]
fn create_platforms_builds_one_adapter_per_section() {
    let config = crate::config::SyncConfig {
        jira: Some(jira_config()),
        tapd: Some(tapd_config()),
        zentao: None,
    };
    let platforms = super::create_platforms(&config);
    let names: Vec<&str> = platforms.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["jira", "tapd"]);
}
