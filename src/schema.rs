//! Converts a tracker's raw create/edit field metadata into canonical
//! [`CanonicalField`] descriptors: type classification, special-field
//! overrides, composite expansion, default-value normalization and the
//! deterministic display order the host UI depends on.

use chrono::{Local, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{CanonicalField, FieldOption, FieldType, SearchMethod};

pub const SUMMARY_FIELD: &str = "summary";
pub const DESCRIPTION_FIELD: &str = "description";
pub const ENVIRONMENT_FIELD: &str = "environment";
pub const ASSIGNEE_FIELD: &str = "assignee";
pub const REPORTER_FIELD: &str = "reporter";
pub const ISSUE_LINKS_FIELD: &str = "issuelinks";
pub const ISSUE_LINK_TYPE_FIELD: &str = "issueLinkType";
pub const TIME_TRACKING_FIELD: &str = "timetracking";
pub const ORIGINAL_ESTIMATE_FIELD: &str = "originalEstimate";
pub const REMAINING_ESTIMATE_FIELD: &str = "remainingEstimate";

const ESTIMATE_PLACEHOLDER: &str = "e.g. 2d 4h 30m";
const TAG_PLACEHOLDER: &str = "add a value and press Enter";
const ISSUE_LINK_PLACEHOLDER: &str = "select issues to link";

/// Raw create/edit metadata for one remote field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFieldSchema {
    pub field_id: String,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: RawSchema,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
    #[serde(default)]
    pub has_default_value: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

/// Coarse system type plus the tracker's version-qualified custom-type tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSchema {
    pub system: Option<String>,
    pub custom: Option<String>,
    #[serde(rename = "type")]
    pub schema_type: Option<String>,
}

/// One entry of a raw allowed-values tree.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowedValue {
    pub id: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<AllowedValue>,
}

/// Option data fetched once per default-template call so that field
/// normalization never re-queries the tracker.
#[derive(Debug, Clone, Default)]
pub struct OptionBundle {
    pub users: Vec<FieldOption>,
    pub assignable: Vec<FieldOption>,
    pub sprints: Vec<FieldOption>,
    pub epics: Vec<FieldOption>,
    pub issue_links: Vec<FieldOption>,
    pub link_types: Vec<FieldOption>,
}

/// Deserializes a raw field-schema array; malformed metadata is a
/// [`Error::Schema`] and never partially succeeds.
pub fn parse_raw_fields(value: &Value) -> Result<Vec<RawFieldSchema>> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Schema(format!("malformed field metadata: {e}")))
}

/// Normalizes raw field schemas into ordered canonical fields.
///
/// Fields whose type cannot be resolved are dropped, never surfaced with an
/// empty type. Composite fields (time tracking, issue links) expand into
/// their companion fields immediately after classification.
pub fn normalize(raw_fields: Vec<RawFieldSchema>, options: &OptionBundle) -> Vec<CanonicalField> {
    let mut fields: Vec<CanonicalField> = Vec::with_capacity(raw_fields.len());
    let mut keys = KeySequence::default();
    for raw in raw_fields {
        let Some(mut field) = classify(&raw, options) else {
            debug!(field = %raw.field_id, "dropping unclassifiable field");
            continue;
        };
        field.key = keys.next_key();
        if !raw.allowed_values.is_empty() {
            field.options = flatten_allowed_values(&raw.allowed_values);
        }
        apply_default_value(&mut field, &raw);
        let expanded = expand_composite(&field, &mut keys, options);
        fields.push(field);
        fields.extend(expanded);
    }
    sort_fields(&mut fields);
    fields
}

/// Resolves a raw field to a canonical descriptor, or `None` when neither
/// the custom-type tag nor the system type classifies it.
fn classify(raw: &RawFieldSchema, options: &OptionBundle) -> Option<CanonicalField> {
    let mut field = CanonicalField::new(&raw.field_id, &raw.name, FieldType::Input);
    field.required = raw.required || raw.field_id == SUMMARY_FIELD;
    field.system_field = matches!(
        raw.field_id.as_str(),
        SUMMARY_FIELD | DESCRIPTION_FIELD | ENVIRONMENT_FIELD
    );

    let resolved = if let Some(custom) = raw.schema.custom.as_deref() {
        classify_custom(custom, &raw.schema, &mut field, options)
    } else {
        classify_system(raw, &mut field, options)
    };
    let field_type = resolved?;
    field.field_type = field_type;

    if field_type == FieldType::MultiInput {
        field.placeholder = Some(TAG_PLACEHOLDER.to_string());
    }
    Some(field)
}

/// Custom-type classification. Substring matching is required because
/// trackers version-qualify custom-type identifiers
/// (`…:multiselect-v2`, vendor-prefixed pickers, and so on).
fn classify_custom(
    custom: &str,
    schema: &RawSchema,
    field: &mut CanonicalField,
    options: &OptionBundle,
) -> Option<FieldType> {
    // Special pickers first; their wire shape does not fit the generic rule.
    if custom.contains("multiuserpicker") {
        field.searchable = true;
        field.search_method = Some(SearchMethod::User);
        field.options = Some(options.users.clone());
        return Some(FieldType::MultiSelect);
    }
    if custom.contains("userpicker") || custom.contains("people") {
        let many = schema.schema_type.as_deref() == Some("array");
        field.searchable = true;
        field.search_method = Some(SearchMethod::User);
        field.options = Some(options.users.clone());
        return Some(if many { FieldType::MultiSelect } else { FieldType::Select });
    }
    if custom.contains("sprint") {
        field.searchable = true;
        field.search_method = Some(SearchMethod::Sprint);
        field.options = Some(options.sprints.clone());
        return Some(FieldType::Select);
    }
    if custom.contains("epic-link") {
        field.options = Some(options.epics.clone());
        return Some(FieldType::Select);
    }
    if custom.contains("multicheckboxes") {
        // Multi-check fields need an empty-array default to render unchecked.
        field.default_value = Some("[]".to_string());
        return Some(FieldType::Checkbox);
    }
    if custom.contains("customfieldtypes") && schema.schema_type.as_deref() == Some("project") {
        return Some(FieldType::Select);
    }

    let table: &[(&str, FieldType)] = &[
        ("cascadingselect", FieldType::Cascader),
        ("multiselect", FieldType::MultiSelect),
        ("radiobuttons", FieldType::Radio),
        ("select", FieldType::Select),
        ("datetime", FieldType::Datetime),
        ("datepicker", FieldType::Date),
        ("textarea", FieldType::RichText),
        ("textfield", FieldType::Input),
        ("readonlyfield", FieldType::Input),
        ("labels", FieldType::MultiInput),
        ("float", FieldType::Input),
        ("url", FieldType::Input),
    ];
    table
        .iter()
        .find(|(tag, _)| custom.contains(tag))
        .map(|(_, ty)| *ty)
}

/// System-field classification plus the fixed overrides for fields whose
/// wire representation does not fit the coarse type.
fn classify_system(
    raw: &RawFieldSchema,
    field: &mut CanonicalField,
    options: &OptionBundle,
) -> Option<FieldType> {
    let system = raw.schema.system.as_deref().unwrap_or(&raw.field_id);
    match system {
        ASSIGNEE_FIELD => {
            field.searchable = true;
            field.search_method = Some(SearchMethod::Assignable);
            field.options = Some(options.assignable.clone());
            return Some(FieldType::Select);
        }
        REPORTER_FIELD => {
            field.searchable = true;
            field.search_method = Some(SearchMethod::User);
            field.options = Some(options.users.clone());
            return Some(FieldType::Select);
        }
        ISSUE_LINKS_FIELD => {
            field.searchable = true;
            field.search_method = Some(SearchMethod::IssueLink);
            field.options = Some(options.issue_links.clone());
            field.placeholder = Some(ISSUE_LINK_PLACEHOLDER.to_string());
            return Some(FieldType::MultiSelect);
        }
        _ => {}
    }
    if raw.schema.schema_type.as_deref() == Some(TIME_TRACKING_FIELD) {
        // Rewritten into the original-estimate half of the estimate pair;
        // the remaining half is added by composite expansion.
        field.id = ORIGINAL_ESTIMATE_FIELD.to_string();
        field.name = "Original Estimate".to_string();
        field.placeholder = Some(ESTIMATE_PLACEHOLDER.to_string());
        return Some(FieldType::Input);
    }

    let by_name = classify_system_tag(system);
    by_name.or_else(|| raw.schema.schema_type.as_deref().and_then(classify_system_tag))
}

fn classify_system_tag(tag: &str) -> Option<FieldType> {
    match tag {
        "summary" | "string" | "number" | "duration" => Some(FieldType::Input),
        "description" | "environment" => Some(FieldType::RichText),
        "priority" | "option" | "resolution" | "securitylevel" | "issuetype" | "user"
        | "version" | "project" => Some(FieldType::Select),
        "array" | "components" | "fixVersions" | "versions" => Some(FieldType::MultiSelect),
        "option-with-child" => Some(FieldType::Cascader),
        "date" | "duedate" => Some(FieldType::Date),
        "datetime" => Some(FieldType::Datetime),
        "labels" => Some(FieldType::MultiInput),
        _ => None,
    }
}

/// Composite-field expansion: a time-tracking field yields its
/// remaining-estimate twin; an issue-link field yields the link-type
/// selector. Expanded fields receive freshly generated display keys.
fn expand_composite(
    field: &CanonicalField,
    keys: &mut KeySequence,
    options: &OptionBundle,
) -> Vec<CanonicalField> {
    match field.id.as_str() {
        ORIGINAL_ESTIMATE_FIELD => {
            let mut remaining = field.clone();
            remaining.id = REMAINING_ESTIMATE_FIELD.to_string();
            remaining.name = "Remaining Estimate".to_string();
            remaining.key = keys.next_key();
            remaining.placeholder = Some(ESTIMATE_PLACEHOLDER.to_string());
            vec![remaining]
        }
        ISSUE_LINKS_FIELD => {
            let mut link_type =
                CanonicalField::new(ISSUE_LINK_TYPE_FIELD, "Link Type", FieldType::Select);
            link_type.key = keys.next_key();
            link_type.options = Some(options.link_types.clone());
            vec![link_type]
        }
        _ => Vec::new(),
    }
}

/// Normalizes a raw default value to the literal string shape the field's
/// type expects: `{id}` objects collapse to the id, lists to a JSON array
/// of ids, epoch milliseconds to local-zone date or datetime strings.
fn apply_default_value(field: &mut CanonicalField, raw: &RawFieldSchema) {
    if !raw.has_default_value {
        return;
    }
    let Some(default) = &raw.default_value else {
        return;
    };
    let normalized = match default {
        Value::Object(map) => match map.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        },
        Value::Array(items) => {
            let ids: Vec<Value> = items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => map.get("id").cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                })
                .collect();
            serde_json::to_string(&ids).ok()
        }
        Value::String(text) => Some(text.clone()),
        Value::Number(num) => match field.field_type {
            FieldType::Date => epoch_millis_to_local(num.as_i64(), "%Y-%m-%d"),
            FieldType::Datetime => epoch_millis_to_local(num.as_i64(), "%Y-%m-%d %H:%M:%S"),
            _ => Some(num.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
    };
    if normalized.is_some() {
        field.default_value = normalized;
    }
}

fn epoch_millis_to_local(millis: Option<i64>, format: &str) -> Option<String> {
    let millis = millis?;
    let stamp = Local.timestamp_millis_opt(millis).single()?;
    Some(stamp.format(format).to_string())
}

/// Recursively flattens an allowed-values tree into option nodes, preserving
/// child order. An entry with neither name nor value is skipped.
pub fn flatten_allowed_values(values: &[AllowedValue]) -> Option<Vec<FieldOption>> {
    if values.is_empty() {
        return None;
    }
    let options: Vec<FieldOption> = values
        .iter()
        .filter_map(|val| {
            let label = val
                .name
                .clone()
                .or_else(|| val.value.clone())
                .filter(|l| !l.is_empty())?;
            let value = val.id.clone().or_else(|| val.value.clone()).unwrap_or_default();
            Some(FieldOption {
                value,
                label,
                children: flatten_allowed_values(&val.children),
            })
        })
        .collect();
    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

/// Deterministic display order: title first, then plain inputs, then the
/// remaining fields by type name, then the issue-link pair (targets before
/// link type), with rich text always last. Ties break on type name and then
/// field id so the order is total and reproducible across runs.
pub fn sort_fields(fields: &mut [CanonicalField]) {
    fields.sort_by(|a, b| {
        sort_rank(a)
            .cmp(&sort_rank(b))
            .then_with(|| a.field_type.name().cmp(b.field_type.name()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn sort_rank(field: &CanonicalField) -> u8 {
    if field.id == SUMMARY_FIELD {
        0
    } else if field.field_type == FieldType::RichText {
        5
    } else if field.id == ISSUE_LINK_TYPE_FIELD {
        4
    } else if field.id == ISSUE_LINKS_FIELD {
        3
    } else if field.field_type == FieldType::Input {
        1
    } else {
        2
    }
}

/// Generates the per-template display keys "A", "B", …, "Z", "AA", ….
#[derive(Debug, Default)]
pub struct KeySequence {
    next: u32,
}

impl KeySequence {
    pub fn next_key(&mut self) -> String {
        let mut n = self.next;
        self.next += 1;
        let mut key = String::new();
        loop {
            key.insert(0, char::from(b'A' + (n % 26) as u8));
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        key
    }
}
