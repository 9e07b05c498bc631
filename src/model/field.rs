use serde::{Deserialize, Serialize};

/// UI widget a canonical field renders as. A field that cannot be classified
/// into one of these is dropped before reaching the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Input,
    Select,
    MultiSelect,
    Radio,
    Checkbox,
    Cascader,
    Date,
    Datetime,
    RichText,
    MultiInput,
}

impl FieldType {
    /// Stable name used for ordering ties and wire values.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Input => "INPUT",
            FieldType::Select => "SELECT",
            FieldType::MultiSelect => "MULTI_SELECT",
            FieldType::Radio => "RADIO",
            FieldType::Checkbox => "CHECKBOX",
            FieldType::Cascader => "CASCADER",
            FieldType::Date => "DATE",
            FieldType::Datetime => "DATETIME",
            FieldType::RichText => "RICH_TEXT",
            FieldType::MultiInput => "MULTI_INPUT",
        }
    }
}

/// How a searchable field loads its options from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMethod {
    User,
    Assignable,
    Sprint,
    IssueLink,
}

/// One selectable option; `children` carries cascading-select levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FieldOption>>,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            children: None,
        }
    }
}

/// A field value after normalization. Every transformation step
/// pattern-matches on this instead of probing raw map shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldValue {
    Text { text: String },
    Ref { id: String },
    List { values: Vec<String> },
    Cascade { parent: String, child: Option<String> },
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text { text: value.into() }
    }

    /// Scalar rendering used when a tracker accepts the value verbatim.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text { text } => Some(text),
            FieldValue::Ref { id } => Some(id),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text { text } => text.is_empty(),
            FieldValue::Ref { id } => id.is_empty(),
            FieldValue::List { values } => values.is_empty(),
            FieldValue::Cascade { parent, .. } => parent.is_empty(),
        }
    }
}

/// One normalized custom field, independent of which tracker it came from.
///
/// Constructed per (project, issue-type) pair when the host requests the
/// default template; cached only for the duration of a single sync or
/// add/update call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalField {
    /// Remote field key, e.g. "customfield_10001" or "assignee".
    pub id: String,
    pub name: String,
    /// Display key generated sequentially per template ("A", "B", ...).
    pub key: String,
    pub field_type: FieldType,
    pub required: bool,
    pub system_field: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub searchable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_method: Option<SearchMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl CanonicalField {
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            key: String::new(),
            field_type,
            required: false,
            system_field: false,
            options: None,
            default_value: None,
            searchable: false,
            search_method: None,
            placeholder: None,
            value: None,
        }
    }

    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_scalar_rendering() {
        assert_eq!(FieldValue::text("high").as_text(), Some("high"));
        assert_eq!(FieldValue::Ref { id: "10001".into() }.as_text(), Some("10001"));
        assert_eq!(
            FieldValue::List { values: vec!["a".into()] }.as_text(),
            None
        );
    }

    #[test]
    fn cascade_without_child_is_not_empty() {
        let value = FieldValue::Cascade {
            parent: "os".into(),
            child: None,
        };
        assert!(!value.is_empty());
    }

    #[test]
    fn field_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&FieldType::MultiSelect).unwrap();
        assert_eq!(json, "\"MULTI_SELECT\"");
    }
}
