//! Troubleshooting case model
//!
//! Cases are authored by hand, so list fields are read leniently: a missing
//! key or `null` becomes an empty list, a lone scalar becomes a one-item list,
//! and scalar items are kept as strings. Keys the model does not know about are
//! preserved in [`Case::extra`] so the stored payload round-trips.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single troubleshooting scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Stable unique identifier
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    /// Short human title
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    /// Free-text description of the problem
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub problem_summary: Option<String>,
    /// What the user reports seeing
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub user_symptoms: Vec<String>,
    /// Structured root causes, kept as authored
    #[serde(default, deserialize_with = "lenient::entries")]
    pub root_causes: Vec<Value>,
    /// Ordered fix procedure
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub resolution_steps: Vec<String>,
    /// Questions to ask before acting
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub triage_questions: Vec<String>,
    /// Logs, screenshots and other evidence worth gathering
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub evidence_to_collect: Vec<String>,
    /// Team that owns the fix
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_team: Option<String>,
    /// Impact classification, kept as authored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    /// Where the problem originates
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub origin: Vec<String>,
    /// Which layer of the stack is affected
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub layer: Vec<String>,
    /// Any other authored keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Case {
    /// Create a case with only an identifier set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the problem summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.problem_summary = Some(summary.into());
        self
    }

    /// Descriptions of the root causes that carry one, in authored order.
    ///
    /// Entries that are not mappings, or whose `description` is empty, are skipped.
    pub fn root_cause_descriptions(&self) -> Vec<String> {
        self.root_causes
            .iter()
            .filter_map(|cause| cause.get("description"))
            .filter_map(|desc| match desc {
                Value::Null | Value::Bool(false) => None,
                Value::String(s) if s.is_empty() => None,
                other => Some(lenient::render(other.clone())),
            })
            .collect()
    }
}

/// Serde helpers accepting scalars, lists and `null` where a list or text is expected
pub mod lenient {
    use super::*;

    /// Strings as-is, other values as their JSON text
    pub fn render(value: Value) -> String {
        match value {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Text, treating `null` as empty
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional_text(deserializer)?.unwrap_or_default())
    }

    /// Optional text; non-string scalars are rendered
    pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(value) => Some(render(value)),
        })
    }

    /// A list, wrapping a lone value and treating `null` as empty
    pub fn entries<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(single) => vec![single],
        })
    }

    /// A list of text, wrapping a lone value and dropping `null` items
    pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(entries(deserializer)?
            .into_iter()
            .filter(|item| !item.is_null())
            .map(render)
            .collect())
    }
}
