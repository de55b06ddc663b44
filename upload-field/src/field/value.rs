use serde::{Deserialize, Serialize};

use super::config::FieldMode;

/// The value the host form stores for the field: `"path"`, `null`, or
/// `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Multiple(Vec<String>),
    Single(Option<String>),
}

impl FieldValue {
    pub fn empty(mode: FieldMode) -> Self {
        match mode {
            FieldMode::Single => FieldValue::Single(None),
            FieldMode::Multiple => FieldValue::Multiple(Vec::new()),
        }
    }

    /// Reshapes a value the host handed over into the shape `mode` expects.
    /// A multi-file field holding a non-list value is treated as empty.
    pub fn coerce(self, mode: FieldMode) -> Self {
        match (mode, self) {
            (FieldMode::Single, FieldValue::Multiple(list)) => {
                FieldValue::Single(list.into_iter().next())
            }
            (FieldMode::Multiple, FieldValue::Single(_)) => FieldValue::Multiple(Vec::new()),
            (_, value) => value,
        }
    }

    pub fn references(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(reference) => reference.as_deref().into_iter().collect(),
            FieldValue::Multiple(list) => list.iter().map(String::as_str).collect(),
        }
    }
}
