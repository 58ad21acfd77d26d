//! Response redaction.

use crate::config::DEFAULT_SENSITIVE_FIELDS;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Replacement for every masked value.
pub const MASK: &str = "********";

/// Masks sensitive fields anywhere in a JSON payload.
///
/// Keys are matched by their lowercase form. A matched key's value is
/// replaced wholesale, whatever its type; everything else is copied.
#[derive(Debug, Clone)]
pub struct Redactor {
    fields: HashSet<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_FIELDS)
    }
}

impl Redactor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.fields.contains(&key.to_lowercase())
    }

    /// Return a masked copy of `value`.
    pub fn mask(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.mask_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.mask(v)).collect()),
            scalar => scalar.clone(),
        }
    }

    fn mask_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                let masked = if self.is_sensitive(key) {
                    Value::String(MASK.to_string())
                } else {
                    self.mask(value)
                };
                (key.clone(), masked)
            })
            .collect()
    }
}
