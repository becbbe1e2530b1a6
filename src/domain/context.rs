//! The structured object produced by REFINE (`enriched_context.json`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FIELD_PROVIDER: &str = "provider";
pub const FIELD_MODEL: &str = "model";
pub const FIELD_LANGUAGE: &str = "detected_language";

/// A mapping from field name to value, conforming to the schema assembled for
/// the job (`crate::templates::schema`). Always carries provider/model identity
/// and the detected language alongside the schema-declared fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedContext {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EnrichedContext {
    pub fn new(provider: &str, model: &str, detected_language: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_PROVIDER.to_string(), Value::String(provider.to_string()));
        fields.insert(FIELD_MODEL.to_string(), Value::String(model.to_string()));
        fields.insert(FIELD_LANGUAGE.to_string(), Value::String(detected_language.to_string()));
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
