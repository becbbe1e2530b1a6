//! Field-schema assembly across a job's artifact list.
//!
//! Schema assembly is a fold over the artifact list that merges per-template
//! field declarations by name, failing on structural conflict
//! (`TemplateSchemaConflict`). The fold is commutative and idempotent: the
//! final schema does not depend on artifact order, and folding it into itself
//! again changes nothing (§8).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// A structure descriptor over primitive field types: either a primitive tag
/// or a shape descriptor (array / nested object) over those primitives.
///
/// On the wire (YAML/JSON) this is either a bare scalar (`"string"`,
/// `"number"`) or a single-key mapping (`{array: <structure>}` /
/// `{object: {field: <structure>, ...}}`); see [`RawStructure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStructure {
    Primitive(String),
    Array(Box<FieldStructure>),
    Object(BTreeMap<String, FieldStructure>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawStructure {
    Primitive(String),
    Array { array: Box<RawStructure> },
    Object { object: BTreeMap<String, RawStructure> },
}

impl From<RawStructure> for FieldStructure {
    fn from(raw: RawStructure) -> Self {
        match raw {
            RawStructure::Primitive(p) => FieldStructure::Primitive(p),
            RawStructure::Array { array } => FieldStructure::Array(Box::new((*array).into())),
            RawStructure::Object { object } => {
                FieldStructure::Object(object.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<FieldStructure> for RawStructure {
    fn from(structure: FieldStructure) -> Self {
        match structure {
            FieldStructure::Primitive(p) => RawStructure::Primitive(p),
            FieldStructure::Array(inner) => RawStructure::Array { array: Box::new((*inner).into()) },
            FieldStructure::Object(fields) => {
                RawStructure::Object { object: fields.into_iter().map(|(k, v)| (k, v.into())).collect() }
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldStructure {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawStructure::deserialize(deserializer).map(Into::into)
    }
}

impl Serialize for FieldStructure {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RawStructure::from(self.clone()).serialize(serializer)
    }
}

impl std::fmt::Display for FieldStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldStructure::Primitive(p) => write!(f, "{p}"),
            FieldStructure::Array(inner) => write!(f, "array<{inner}>"),
            FieldStructure::Object(fields) => {
                write!(f, "object{{")?;
                for (i, (name, structure)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {structure}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub description: String,
    pub structure: FieldStructure,
}

/// The default schema used when the artifact list is empty or no configured
/// template declares any fields.
pub fn default_schema() -> BTreeMap<String, FieldSpec> {
    let primitive = |desc: &str| FieldSpec {
        description: desc.to_string(),
        structure: FieldStructure::Primitive("string".to_string()),
    };
    let array_of_strings = |desc: &str| FieldSpec {
        description: desc.to_string(),
        structure: FieldStructure::Array(Box::new(FieldStructure::Primitive("string".to_string()))),
    };
    BTreeMap::from([
        ("clean_text".to_string(), primitive("A cleaned, readable transcript")),
        ("summary".to_string(), primitive("A short prose summary")),
        ("key_takeaways".to_string(), array_of_strings("The most important points")),
        ("participants".to_string(), array_of_strings("Names or labels of speakers")),
        ("quotes".to_string(), array_of_strings("Notable verbatim quotes")),
        ("action_items".to_string(), array_of_strings("Follow-up tasks mentioned")),
    ])
}

/// Fold a sequence of per-template schemas into one, merging by field name and
/// failing when two templates declare the same field with different
/// structures.
pub fn assemble_schema<'a>(
    template_schemas: impl IntoIterator<Item = &'a BTreeMap<String, FieldSpec>>,
) -> Result<BTreeMap<String, FieldSpec>> {
    let mut merged: BTreeMap<String, FieldSpec> = BTreeMap::new();
    for schema in template_schemas {
        for (field, spec) in schema {
            match merged.get(field) {
                None => {
                    merged.insert(field.clone(), spec.clone());
                }
                Some(existing) if existing.structure == spec.structure => {}
                Some(existing) => {
                    return Err(Error::TemplateSchemaConflict {
                        field: field.clone(),
                        a: existing.structure.to_string(),
                        b: spec.structure.to_string(),
                    });
                }
            }
        }
    }
    if merged.is_empty() {
        merged = default_schema();
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(structure: FieldStructure) -> FieldSpec {
        FieldSpec { description: "d".to_string(), structure }
    }

    #[test]
    fn empty_artifact_list_falls_back_to_default_schema() {
        let merged = assemble_schema(std::iter::empty()).unwrap();
        assert_eq!(merged, default_schema());
    }

    #[test]
    fn agreeing_fields_merge_without_conflict() {
        let a = BTreeMap::from([("participants".to_string(), spec(FieldStructure::Array(Box::new(FieldStructure::Primitive("string".into())))))]);
        let b = BTreeMap::from([("participants".to_string(), spec(FieldStructure::Array(Box::new(FieldStructure::Primitive("string".into())))))]);
        let merged = assemble_schema([&a, &b]).unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn conflicting_structures_fail_assembly() {
        let a = BTreeMap::from([("participants".to_string(), spec(FieldStructure::Primitive("string".into())))]);
        let b = BTreeMap::from([(
            "participants".to_string(),
            spec(FieldStructure::Array(Box::new(FieldStructure::Primitive("string".into())))),
        )]);
        let err = assemble_schema([&a, &b]).unwrap_err();
        assert!(matches!(err, Error::TemplateSchemaConflict { .. }));
    }

    #[test]
    fn assembly_is_commutative_and_idempotent() {
        let a = BTreeMap::from([("x".to_string(), spec(FieldStructure::Primitive("number".into())))]);
        let b = BTreeMap::from([("y".to_string(), spec(FieldStructure::Primitive("string".into())))]);
        let forward = assemble_schema([&a, &b]).unwrap();
        let backward = assemble_schema([&b, &a]).unwrap();
        assert_eq!(forward, backward);
        let twice = assemble_schema([&forward.clone()]).unwrap();
        assert_eq!(twice, forward);
    }
}
