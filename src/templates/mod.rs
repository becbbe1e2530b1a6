//! Template registry & schema collection (§4.4).

pub mod registry;
pub mod schema;

pub use registry::{TemplateDef, TemplateRegistry};
pub use schema::{assemble_schema, default_schema, FieldSpec, FieldStructure};
