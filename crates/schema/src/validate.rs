//! Structural validation of tool parameter schemas.

use crate::augment::remove_custom_fields;
use crate::error::{Result, SchemaError};
use serde_json::Value;

/// Check that `schema` (with custom keys stripped) is a valid JSON Schema draft-07 document.
///
/// This is a meta-schema check; no instance is validated against `schema`.
///
/// # Errors
///
/// Returns [`SchemaError::Invalid`] naming `tool` when the cleaned schema fails the check.
pub fn validate_parameters(tool: &str, schema: &Value) -> Result<()> {
    let cleaned = remove_custom_fields(schema);
    jsonschema::draft7::meta::validate(&cleaned).map_err(|e| SchemaError::Invalid {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
