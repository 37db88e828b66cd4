//! JSON schema validation with path-qualified error reporting (spec §4.5).

use std::path::Path;

use serde_json::Value;

use crate::error::SchemaValidationError;
use crate::logging::RunLogger;

/// Validates `data` against the schema document at `schema_path`. Failures
/// surface the offending JSON pointer path and are logged as a
/// validation-failure event when a logger is supplied.
pub fn validate_json_schema(
    data: &Value,
    schema_path: &Path,
    step: &str,
    logger: Option<&RunLogger>,
) -> Result<(), SchemaValidationError> {
    if !schema_path.exists() {
        return Err(SchemaValidationError::SchemaNotFound(schema_path.to_path_buf()));
    }

    let schema_text =
        std::fs::read_to_string(schema_path).map_err(|_| SchemaValidationError::SchemaNotFound(schema_path.to_path_buf()))?;
    let schema: Value = serde_json::from_str(&schema_text).map_err(|source| {
        SchemaValidationError::InvalidSchema {
            path: schema_path.to_path_buf(),
            source,
        }
    })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| SchemaValidationError::Validation {
        message: format!("invalid schema in {}: {e}", schema_path.display()),
        path: None,
    })?;

    let errors: Vec<_> = validator.iter_errors(data).collect();
    if let Some(first) = errors.first() {
        let pointer = first.instance_path.to_string();
        let message = first.to_string();
        if let Some(logger) = logger {
            logger.log_validation_failure(step, &format!("{message} (at path: {pointer})"));
        }
        return Err(SchemaValidationError::Validation {
            message,
            path: if pointer.is_empty() { None } else { Some(pointer) },
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn write_schema(schema: &Value) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), schema.to_string()).unwrap();
        file
    }

    #[test]
    fn valid_document_passes() {
        let schema = json!({
            "type": "object",
            "required": ["beats"],
            "properties": { "beats": { "type": "array" } }
        });
        let file = write_schema(&schema);
        let data = json!({ "beats": [] });
        assert!(validate_json_schema(&data, file.path(), "test", None).is_ok());
    }

    #[test]
    fn invalid_document_reports_path() {
        let schema = json!({
            "type": "object",
            "required": ["beats"],
            "properties": { "beats": { "type": "array" } }
        });
        let file = write_schema(&schema);
        let data = json!({ "beats": "not-an-array" });
        let err = validate_json_schema(&data, file.path(), "test", None).unwrap_err();
        match err {
            SchemaValidationError::Validation { path, .. } => {
                assert_eq!(path.as_deref(), Some("/beats"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_schema_file_errors() {
        let err = validate_json_schema(&json!({}), Path::new("/no/such/schema.json"), "test", None).unwrap_err();
        assert!(matches!(err, SchemaValidationError::SchemaNotFound(_)));
    }
}
