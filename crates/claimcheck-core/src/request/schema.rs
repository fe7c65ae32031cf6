//! JSON Schema validation for request envelopes.

use std::sync::OnceLock;

/// Embedded request schema (loaded at compile time).
const REQUEST_SCHEMA_JSON: &str = include_str!("../../schema/request.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(REQUEST_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a request JSON value against the schema.
///
/// Unknown top-level fields are allowed so callers can carry extra inputs
/// (precomputed scores, a model response) in the same document.
///
/// # Returns
///
/// * `Ok(())` - Request is structurally valid
/// * `Err(Vec<String>)` - One message per violation
pub fn validate_request_schema(request_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(request_json)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{} at {}", e, path)
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_passes_schema() {
        let value = serde_json::json!({
            "image": "aGVsbG8=",
            "conditions": [
                {"title": "Feeding", "description": "food distribution"},
                {"title": "Travel", "description": null},
                {"title": "Medical"}
            ],
            "requireStrictMatch": true
        });
        assert!(validate_request_schema(&value).is_ok());
    }

    #[test]
    fn test_empty_envelope_passes_schema() {
        // Missing image and conditions are reported with dedicated errors
        assert!(validate_request_schema(&serde_json::json!({})).is_ok());
    }

    #[test]
    fn test_wrong_types_fail() {
        let value = serde_json::json!({
            "image": 42,
            "conditions": [{"description": "no title"}],
            "requireStrictMatch": "yes"
        });
        let errors = validate_request_schema(&value).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("/conditions/0")));
    }

    #[test]
    fn test_non_object_fails() {
        assert!(validate_request_schema(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_extra_fields_allowed() {
        let value = serde_json::json!({
            "conditions": [{"title": "Feeding"}],
            "scores": [{"label": "Feeding", "score": 0.9}]
        });
        assert!(validate_request_schema(&value).is_ok());
    }
}
