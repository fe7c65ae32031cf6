//! Request envelope parsing from JSON.

use serde::{Deserialize, Serialize};

use super::schema::validate_request_schema;
use crate::types::Claim;
use crate::VerificationError;

/// A verification request as received at the process boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Base64 image, optionally prefixed with a data-URL header
    #[serde(default)]
    pub image: Option<String>,

    /// Claims to check the image against
    #[serde(default)]
    pub conditions: Vec<Claim>,

    /// Raise all thresholds
    #[serde(default)]
    pub require_strict_match: Option<bool>,
}

impl VerificationRequest {
    /// Build a request programmatically. Claims are normalized.
    pub fn new(image: impl Into<String>, conditions: Vec<Claim>, strict: bool) -> Self {
        Self {
            image: Some(image.into()),
            conditions: conditions.iter().map(Claim::normalized).collect(),
            require_strict_match: Some(strict),
        }
    }

    /// Parse a request from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, VerificationError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse a request from a JSON value, validating it against the schema.
    ///
    /// Unknown fields are ignored. Titles and descriptions are trimmed.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, VerificationError> {
        validate_request_schema(value)
            .map_err(|errors| VerificationError::InvalidRequest(errors.join("; ")))?;

        let mut request: VerificationRequest = serde_json::from_value(value.clone())?;
        request.conditions = request.conditions.iter().map(Claim::normalized).collect();
        Ok(request)
    }

    /// Whether strict matching was requested (default `false`).
    pub fn strict(&self) -> bool {
        self.require_strict_match.unwrap_or(false)
    }

    /// The image payload; missing or blank images are an input error.
    pub fn image(&self) -> Result<&str, VerificationError> {
        match self.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => Ok(image),
            _ => Err(VerificationError::MissingImage),
        }
    }

    /// The claims; an empty list is an input error.
    pub fn claims(&self) -> Result<&[Claim], VerificationError> {
        if self.conditions.is_empty() {
            return Err(VerificationError::NoConditions);
        }
        Ok(&self.conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request = VerificationRequest::from_json(
            r#"{
                "image": "data:image/png;base64,iVBORw0KGgo=",
                "conditions": [{"title": " Feeding ", "description": "food distribution"}],
                "requireStrictMatch": true
            }"#,
        )
        .unwrap();

        assert!(request.strict());
        assert_eq!(request.claims().unwrap()[0].title, "Feeding");
        assert!(request.image().unwrap().starts_with("data:image/png"));
    }

    #[test]
    fn test_defaults() {
        let request = VerificationRequest::from_json(
            r#"{"image": "abc", "conditions": [{"title": "Feeding"}], "requireStrictMatch": null}"#,
        )
        .unwrap();
        assert!(!request.strict());
        assert!(request.conditions[0].description.is_none());
    }

    #[test]
    fn test_missing_image() {
        let request = VerificationRequest::from_json(r#"{"conditions": [{"title": "x"}]}"#).unwrap();
        let err = request.image().unwrap_err();
        assert_eq!(err.to_string(), "No image provided");

        let blank = VerificationRequest::from_json(r#"{"image": "  "}"#).unwrap();
        assert!(matches!(blank.image(), Err(VerificationError::MissingImage)));
    }

    #[test]
    fn test_empty_conditions() {
        let request = VerificationRequest::from_json(r#"{"image": "abc", "conditions": []}"#).unwrap();
        let err = request.claims().unwrap_err();
        assert_eq!(err.to_string(), "No conditions provided");
    }

    #[test]
    fn test_schema_violation() {
        let result = VerificationRequest::from_json(r#"{"conditions": "Feeding"}"#);
        assert!(matches!(result, Err(VerificationError::InvalidRequest(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = VerificationRequest::from_json("{not json");
        assert!(matches!(result, Err(VerificationError::Json(_))));
    }
}
