//! Parsing of free-form vision-language model responses.
//!
//! Models are asked for a JSON object but do not always produce one. The
//! parser first tries the span between the first `{` and the last `}`; if
//! that is not a usable object it falls back to scanning the text for
//! verdict keywords.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::types::VerificationStatus;

/// Confidence assumed when a structured response omits it.
pub const STRUCTURED_DEFAULT_CONFIDENCE: f64 = 50.0;

/// Confidence for a keyword-scanned partial verdict.
pub const PARTIAL_KEYWORD_CONFIDENCE: f64 = 60.0;

/// Confidence for a keyword-scanned positive verdict without a number.
pub const VERIFIED_KEYWORD_CONFIDENCE: f64 = 75.0;

/// Confidence for a keyword-scanned negative or unrecognised verdict.
pub const NOT_VERIFIED_KEYWORD_CONFIDENCE: f64 = 30.0;

lazy_static! {
    static ref PARTIAL_PATTERN: Regex = Regex::new(r"(?i)\bpartially[\s_-]+verified\b").unwrap();

    static ref NOT_VERIFIED_PATTERN: Regex = Regex::new(r"(?i)\bnot[\s_-]+verified\b").unwrap();

    static ref VERIFIED_PATTERN: Regex = Regex::new(r"(?i)\bverified\b").unwrap();

    /// `"confidence": 85` as it appears in half-formed JSON
    static ref CONFIDENCE_PATTERN: Regex = Regex::new(r#"(?i)"confidence"\s*:\s*(\d+)"#).unwrap();
}

/// `confidence` as models write it: a number, or a string like `"85%"`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
enum ConfidenceField {
    Number(f64),
    Text(String),
}

impl ConfidenceField {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        }
    }
}

/// The JSON object a model is asked to return. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    #[serde(default)]
    verification: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    matched_condition: Option<String>,
    #[serde(default)]
    confidence: Option<ConfidenceField>,
    #[serde(default)]
    what_is_in_image: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
}

/// A verdict read from a well-formed JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredVerdict {
    pub status: VerificationStatus,
    pub reason: Option<String>,
    pub matched_condition: Option<String>,
    pub confidence: f64,
    pub what_is_in_image: Option<String>,
    pub evidence: Option<String>,
}

/// A verdict recovered by keyword scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicVerdict {
    pub status: VerificationStatus,
    pub confidence: f64,
}

/// What the parser could make of a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelVerdict {
    Structured(StructuredVerdict),
    Heuristic(HeuristicVerdict),
}

impl ModelVerdict {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Structured(v) => v.status,
            Self::Heuristic(v) => v.status,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Structured(v) => v.confidence,
            Self::Heuristic(v) => v.confidence,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Structured(v) => v.reason.as_deref(),
            Self::Heuristic(_) => None,
        }
    }

    pub fn matched_condition(&self) -> Option<&str> {
        match self {
            Self::Structured(v) => v.matched_condition.as_deref(),
            Self::Heuristic(_) => None,
        }
    }

    pub fn what_is_in_image(&self) -> Option<&str> {
        match self {
            Self::Structured(v) => v.what_is_in_image.as_deref(),
            Self::Heuristic(_) => None,
        }
    }

    pub fn evidence(&self) -> Option<&str> {
        match self {
            Self::Structured(v) => v.evidence.as_deref(),
            Self::Heuristic(_) => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Parse a model response, preferring the embedded JSON object.
pub fn parse_model_response(raw_text: &str) -> ModelVerdict {
    match parse_structured(raw_text) {
        Some(verdict) => ModelVerdict::Structured(verdict),
        None => {
            tracing::debug!("No usable JSON object in response, scanning keywords");
            ModelVerdict::Heuristic(scan_keywords(raw_text))
        }
    }
}

/// Parse the span from the first `{` to the last `}` as a verdict object.
pub fn parse_structured(raw_text: &str) -> Option<StructuredVerdict> {
    let start = raw_text.find('{')?;
    let end = raw_text.rfind('}')?;
    if end < start {
        return None;
    }

    let raw: RawVerdict = match serde_json::from_str(&raw_text[start..=end]) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "Embedded JSON did not parse");
            return None;
        }
    };

    let status = raw
        .verification
        .as_deref()
        .and_then(VerificationStatus::from_model_text)
        .unwrap_or(VerificationStatus::NotVerified);

    let confidence = raw
        .confidence
        .as_ref()
        .and_then(ConfidenceField::value)
        .unwrap_or(STRUCTURED_DEFAULT_CONFIDENCE);

    Some(StructuredVerdict {
        status,
        reason: non_empty(raw.reason),
        matched_condition: non_empty(raw.matched_condition).filter(|m| !is_null_word(m)),
        confidence,
        what_is_in_image: non_empty(raw.what_is_in_image),
        evidence: non_empty(raw.evidence),
    })
}

/// Recover a verdict from verdict keywords in free text.
///
/// Partial wins over everything and "NOT VERIFIED" wins over a bare
/// "VERIFIED". Anything else, including "no match" or "does not" without
/// a positive keyword, is not verified.
pub fn scan_keywords(raw_text: &str) -> HeuristicVerdict {
    if PARTIAL_PATTERN.is_match(raw_text) {
        return HeuristicVerdict {
            status: VerificationStatus::PartiallyVerified,
            confidence: PARTIAL_KEYWORD_CONFIDENCE,
        };
    }

    if NOT_VERIFIED_PATTERN.is_match(raw_text) {
        return HeuristicVerdict {
            status: VerificationStatus::NotVerified,
            confidence: NOT_VERIFIED_KEYWORD_CONFIDENCE,
        };
    }

    if VERIFIED_PATTERN.is_match(raw_text) {
        let confidence = CONFIDENCE_PATTERN
            .captures(raw_text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(VERIFIED_KEYWORD_CONFIDENCE);

        return HeuristicVerdict {
            status: VerificationStatus::Verified,
            confidence,
        };
    }

    HeuristicVerdict {
        status: VerificationStatus::NotVerified,
        confidence: NOT_VERIFIED_KEYWORD_CONFIDENCE,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Models often write the string "null" instead of JSON null.
fn is_null_word(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "null" | "none" | "n/a")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_response() {
        let verdict = parse_model_response(
            r#"Sure! {"verification": "VERIFIED", "reason": "People queue for rice.",
               "matchedCondition": "Feeding", "confidence": 88,
               "whatIsInImage": "A food line", "evidence": "rice sacks"} Hope this helps."#,
        );

        assert!(verdict.is_structured());
        assert_eq!(verdict.status(), VerificationStatus::Verified);
        assert_eq!(verdict.confidence(), 88.0);
        assert_eq!(verdict.matched_condition(), Some("Feeding"));
        assert_eq!(verdict.reason(), Some("People queue for rice."));
        assert_eq!(verdict.evidence(), Some("rice sacks"));
        assert_eq!(verdict.what_is_in_image(), Some("A food line"));
    }

    #[test]
    fn test_structured_defaults() {
        let verdict = parse_model_response(r#"{"reason": "blurry"}"#);
        assert!(verdict.is_structured());
        assert_eq!(verdict.status(), VerificationStatus::NotVerified);
        assert_eq!(verdict.confidence(), STRUCTURED_DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_string_confidence_and_null_match() {
        let verdict = parse_model_response(
            r#"{"verification": "partially verified", "confidence": "64%", "matchedCondition": "null"}"#,
        );
        assert_eq!(verdict.status(), VerificationStatus::PartiallyVerified);
        assert_eq!(verdict.confidence(), 64.0);
        assert_eq!(verdict.matched_condition(), None);
    }

    #[test]
    fn test_broken_json_falls_back() {
        let verdict = parse_model_response(r#"{"verification": "VERIFIED", "confidence": 91,"#);
        assert!(!verdict.is_structured());
        assert_eq!(verdict.status(), VerificationStatus::Verified);
        assert_eq!(verdict.confidence(), 91.0);
    }

    #[test]
    fn test_keyword_not_verified() {
        let verdict = parse_model_response("The image is NOT VERIFIED against any claim.");
        assert_eq!(verdict.status(), VerificationStatus::NotVerified);
        assert_eq!(verdict.confidence(), 30.0);
    }

    #[test]
    fn test_keyword_partial() {
        let verdict = parse_model_response("Result: partially verified");
        assert_eq!(verdict.status(), VerificationStatus::PartiallyVerified);
        assert_eq!(verdict.confidence(), 60.0);
    }

    #[test]
    fn test_keyword_verified_default_confidence() {
        let verdict = parse_model_response("VERIFIED - the photo shows a food line");
        assert_eq!(verdict.status(), VerificationStatus::Verified);
        assert_eq!(verdict.confidence(), 75.0);
    }

    #[test]
    fn test_keyword_other_negatives() {
        assert_eq!(
            scan_keywords("This does not show feeding").status,
            VerificationStatus::NotVerified
        );
        assert_eq!(scan_keywords("No match.").status, VerificationStatus::NotVerified);
        assert_eq!(scan_keywords("unverified").status, VerificationStatus::NotVerified);
        assert_eq!(scan_keywords("").confidence, 30.0);
    }

    #[test]
    fn test_verified_survives_incidental_negatives() {
        let verdict =
            scan_keywords("VERIFIED: the image shows Feeding. It does not show any vehicles.");
        assert_eq!(verdict.status, VerificationStatus::Verified);
        assert_eq!(verdict.confidence, 75.0);

        let verdict = scan_keywords("VERIFIED - Feeding matches; no match for other claims.");
        assert_eq!(verdict.status, VerificationStatus::Verified);
    }

    #[test]
    fn test_reversed_braces() {
        let verdict = parse_model_response("} VERIFIED {");
        assert!(!verdict.is_structured());
    }
}
