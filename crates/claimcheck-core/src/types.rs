//! Core types for claim verification.
//!
//! Everything here lives for a single request: claims come in with the
//! request envelope, scored labels or a model response come back from an
//! inference backend, and a [`VerificationResult`] goes out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An NGO's stated justification for an expense or activity.
///
/// `title` is the primary key used when matching model output back to a
/// claim. Titles are compared verbatim once trimmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    /// Short claim name (e.g., "Feeding People")
    pub title: String,

    /// Optional free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Claim {
    /// Create a claim, trimming surrounding whitespace from both fields.
    ///
    /// An all-whitespace description is treated as absent.
    pub fn new(title: impl Into<String>, description: Option<impl Into<String>>) -> Self {
        let title = title.into().trim().to_string();
        let description = description
            .map(|d| d.into().trim().to_string())
            .filter(|d| !d.is_empty());
        Self { title, description }
    }

    /// Claim with a title only.
    pub fn titled(title: impl Into<String>) -> Self {
        Self::new(title, None::<String>)
    }

    /// Claim with a title and description.
    pub fn described(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, Some(description))
    }

    /// The description, or an empty string when absent.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Return a copy with trimmed fields.
    pub fn normalized(&self) -> Self {
        Self::new(self.title.clone(), self.description.clone())
    }
}

/// One (label, score) pair returned by a zero-shot classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredLabel {
    pub label: String,

    /// Probability in `[0, 1]`
    pub score: f64,
}

impl ScoredLabel {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Tri-state verdict reported by the generative path.
///
/// Only [`VerificationStatus::Verified`] satisfies the claims.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VerificationStatus {
    #[serde(rename = "VERIFIED")]
    Verified,

    #[serde(rename = "PARTIALLY VERIFIED")]
    PartiallyVerified,

    #[serde(rename = "NOT VERIFIED")]
    NotVerified,
}

impl VerificationStatus {
    /// Parse a status as written by a language model.
    ///
    /// Case, underscores and hyphens are ignored, so `"partially_verified"`
    /// and `"Partially Verified"` both parse. Returns `None` for anything
    /// else.
    pub fn from_model_text(text: &str) -> Option<Self> {
        let normalized = text
            .trim()
            .to_uppercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "VERIFIED" => Some(Self::Verified),
            "PARTIALLY VERIFIED" => Some(Self::PartiallyVerified),
            "NOT VERIFIED" => Some(Self::NotVerified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::PartiallyVerified => "PARTIALLY VERIFIED",
            Self::NotVerified => "NOT VERIFIED",
        }
    }

    /// Whether this status satisfies the claims.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Whether a matched claim is reported for this status.
    pub fn reports_match(&self) -> bool {
        matches!(self, Self::Verified | Self::PartiallyVerified)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supporting detail for a verdict.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerdictDetails {
    pub what_is_in_image: String,

    pub why_it_matches_or_not: String,

    /// One line per input claim, in input order
    pub condition_analysis: Vec<String>,

    /// Visual evidence quoted by a language model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    /// Aggregated per-claim percentage scores (classification path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_scores: Option<BTreeMap<String, f64>>,

    /// Leading slice of the raw model text (generative path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Echo of the top-ranked classifier label.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BestMatch {
    /// Claim title the label resolved to, if any
    pub condition: Option<String>,

    /// Percentage score
    pub score: f64,

    pub label: Option<String>,
}

/// The semantic payload of a successful verification.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,

    /// Matched claim title, drawn verbatim from the input claims
    pub condition_matches: Option<String>,

    /// Percentage in `[0, 100]`
    pub confidence: f64,

    /// Reserved for an AI-generation detector; always `false` here
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,

    pub reasoning: String,

    pub details: VerdictDetails,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match: Option<BestMatch>,

    /// Backend model that produced the verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
}

/// The sole externally visible artifact of a request.
///
/// Serializes to `{"success": false, "error": ..., "satisfiesConditions":
/// false}` on failure, and to the flattened [`Verdict`] fields on success.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub satisfies_conditions: bool,

    #[serde(flatten)]
    pub verdict: Option<Verdict>,
}

impl VerificationResult {
    /// A successful result. `satisfiesConditions` is taken from `satisfies`.
    pub fn completed(satisfies: bool, verdict: Verdict) -> Self {
        Self {
            success: true,
            error: None,
            satisfies_conditions: satisfies,
            verdict: Some(verdict),
        }
    }

    /// A failed request. No verdict fields are emitted.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            satisfies_conditions: false,
            verdict: None,
        }
    }

    /// Matched claim title, if the verdict names one.
    pub fn condition_matches(&self) -> Option<&str> {
        self.verdict
            .as_ref()
            .and_then(|v| v.condition_matches.as_deref())
    }

    /// Confidence percentage, or 0 for failures.
    pub fn confidence(&self) -> f64 {
        self.verdict.as_ref().map(|v| v.confidence).unwrap_or(0.0)
    }

    /// Tri-state status, present on generative-path results.
    pub fn status(&self) -> Option<VerificationStatus> {
        self.verdict.as_ref().and_then(|v| v.verification_status)
    }

    /// Attach the name of the backend model that produced this result.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        if let Some(verdict) = self.verdict.as_mut() {
            verdict.verification_method = Some(method.into());
        }
        self
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain string, number, bool, map or sequence.
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "satisfiesConditions": false,
            })
        })
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_trims_fields() {
        let claim = Claim::described("  Feeding  ", "  food distribution ");
        assert_eq!(claim.title, "Feeding");
        assert_eq!(claim.description.as_deref(), Some("food distribution"));

        let blank = Claim::described("Travel", "   ");
        assert!(blank.description.is_none());
        assert_eq!(blank.description_text(), "");
    }

    #[test]
    fn test_status_from_model_text() {
        assert_eq!(
            VerificationStatus::from_model_text("verified"),
            Some(VerificationStatus::Verified)
        );
        assert_eq!(
            VerificationStatus::from_model_text("PARTIALLY_VERIFIED"),
            Some(VerificationStatus::PartiallyVerified)
        );
        assert_eq!(
            VerificationStatus::from_model_text(" Not  Verified "),
            Some(VerificationStatus::NotVerified)
        );
        assert_eq!(VerificationStatus::from_model_text("maybe"), None);
    }

    #[test]
    fn test_status_serializes_with_spaces() {
        let json = serde_json::to_string(&VerificationStatus::PartiallyVerified).unwrap();
        assert_eq!(json, "\"PARTIALLY VERIFIED\"");
    }

    #[test]
    fn test_failure_shape() {
        let value = VerificationResult::failure("No conditions provided").to_json();
        assert_eq!(
            value,
            serde_json::json!({
                "success": false,
                "error": "No conditions provided",
                "satisfiesConditions": false,
            })
        );
    }

    #[test]
    fn test_success_emits_null_condition_matches() {
        let verdict = Verdict {
            verification_status: None,
            condition_matches: None,
            confidence: 42.0,
            is_ai_generated: false,
            reasoning: "r".into(),
            details: VerdictDetails::default(),
            best_match: None,
            verification_method: None,
        };
        let value = VerificationResult::completed(false, verdict).to_json();

        assert_eq!(value["success"], true);
        assert!(value["conditionMatches"].is_null());
        assert!(value.get("error").is_none());
        assert!(value.get("verificationStatus").is_none());
        assert_eq!(value["isAIGenerated"], false);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.95 * 100.0), 95.0);
        assert_eq!(round2(91.23456), 91.23);
    }
}
