//! # claimcheck-core
//!
//! Deterministic adjudication of image-claim verification.
//!
//! An NGO submits a photo together with the claims it is meant to evidence
//! ("Feeding People", "Travel Expense", ...). An inference backend either
//! scores the image against candidate text labels or describes it in free
//! text. This crate turns that raw model output into a verdict:
//! - Does the image satisfy one of the claims?
//! - Which claim, verbatim?
//! - How confident is the verdict, and why?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces byte-identical output
//! 2. **No model calls**: Inference happens elsewhere; this crate only judges
//! 3. **Verbatim matches**: `conditionMatches` is always an input title
//! 4. **Monotonic**: Every check can only tighten a verdict, never loosen it
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimcheck_core::{build_labels, adjudicate, Claim, ScoredLabel};
//!
//! let claims = vec![Claim::described("Feeding", "food distribution")];
//! let labels = build_labels(&claims)?;
//! let scores = vec![ScoredLabel::new("Feeding: food distribution", 0.95)];
//! let result = adjudicate(&scores, &claims, labels.label_to_claim(), false);
//!
//! assert!(result.satisfies_conditions);
//! assert_eq!(result.condition_matches(), Some("Feeding"));
//! ```

pub mod adjudicator;
pub mod labels;
pub mod matching;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types at crate root
pub use adjudicator::{adjudicate, ScoreAdjudicator};
pub use labels::{build_labels, CategoryError, CategoryRule, CategoryRules, LabelBuilder, LabelSet};
pub use request::{validate_request_schema, VerificationRequest};
pub use response::{parse_and_adjudicate, ModelVerdict, ResponseAdjudicator};
pub use types::{
    BestMatch, Claim, ScoredLabel, Verdict, VerdictDetails, VerificationResult,
    VerificationStatus,
};

use thiserror::Error;

/// Errors that abort a verification request before adjudication.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("No conditions provided")]
    NoConditions,

    #[error("No image provided")]
    MissingImage,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Category rules error: {0}")]
    Categories(#[from] CategoryError),
}

/// Adjudicate precomputed classifier scores for a request.
///
/// Labels are rebuilt from the request's claims so the label → claim lookup
/// matches what the classifier was asked about. The image is not needed.
pub fn verify_scores(
    request: &VerificationRequest,
    scores: &[ScoredLabel],
    builder: &LabelBuilder,
) -> VerificationResult {
    let outcome = request.claims().and_then(|claims| {
        let labels = builder.build(claims)?;
        Ok(adjudicate(scores, claims, labels.label_to_claim(), request.strict()))
    });

    outcome.unwrap_or_else(|e| VerificationResult::failure(e.to_string()))
}

/// Adjudicate a vision-language model response for a request.
pub fn verify_response(request: &VerificationRequest, raw_text: &str) -> VerificationResult {
    match request.claims() {
        Ok(claims) => parse_and_adjudicate(raw_text, claims, request.strict()),
        Err(e) => VerificationResult::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> VerificationRequest {
        VerificationRequest::from_json(json).unwrap()
    }

    #[test]
    fn test_feeding_end_to_end() {
        let request = request(
            r#"{"image": "abc", "conditions": [{"title": "Feeding", "description": "food distribution"}]}"#,
        );
        let scores = vec![ScoredLabel::new("Feeding: food distribution", 0.95)];
        let result = verify_scores(&request, &scores, &LabelBuilder::new());

        let value = result.to_json();
        assert_eq!(value["success"], true);
        assert_eq!(value["satisfiesConditions"], true);
        assert_eq!(value["conditionMatches"], "Feeding");
        assert_eq!(value["confidence"], 95.0);
    }

    #[test]
    fn test_empty_conditions_both_paths() {
        let request = request(r#"{"image": "abc", "conditions": []}"#);
        let expected = serde_json::json!({
            "success": false,
            "error": "No conditions provided",
            "satisfiesConditions": false,
        });

        let scored = verify_scores(&request, &[ScoredLabel::new("x", 0.99)], &LabelBuilder::new());
        assert_eq!(scored.to_json(), expected);
        assert_eq!(verify_response(&request, "VERIFIED").to_json(), expected);
    }

    #[test]
    fn test_response_path_uses_request_claims() {
        let request = request(
            r#"{"image": "abc", "conditions": [{"title": "Travel Expense"}], "requireStrictMatch": true}"#,
        );
        let result = verify_response(
            &request,
            r#"{"verification": "VERIFIED", "matchedCondition": "Travel Expense", "confidence": 90}"#,
        );
        assert!(result.satisfies_conditions);
        assert_eq!(result.condition_matches(), Some("Travel Expense"));
    }
}
