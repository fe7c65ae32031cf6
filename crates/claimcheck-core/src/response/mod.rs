//! Generative-path adjudication.
//!
//! A vision-language model answers the verification prompt with free text.
//! [`ResponseAdjudicator`] parses that text into a [`ModelVerdict`], maps the
//! named claim back onto the request's claims, and applies the downgrade
//! rules:
//!
//! - a named claim that matches no input title voids a `VERIFIED` verdict
//! - `VERIFIED` below [`MIN_VERIFIED_CONFIDENCE`] becomes `PARTIALLY VERIFIED`
//! - only `VERIFIED` satisfies the claims

mod parser;

pub use parser::{
    parse_model_response, parse_structured, scan_keywords, HeuristicVerdict, ModelVerdict,
    StructuredVerdict,
};

use crate::matching::{find_claim_title, is_claim_title};
use crate::types::{Claim, Verdict, VerdictDetails, VerificationResult, VerificationStatus};
use crate::VerificationError;

/// `VERIFIED` verdicts below this confidence are downgraded to partial.
pub const MIN_VERIFIED_CONFIDENCE: f64 = 70.0;

/// Confidence removed when the model names a claim that does not exist.
pub const UNKNOWN_CLAIM_PENALTY: f64 = 20.0;

/// Weight of each description word found in the response.
pub const DESCRIPTION_WORD_WEIGHT: usize = 5;

/// Characters of raw text used as the reason when the model gives none.
pub const REASON_FALLBACK_CHARS: usize = 500;

/// Characters of raw text echoed back in `details.rawResponse`.
pub const RAW_RESPONSE_CHARS: usize = 1000;

const DEFAULT_IMAGE_DESCRIPTION: &str = "Analysis completed";

/// Turns model text into a verdict against a fixed set of claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAdjudicator {
    strict: bool,
}

impl ResponseAdjudicator {
    /// `strict` is carried for symmetry with the classification path. On
    /// this path strictness is expressed in the prompt, not in parsing.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Parse `raw_text` and adjudicate it against `claims`.
    pub fn adjudicate(&self, raw_text: &str, claims: &[Claim]) -> VerificationResult {
        let claims: Vec<Claim> = claims.iter().map(Claim::normalized).collect();
        if claims.iter().all(|c| c.title.is_empty()) {
            return VerificationResult::failure(VerificationError::NoConditions.to_string());
        }

        let verdict = parse_model_response(raw_text);
        let mut status = verdict.status();
        let mut confidence = verdict.confidence();

        tracing::debug!(
            status = %status,
            confidence,
            structured = verdict.is_structured(),
            strict = self.strict,
            "Parsed model response"
        );

        let reason = verdict
            .reason()
            .map(str::to_string)
            .unwrap_or_else(|| truncate_chars(raw_text.trim(), REASON_FALLBACK_CHARS));

        let matched = match verdict.matched_condition() {
            Some(named) => {
                match resolve_named_claim(named, &claims) {
                    Some(title) => Some(title),
                    None => {
                        tracing::warn!(named, "Model named a claim that is not in the request");
                        if status == VerificationStatus::Verified {
                            status = VerificationStatus::NotVerified;
                            confidence = (confidence - UNKNOWN_CLAIM_PENALTY).max(0.0);
                        }
                        None
                    }
                }
            }
            None if status.reports_match() => scan_for_claim(raw_text, &claims),
            None => None,
        };

        if status == VerificationStatus::Verified && confidence < MIN_VERIFIED_CONFIDENCE {
            tracing::warn!(
                confidence,
                required = MIN_VERIFIED_CONFIDENCE,
                "Confidence too low for VERIFIED, downgrading to PARTIALLY VERIFIED"
            );
            status = VerificationStatus::PartiallyVerified;
        }

        let confidence = confidence.clamp(0.0, 100.0);
        let matched = matched.filter(|_| status.reports_match());
        let satisfies = status.is_satisfied() && matched.is_some();

        if status.is_satisfied() && matched.is_none() {
            tracing::warn!("VERIFIED response did not identify a claim, not satisfied");
        }

        let condition_analysis = claims
            .iter()
            .map(|claim| match matched.as_deref() {
                Some(title) if title == claim.title && status.reports_match() => {
                    format!("{}: {} - {}% confidence", claim.title, status, confidence)
                }
                _ => format!("{}: {}", claim.title, VerificationStatus::NotVerified),
            })
            .collect();

        let evidence = verdict.evidence().map(str::to_string);
        let mut reasoning = format!("Model analysis: {}", reason);
        if let Some(evidence) = &evidence {
            reasoning.push_str(&format!(" Evidence: {}", evidence));
        }

        tracing::info!(
            status = %status,
            confidence,
            matched = matched.as_deref().unwrap_or("none"),
            "Generative verification complete"
        );

        let details = VerdictDetails {
            what_is_in_image: verdict
                .what_is_in_image()
                .unwrap_or(DEFAULT_IMAGE_DESCRIPTION)
                .to_string(),
            why_it_matches_or_not: reason,
            condition_analysis,
            evidence,
            all_scores: None,
            raw_response: Some(truncate_chars(raw_text, RAW_RESPONSE_CHARS)),
        };

        VerificationResult::completed(
            satisfies,
            Verdict {
                verification_status: Some(status),
                condition_matches: matched,
                confidence,
                is_ai_generated: false,
                reasoning,
                details,
                best_match: None,
                verification_method: None,
            },
        )
    }
}

/// Parse and adjudicate a model response in one call.
pub fn parse_and_adjudicate(raw_text: &str, claims: &[Claim], strict: bool) -> VerificationResult {
    ResponseAdjudicator::new(strict).adjudicate(raw_text, claims)
}

/// Map a model-supplied claim name onto an input title.
fn resolve_named_claim(named: &str, claims: &[Claim]) -> Option<String> {
    if is_claim_title(named, claims) {
        return Some(named.to_string());
    }
    find_claim_title(named, claims).map(str::to_string)
}

/// Find the claim a free-text response talks about.
///
/// A title found in the text scores its length in characters; description
/// words found in the text score [`DESCRIPTION_WORD_WEIGHT`] each. Both
/// compete on one scale and the first strictly higher score wins.
fn scan_for_claim(raw_text: &str, claims: &[Claim]) -> Option<String> {
    let text = raw_text.to_lowercase();
    let mut best: Option<&Claim> = None;
    let mut best_score = 0usize;

    for claim in claims {
        let title = claim.title.to_lowercase();
        if !title.is_empty() && text.contains(&title) {
            let score = title.chars().count();
            if score > best_score {
                best = Some(claim);
                best_score = score;
            }
        }

        let description = claim.description_text().to_lowercase();
        let matched_words = description
            .split_whitespace()
            .filter(|word| text.contains(word))
            .count();
        if matched_words > 0 {
            let score = matched_words * DESCRIPTION_WORD_WEIGHT;
            if score > best_score {
                best = Some(claim);
                best_score = score;
            }
        }
    }

    if let Some(claim) = best {
        tracing::debug!(claim = %claim.title, score = best_score, "Claim found in response text");
    }
    best.map(|c| c.title.clone())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
