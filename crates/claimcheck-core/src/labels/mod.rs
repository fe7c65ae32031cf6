//! Candidate label construction for zero-shot classification.
//!
//! Each claim is expanded into several phrasings so the classifier has more
//! than one chance to recognise the activity. Every emitted label remembers
//! the claim it came from.

mod categories;

pub use categories::{CategoryError, CategoryRule, CategoryRules};

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::types::Claim;
use crate::VerificationError;

/// Candidate labels plus the label → claim lookup built alongside them.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSet {
    /// Labels in first-emitted order
    labels: Vec<String>,

    /// Owning claim per label; the first claim to emit a label keeps it
    label_to_claim: BTreeMap<String, Claim>,
}

impl LabelSet {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_to_claim(&self) -> &BTreeMap<String, Claim> {
        &self.label_to_claim
    }

    /// Claim that emitted `label`, if any.
    pub fn claim_for(&self, label: &str) -> Option<&Claim> {
        self.label_to_claim.get(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Builds category-aware candidate labels from claims.
#[derive(Debug, Clone, Default)]
pub struct LabelBuilder {
    rules: CategoryRules,
}

impl LabelBuilder {
    /// Builder using the built-in category table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using a custom category table.
    pub fn with_rules(rules: CategoryRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    /// Label template for one claim, before de-duplication.
    ///
    /// Category claims get `[combined, phrases.., title, description]`;
    /// everything else gets `[combined, description, title]`. `combined` is
    /// `"title: description"`, falling back to the title, and a missing
    /// description falls back to the title as well.
    pub fn template(&self, claim: &Claim) -> Vec<String> {
        let title = claim.title.as_str();
        let description = claim.description_text();

        let combined = if description.is_empty() {
            title.to_string()
        } else {
            format!("{}: {}", title, description)
        };
        let description_or_title = if description.is_empty() {
            title.to_string()
        } else {
            description.to_string()
        };

        // Detection only; emitted labels keep the original casing
        let detect_text = format!("{} {}", title, description).to_lowercase();

        match self.rules.detect(&detect_text) {
            Some(rule) => {
                let mut labels = Vec::with_capacity(rule.phrases.len() + 3);
                labels.push(combined);
                labels.extend(rule.phrases.iter().cloned());
                labels.push(title.to_string());
                labels.push(description_or_title);
                labels
            }
            None => vec![combined, description_or_title, title.to_string()],
        }
    }

    /// Expand claims into candidate labels.
    ///
    /// Empty and repeated labels are skipped. When two claims emit the same
    /// label, the first claim keeps it.
    pub fn build(&self, claims: &[Claim]) -> Result<LabelSet, VerificationError> {
        let mut labels = Vec::new();
        let mut seen = HashSet::new();
        let mut label_to_claim = BTreeMap::new();

        for claim in claims {
            let claim = claim.normalized();

            for label in self.template(&claim) {
                if label.is_empty() || !seen.insert(label.clone()) {
                    continue;
                }
                label_to_claim.insert(label.clone(), claim.clone());
                labels.push(label);
            }
        }

        if labels.is_empty() {
            return Err(VerificationError::NoConditions);
        }

        tracing::debug!(
            claims = claims.len(),
            labels = labels.len(),
            "Built candidate labels"
        );

        Ok(LabelSet {
            labels,
            label_to_claim,
        })
    }
}

/// Build labels with the built-in category table.
pub fn build_labels(claims: &[Claim]) -> Result<LabelSet, VerificationError> {
    LabelBuilder::new().build(claims)
}
