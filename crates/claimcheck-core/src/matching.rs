//! Shared claim-title matching.
//!
//! Both adjudication paths have to map free-form model output (a classifier
//! label, a `matchedCondition` string, a raw response) back onto the claim
//! titles of the request. The comparison rules live here so the two paths
//! cannot drift apart:
//!
//! - comparisons are case-insensitive and ignore surrounding whitespace
//! - an exact match always wins over a substring match
//! - substring matches go either direction ("Feeding" ~ "Feeding People")
//! - an empty candidate never matches anything

use crate::types::Claim;

/// Normalize a title for comparison.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Whether two titles refer to the same claim: exact or either-direction
/// substring, case-insensitive.
pub fn titles_overlap(a: &str, b: &str) -> bool {
    let a = normalize_title(a);
    let b = normalize_title(b);

    if a.is_empty() || b.is_empty() {
        return false;
    }

    a == b || a.contains(&b) || b.contains(&a)
}

/// The part of a label before its first colon, trimmed.
///
/// Labels built as `"title: description"` carry their claim title here.
/// Labels without a colon are returned whole.
pub fn label_title_prefix(label: &str) -> &str {
    label.split(':').next().unwrap_or(label).trim()
}

/// Resolve a candidate string to the title of one of `claims`.
///
/// Exact (case-insensitive) matches are preferred; otherwise the first claim,
/// in input order, whose title overlaps the candidate wins. The returned
/// title is the claim's own, never the candidate.
pub fn find_claim_title<'a>(candidate: &str, claims: &'a [Claim]) -> Option<&'a str> {
    let wanted = normalize_title(candidate);
    if wanted.is_empty() {
        return None;
    }

    claims
        .iter()
        .find(|c| normalize_title(&c.title) == wanted)
        .or_else(|| claims.iter().find(|c| titles_overlap(&c.title, candidate)))
        .map(|c| c.title.as_str())
}

/// Whether `title` is exactly one of the claim titles.
pub fn is_claim_title(title: &str, claims: &[Claim]) -> bool {
    claims.iter().any(|c| c.title == title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Vec<Claim> {
        vec![
            Claim::described("Feeding People", "food distribution"),
            Claim::titled("Travel Expense"),
        ]
    }

    #[test]
    fn test_titles_overlap() {
        assert!(titles_overlap("Feeding", "feeding people"));
        assert!(titles_overlap("  TRAVEL EXPENSE ", "travel expense"));
        assert!(!titles_overlap("Medical", "Travel Expense"));
        assert!(!titles_overlap("", "Travel Expense"));
    }

    #[test]
    fn test_label_title_prefix() {
        assert_eq!(label_title_prefix("Feeding People: food distribution"), "Feeding People");
        assert_eq!(label_title_prefix("serving food to people"), "serving food to people");
        assert_eq!(label_title_prefix(": orphan"), "");
    }

    #[test]
    fn test_find_claim_title_prefers_exact() {
        let claims = vec![Claim::titled("Feeding People"), Claim::titled("Feeding")];
        assert_eq!(find_claim_title("feeding", &claims), Some("Feeding"));
    }

    #[test]
    fn test_find_claim_title_substring() {
        let claims = claims();
        assert_eq!(find_claim_title("feeding", &claims), Some("Feeding People"));
        assert_eq!(
            find_claim_title("Travel Expense for flood victims", &claims),
            Some("Travel Expense")
        );
        assert_eq!(find_claim_title("Education", &claims), None);
        assert_eq!(find_claim_title("   ", &claims), None);
    }

    #[test]
    fn test_is_claim_title_is_exact() {
        let claims = claims();
        assert!(is_claim_title("Travel Expense", &claims));
        assert!(!is_claim_title("travel expense", &claims));
    }
}
