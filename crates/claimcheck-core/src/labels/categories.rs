//! Claim category rule tables.
//!
//! A category pairs detection keywords with the synonym phrases a zero-shot
//! classifier tends to score well. Rules are data: the built-in table below
//! can be extended from YAML without touching the label builder or the
//! adjudicator.
//!
//! Detection runs over the lower-cased title and description, and the first
//! rule with a matching keyword wins.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading category rules.
#[derive(Error, Debug)]
pub enum CategoryError {
    #[error("Failed to read category file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid category '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// One detection rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRule {
    /// Category name (e.g., "feeding")
    pub name: String,

    /// Lower-case substrings that select this category
    pub keywords: Vec<String>,

    /// Synonym phrases emitted as extra candidate labels, in order
    pub phrases: Vec<String>,
}

impl CategoryRule {
    fn new(name: &str, keywords: &[&str], phrases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Whether any keyword occurs in the (already lower-cased) text.
    pub fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|kw| text_lower.contains(kw.as_str()))
    }

    fn validate(&self) -> Result<(), CategoryError> {
        let invalid = |reason: &str| CategoryError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(invalid("at least one keyword is required"));
        }
        if self.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid("at least one phrase is required"));
        }
        Ok(())
    }
}

lazy_static! {
    static ref BUILTIN_RULES: Vec<CategoryRule> = vec![
        CategoryRule::new(
            "feeding",
            &["feed", "food", "meal", "hunger"],
            &[
                "people eating food and meals",
                "food distribution and feeding people",
                "cooking and preparing meals for people",
                "serving food to people",
            ],
        ),
        CategoryRule::new(
            "travel",
            &["travel", "transport", "expense", "vehicle", "stuck", "flood"],
            &[
                "vehicles and transportation for people",
                "people traveling in vehicles",
                "evacuation and transport of people",
                "travel arrangements and transportation",
            ],
        ),
        CategoryRule::new(
            "medical",
            &["medical", "health", "treatment"],
            &[
                "medical care and treatment",
                "healthcare services",
                "medical professionals treating people",
            ],
        ),
        CategoryRule::new(
            "education",
            &["education", "school", "learning"],
            &[
                "educational activities and learning",
                "students in classroom or school",
                "teaching and education services",
            ],
        ),
    ];
}

/// YAML shape for user-supplied categories.
#[derive(Debug, Deserialize)]
struct CategoryFile {
    /// Consult custom rules before the built-in ones
    #[serde(default)]
    prepend: bool,

    categories: Vec<CategoryRule>,
}

/// Ordered category rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryRules {
    /// The built-in feeding/travel/medical/education table.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    /// An empty table: every claim falls into the generic template.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// First rule matching the lower-cased text.
    pub fn detect(&self, text_lower: &str) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.matches(text_lower))
    }

    /// Append (or prepend) rules after validating them.
    pub fn extend(&mut self, rules: Vec<CategoryRule>, prepend: bool) -> Result<(), CategoryError> {
        let mut rules = rules
            .into_iter()
            .map(normalize_rule)
            .collect::<Vec<_>>();

        for rule in &rules {
            rule.validate()?;
        }

        if prepend {
            rules.append(&mut self.rules);
            self.rules = rules;
        } else {
            self.rules.append(&mut rules);
        }
        Ok(())
    }

    /// Extend the table from a YAML document.
    ///
    /// ```yaml
    /// prepend: false
    /// categories:
    ///   - name: shelter
    ///     keywords: [shelter, tent, housing]
    ///     phrases: ["tents and temporary shelters for families"]
    /// ```
    pub fn extend_from_yaml(&mut self, yaml: &str) -> Result<(), CategoryError> {
        let file: CategoryFile = serde_yaml::from_str(yaml)?;
        self.extend(file.categories, file.prepend)
    }

    /// Built-in table extended from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CategoryError> {
        let contents = fs::read_to_string(path)?;
        let mut rules = Self::builtin();
        rules.extend_from_yaml(&contents)?;
        Ok(rules)
    }
}

/// Keywords are matched against lower-cased text, so store them lower-cased.
fn normalize_rule(mut rule: CategoryRule) -> CategoryRule {
    rule.name = rule.name.trim().to_string();
    rule.keywords = rule
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    rule.phrases = rule
        .phrases
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    rule
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_detection() {
        let rules = CategoryRules::builtin();
        assert_eq!(rules.detect("feeding people").unwrap().name, "feeding");
        assert_eq!(rules.detect("flood relief").unwrap().name, "travel");
        assert_eq!(rules.detect("health camp").unwrap().name, "medical");
        assert_eq!(rules.detect("school supplies").unwrap().name, "education");
        assert!(rules.detect("tree planting").is_none());
    }

    #[test]
    fn test_builtin_order_decides_overlap() {
        // "food" (feeding) and "transport" (travel) both present
        let rules = CategoryRules::builtin();
        assert_eq!(rules.detect("food transport").unwrap().name, "feeding");
    }

    #[test]
    fn test_phrase_counts() {
        for rule in CategoryRules::builtin().rules() {
            assert!((3..=7).contains(&rule.phrases.len()), "{}", rule.name);
        }
    }

    #[test]
    fn test_extend_from_yaml_appends() {
        let mut rules = CategoryRules::builtin();
        rules
            .extend_from_yaml(
                r#"
categories:
  - name: shelter
    keywords: [Shelter, tent]
    phrases: ["tents and temporary shelters for families"]
"#,
            )
            .unwrap();

        assert_eq!(rules.rules().len(), 5);
        assert_eq!(rules.detect("emergency shelter").unwrap().name, "shelter");
        // Built-in rules still take precedence
        assert_eq!(rules.detect("food in tents").unwrap().name, "feeding");
    }

    #[test]
    fn test_extend_from_yaml_prepend() {
        let mut rules = CategoryRules::builtin();
        rules
            .extend_from_yaml(
                r#"
prepend: true
categories:
  - name: shelter
    keywords: [tent]
    phrases: ["families sleeping in tents"]
"#,
            )
            .unwrap();

        assert_eq!(rules.rules()[0].name, "shelter");
        assert_eq!(rules.detect("food in tents").unwrap().name, "shelter");
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut rules = CategoryRules::builtin();
        let result = rules.extend_from_yaml(
            r#"
categories:
  - name: empty
    keywords: []
    phrases: ["something"]
"#,
        );

        assert!(matches!(result, Err(CategoryError::Invalid { .. })));
        assert_eq!(rules.rules().len(), 4);
    }
}
