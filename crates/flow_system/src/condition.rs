//! Text conditions for branching steps

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionType {
    /// Substring test
    #[default]
    Contains,
    /// Exact equality
    Matches,
    Regex,
}

/// A condition evaluated against message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionType,
    pub pattern: String,
}

impl Condition {
    pub fn new(kind: ConditionType, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    /// Evaluates the condition. Only a malformed regex is an error.
    pub fn evaluate(&self, text: &str) -> Result<bool> {
        match self.kind {
            ConditionType::Contains => Ok(text.contains(&self.pattern)),
            ConditionType::Matches => Ok(text == self.pattern),
            ConditionType::Regex => {
                let re = Regex::new(&self.pattern).map_err(|e| {
                    FlowError::InvalidCondition(format!("{}: {}", self.pattern, e))
                })?;
                Ok(re.is_match(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_condition() {
        let cond = Condition::new(ConditionType::Contains, "OK");
        assert!(cond.evaluate("Status: OK").unwrap());
        assert!(!cond.evaluate("Status: FAIL").unwrap());
    }

    #[test]
    fn test_matches_is_exact() {
        let cond = Condition::new(ConditionType::Matches, "yes");
        assert!(cond.evaluate("yes").unwrap());
        assert!(!cond.evaluate("yes!").unwrap());
    }

    #[test]
    fn test_regex_condition() {
        let cond = Condition::new(ConditionType::Regex, r"^\d{3}-\d{4}$");
        assert!(cond.evaluate("555-1234").unwrap());
        assert!(!cond.evaluate("call 555-1234").unwrap());

        let bad = Condition::new(ConditionType::Regex, "(unclosed");
        assert!(matches!(bad.evaluate("x"), Err(FlowError::InvalidCondition(_))));
    }

    #[test]
    fn test_condition_type_wire_names() {
        let kind: ConditionType = serde_json::from_str("\"regex\"").unwrap();
        assert_eq!(kind, ConditionType::Regex);
        assert_eq!(serde_json::to_string(&ConditionType::Contains).unwrap(), "\"contains\"");
    }
}
