//! Token estimation for conversation values.
//!
//! Heuristic counting (chars/4 + 10% margin + per-message overhead), used by
//! token-threshold branching.

use std::sync::Arc;

use crate::message::MessageValue;

pub trait TokenCounter: Send + Sync {
    fn count_text(&self, text: &str) -> u32;

    fn count_value(&self, value: &MessageValue) -> u32;

    fn count_values(&self, values: &[MessageValue]) -> u32 {
        values
            .iter()
            .map(|v| self.count_value(v))
            .fold(0u32, |acc, x| acc.saturating_add(x))
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    chars_per_token: f64,
    safety_margin: f64,
    metadata_overhead: u32,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: f64, safety_margin: f64, metadata_overhead: u32) -> Self {
        Self {
            chars_per_token,
            safety_margin,
            metadata_overhead,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(4.0, 1.1, 10)
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let base_tokens = text.chars().count() as f64 / self.chars_per_token;
        (base_tokens * self.safety_margin).ceil() as u32
    }

    fn count_value(&self, value: &MessageValue) -> u32 {
        self.count_text(value.text())
            .saturating_add(self.metadata_overhead)
    }
}

pub type SharedTokenCounter = Arc<dyn TokenCounter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_free() {
        assert_eq!(HeuristicTokenCounter::default().count_text(""), 0);
    }

    #[test]
    fn test_heuristic_rounds_up_with_margin() {
        let counter = HeuristicTokenCounter::default();
        // 40 chars / 4 = 10, * 1.1 = 11
        assert_eq!(counter.count_text(&"x".repeat(40)), 11);
        assert_eq!(counter.count_value(&MessageValue::user("x".repeat(40))), 21);
    }

    #[test]
    fn test_pending_values_only_cost_overhead() {
        let counter = HeuristicTokenCounter::default();
        let values = vec![MessageValue::pending_assistant(), MessageValue::user("abcd")];
        assert_eq!(counter.count_values(&values), 10 + 2 + 10);
    }
}
