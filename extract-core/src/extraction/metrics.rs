//! Metrics tracking and token estimation for extraction operations.

use std::time::Duration;

/// Metrics collected during an extraction operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMetrics {
    /// Total number of model calls made.
    pub total_attempts: usize,
    /// Wall-clock time elapsed during extraction.
    pub wall_time: Duration,
    /// Estimated input tokens across every prompt sent.
    pub estimated_input_tokens: usize,
    /// Estimated output tokens across every response received.
    pub estimated_output_tokens: usize,
}

impl ExtractionMetrics {
    pub(crate) fn record_exchange(&mut self, prompt: &str, response: &str) {
        self.total_attempts += 1;
        self.estimated_input_tokens += estimate_tokens(prompt);
        self.estimated_output_tokens += estimate_tokens(response);
    }
}

/// Estimate token count from text using the standard 4-chars-per-token heuristic.
///
/// Uses `chars().count()` to handle UTF-8 correctly (not `len()` which counts bytes).
/// Returns ceiling division to avoid underestimation.
///
/// # Examples
///
/// ```
/// use llm_extract_core::extraction::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);  // 5 chars / 4 = 1.25 -> 2
/// assert_eq!(estimate_tokens("hello world"), 3);  // 11 chars / 4 = 2.75 -> 3
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
