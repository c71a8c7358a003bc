//! Configuration for extraction retry behavior.

/// Configuration for extraction retry behavior.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Maximum number of attempts before giving up (default: 3). Must be at least 1.
    pub max_attempts: usize,
    /// Whether repair notes quote the start of the previous response (default: true).
    pub echo_previous_response: bool,
    /// Characters of the previous response quoted in a repair note (default: 500).
    pub echo_limit: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            echo_previous_response: true,
            echo_limit: 500,
        }
    }
}

impl ExtractionConfig {
    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set whether repair notes quote the previous response.
    #[must_use]
    pub const fn with_echo_previous_response(mut self, echo: bool) -> Self {
        self.echo_previous_response = echo;
        self
    }

    /// Set how many characters of the previous response are quoted.
    #[must_use]
    pub const fn with_echo_limit(mut self, limit: usize) -> Self {
        self.echo_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = ExtractionConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.echo_previous_response);
        assert_eq!(config.echo_limit, 500);

        let config = config
            .with_max_attempts(1)
            .with_echo_previous_response(false)
            .with_echo_limit(80);
        assert_eq!(config.max_attempts, 1);
        assert!(!config.echo_previous_response);
        assert_eq!(config.echo_limit, 80);
    }
}
