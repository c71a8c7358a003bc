//! Bounded render, complete, parse loop with corrective re-prompting.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use super::config::ExtractionConfig;
use super::error::{AttemptOutcome, AttemptRecord, ExtractionError, ParseError};
use super::feedback::{build_repair_note, truncate_chars};
use super::metrics::ExtractionMetrics;
use crate::cancel::CancellationToken;
use crate::parser;
use crate::prompt::{self, Arguments, PromptTemplate};
use crate::record::ExtractedRecord;
use crate::schema::SchemaDescriptor;
use crate::session::{ModelBackend, ModelSession};

/// Orchestrator for running bounded retry loops with parse feedback.
///
/// Each attempt renders the template with the schema's formatting block,
/// asks the session for a completion and parses it. A parse failure is fed
/// back to the model as a corrective note in a freshly rendered prompt until
/// the attempt bound is reached. Template errors and model failures are never
/// retried.
///
/// The orchestrator holds no mutable state, so one instance can serve any
/// number of concurrent extractions.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOrchestrator {
    config: ExtractionConfig,
    cancel: Option<CancellationToken>,
}

impl ExtractionOrchestrator {
    /// Creates an orchestrator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an orchestrator with the given configuration.
    #[must_use]
    pub const fn with_config(config: ExtractionConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Sets the maximum number of attempts (fluent builder pattern).
    #[must_use]
    pub const fn max_attempts(mut self, max: usize) -> Self {
        self.config.max_attempts = max;
        self
    }

    /// Checks `token` before every model call.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Runs the extraction loop against `session`.
    ///
    /// Returns the parsed record and the metrics of the whole call.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `max_attempts` is zero (no model call is made).
    /// - `Template` if the template references a missing argument (no model call).
    /// - `ModelUnavailable` as soon as the session fails.
    /// - `Cancelled` if the cancellation token is set before a model call.
    /// - `Exhausted` once every attempt has failed to parse.
    pub async fn extract<S>(
        &self,
        session: &S,
        schema: &SchemaDescriptor,
        template: &PromptTemplate,
        arguments: &Arguments,
    ) -> Result<(ExtractedRecord, ExtractionMetrics), ExtractionError>
    where
        S: ModelSession + ?Sized,
    {
        let max_attempts = self.config.max_attempts;
        if max_attempts == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let mut metrics = ExtractionMetrics::default();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut current = prompt::render(template, arguments, schema)?;
        let mut attempt = 1;

        loop {
            if self.is_cancelled() {
                tracing::warn!(
                    event = "extraction_cancelled",
                    completed_attempts = attempt - 1,
                    "extraction_cancelled"
                );
                return Err(ExtractionError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            tracing::debug!(
                event = "attempt_started",
                attempt,
                max_attempts,
                prompt_chars = current.as_str().chars().count(),
                "attempt_started"
            );

            let raw = session.complete(current.as_str()).await.map_err(|e| {
                tracing::warn!(event = "model_unavailable", attempt, error = %e, "model_unavailable");
                ExtractionError::ModelUnavailable(e)
            })?;
            metrics.record_exchange(current.as_str(), &raw);

            let error = match parser::parse(&raw, schema) {
                Ok(record) => {
                    metrics.wall_time = start.elapsed();
                    tracing::info!(
                        event = "extraction_succeeded",
                        attempts = attempt,
                        fields = record.len(),
                        elapsed_ms = metrics.wall_time.as_millis(),
                        "extraction_succeeded"
                    );
                    return Ok((record, metrics));
                }
                Err(error) => error,
            };

            tracing::warn!(
                event = "parse_failed",
                attempt,
                max_attempts,
                kind = %error.kind,
                field = %error.field,
                "parse_failed: {error}"
            );

            let rendered = current;
            if attempt == max_attempts {
                history.push(failed_attempt(attempt, rendered, raw, error.clone(), start));
                metrics.wall_time = start.elapsed();
                return Err(ExtractionError::Exhausted {
                    attempts: attempt,
                    max_attempts,
                    last_error: error,
                    history,
                    metrics,
                });
            }

            let note = self.repair_note(&error, attempt, &raw);
            current = prompt::render_attempt(template, arguments, schema, attempt + 1, Some(&note))?;
            history.push(failed_attempt(attempt, rendered, raw, error, start));
            attempt += 1;
        }
    }

    /// Extracts a `T`, deriving the schema from its [`JsonSchema`] implementation.
    ///
    /// # Errors
    ///
    /// Everything [`extract`](Self::extract) returns, plus `Schema` when the
    /// derived JSON Schema cannot be expressed as fields and `Deserialize`
    /// when the parsed record does not fit `T`.
    pub async fn extract_typed<T, S>(
        &self,
        session: &S,
        template: &PromptTemplate,
        arguments: &Arguments,
    ) -> Result<(T, ExtractionMetrics), ExtractionError>
    where
        T: JsonSchema + DeserializeOwned,
        S: ModelSession + ?Sized,
    {
        let schema = SchemaDescriptor::for_type::<T>()?;
        let (record, metrics) = self.extract(session, &schema, template, arguments).await?;

        let typed = record
            .deserialize()
            .map_err(|e| ExtractionError::Deserialize {
                message: e.to_string(),
                record: record.to_json(),
            })?;

        Ok((typed, metrics))
    }

    /// Acquires a session for `model` from `backend`, extracts, and releases
    /// the session on every exit path.
    ///
    /// The template is checked before the model is acquired.
    ///
    /// # Errors
    ///
    /// `ModelUnavailable` if the session cannot be acquired, otherwise
    /// everything [`extract`](Self::extract) returns.
    pub async fn extract_scoped<B>(
        &self,
        backend: &B,
        model: &str,
        schema: &SchemaDescriptor,
        template: &PromptTemplate,
        arguments: &Arguments,
    ) -> Result<(ExtractedRecord, ExtractionMetrics), ExtractionError>
    where
        B: ModelBackend + ?Sized,
    {
        prompt::render(template, arguments, schema)?;

        let session = backend
            .acquire(model)
            .await
            .map_err(ExtractionError::ModelUnavailable)?;
        tracing::debug!(event = "session_acquired", model, "session_acquired");

        let result = self.extract(&session, schema, template, arguments).await;

        drop(session);
        tracing::debug!(event = "session_released", model, "session_released");
        result
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn repair_note(&self, error: &ParseError, attempt: usize, raw: &str) -> String {
        let echo = (self.config.echo_previous_response && self.config.echo_limit > 0)
            .then(|| truncate_chars(raw.trim(), self.config.echo_limit))
            .filter(|echo| !echo.is_empty());
        build_repair_note(error, attempt, self.config.max_attempts, echo.as_deref())
    }
}

fn failed_attempt(
    attempt: usize,
    rendered_prompt: prompt::RenderedPrompt,
    raw_response: String,
    error: ParseError,
    start: Instant,
) -> AttemptRecord {
    AttemptRecord {
        attempt_number: attempt,
        rendered_prompt,
        raw_response,
        outcome: AttemptOutcome::Failed(error),
        elapsed: start.elapsed(),
    }
}
