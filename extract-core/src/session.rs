//! The model capability consumed by extraction.
//!
//! A [`ModelSession`] turns a prompt into raw text. A [`ModelBackend`] hands
//! out sessions for a model identifier; releasing a session is tied to
//! dropping it, so every exit path of an extraction releases what it acquired.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a model session or backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModelError {
    message: String,
}

impl ModelError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ModelError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ModelError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A loaded model that completes prompts.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Completes `prompt` and returns the model's raw text.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

#[async_trait]
impl<S: ModelSession + ?Sized> ModelSession for Box<S> {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
impl<S: ModelSession + ?Sized> ModelSession for Arc<S> {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
impl<S: ModelSession + ?Sized> ModelSession for &S {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }
}

/// Source of model sessions.
///
/// The session returned by [`acquire`](Self::acquire) is released when it is
/// dropped.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Session type handed out by this backend.
    type Session: ModelSession;

    /// Loads (or connects to) the model named by `model`.
    async fn acquire(&self, model: &str) -> Result<Self::Session, ModelError>;
}

/// Adapts an async closure into a [`ModelSession`].
///
/// # Examples
///
/// ```
/// use llm_extract_core::session::{FnSession, ModelSession};
///
/// # tokio_test_block(async {
/// let session = FnSession::new(|prompt: String| async move {
///     Ok::<_, String>(format!("[[echo]] {}", prompt.len()))
/// });
/// assert_eq!(session.complete("abc").await.unwrap(), "[[echo]] 3");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct FnSession<F> {
    complete: F,
}

impl<F> FnSession<F> {
    /// Wraps `complete`.
    pub const fn new(complete: F) -> Self {
        Self { complete }
    }
}

impl<F> std::fmt::Debug for FnSession<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSession").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> ModelSession for FnSession<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, String>> + Send,
{
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        (self.complete)(prompt.to_string())
            .await
            .map_err(ModelError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_session_maps_errors() {
        let session = FnSession::new(|prompt: String| async move {
            if prompt.is_empty() {
                Err("empty prompt".to_string())
            } else {
                Ok(prompt.to_uppercase())
            }
        });

        assert_eq!(session.complete("hi").await.unwrap(), "HI");
        let err = session.complete("").await.unwrap_err();
        assert_eq!(err.message(), "empty prompt");
    }

    #[tokio::test]
    async fn test_boxed_and_shared_sessions() {
        let session = FnSession::new(|_: String| async { Ok::<_, String>("ok".to_string()) });
        let shared: Arc<dyn ModelSession> = Arc::new(session);
        let boxed: Box<dyn ModelSession> = Box::new(Arc::clone(&shared));

        assert_eq!(shared.complete("x").await.unwrap(), "ok");
        assert_eq!(boxed.complete("x").await.unwrap(), "ok");
    }
}
