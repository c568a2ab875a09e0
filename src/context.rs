//! Request-scoped context for discovery and registration calls
//!
//! An [`OAuthContext`] bundles everything a single call needs from its caller
//! besides the HTTP client: the logging capability, a cancellation token and
//! an optional deadline. Nothing in it is shared between calls unless the
//! caller clones it on purpose.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::OAuthError;
use crate::logging::{Logger, DEFAULT_LOGGER};

/// Per-call logger, cancellation and deadline.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use oauth_helpers::context::OAuthContext;
/// use oauth_helpers::logging::NoopLogger;
///
/// let ctx = OAuthContext::new()
///     .with_logger(Arc::new(NoopLogger))
///     .with_timeout(Duration::from_secs(30));
///
/// assert!(ctx.deadline().is_some());
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct OAuthContext {
    logger: Option<Arc<dyn Logger>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl fmt::Debug for OAuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthContext")
            .field("has_logger", &self.logger.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl OAuthContext {
    /// Creates a context with the default logger, no deadline and a fresh
    /// cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Uses `token` as the cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the attached logger, or the built-in stderr sink.
    pub fn logger(&self) -> &dyn Logger {
        match &self.logger {
            Some(logger) => &**logger,
            None => &DEFAULT_LOGGER,
        }
    }

    /// Returns the cancellation token observed by this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the token has been cancelled or the deadline has
    /// passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drives `fut` to completion unless the context is cancelled or its
    /// deadline elapses first.
    ///
    /// `stage` names the operation in the resulting
    /// [`OAuthError::Cancelled`] message.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Cancelled`] when the token fires or the
    /// deadline passes before `fut` completes.
    pub async fn guard<F>(&self, stage: &str, fut: F) -> Result<F::Output, OAuthError>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(OAuthError::Cancelled(format!("{stage}: context cancelled")));
        }

        let raced = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    Err(OAuthError::Cancelled(format!("{stage}: context cancelled")))
                }
                out = fut => Ok(out),
            }
        };

        match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, raced).await {
                Ok(result) => result,
                Err(_) => Err(OAuthError::Cancelled(format!(
                    "{stage}: deadline exceeded"
                ))),
            },
            None => raced.await,
        }
    }
}
