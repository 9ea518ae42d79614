//! Cancellable operation context
//!
//! Every backend call receives a [`Context`]. It carries a request id for log
//! correlation, a cancellation token and an optional deadline. The
//! coordinator races its forward steps against both, while compensations run
//! on a [`Context::detached`] copy that can no longer be cancelled.

use crate::error::{EgressIpError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Context {
    request_id: String,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            token: CancellationToken::new(),
            deadline: None,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Ties this context to an externally owned token, e.g. the shutdown
    /// token of the control loop.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Same request id, but never cancelled and without deadline.
    pub fn detached(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Drive `operation` until it completes, the context is cancelled or the
    /// deadline passes, whichever comes first.
    pub async fn run<T, F>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            tracing::debug!(request_id = %self.request_id, label, "Context cancelled before start");
            return Err(EgressIpError::Cancelled(format!(
                "{label}: context cancelled before start"
            )));
        }

        let cancelled = match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => "context cancelled",
                    _ = tokio::time::sleep_until(deadline) => "deadline exceeded",
                    result = operation => return result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => "context cancelled",
                    result = operation => return result,
                }
            }
        };

        tracing::debug!(request_id = %self.request_id, label, reason = cancelled, "Step interrupted");
        Err(EgressIpError::Cancelled(format!("{label}: {cancelled}")))
    }
}
