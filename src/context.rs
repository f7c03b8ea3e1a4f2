use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::DbError;

/// Cancellation and deadline carried into every operation.
///
/// Cloning shares the underlying token, so cancelling any clone aborts every operation (and
/// every open result stream) that was started with it.
///
/// ```rust
/// use std::time::Duration;
/// use typed_dao::QueryContext;
///
/// let ctx = QueryContext::background().with_timeout(Duration::from_secs(5));
/// assert!(ctx.check().is_ok());
/// ctx.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive from an existing token, e.g. a request-scoped one owned by the caller.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    ///
    /// # Errors
    /// Returns [`DbError::Cancelled`] or [`DbError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), DbError> {
        if self.cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> DbError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.cancel.cancelled() => DbError::Cancelled,
                () = tokio::time::sleep_until(deadline) => DbError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                DbError::Cancelled
            }
        }
    }

    /// Drive `fut` unless the context fires first.
    ///
    /// # Errors
    /// Returns the error produced by `fut`, or the cancellation/deadline error.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }
}
