//! Per-call deadline and cancellation.

use super::{StoreError, StoreResult, TxHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag; clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline, cancellation signal and owning unit threaded to every store call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
    transaction: Option<TxHandle>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keeps the earlier of the current and the new deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Same signals, bound to `handle`.
    pub fn for_transaction(&self, handle: TxHandle) -> Self {
        Self {
            transaction: Some(handle),
            ..self.clone()
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn transaction(&self) -> Option<TxHandle> {
        self.transaction
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Whether an in-flight statement needs an interrupt hook at all.
    pub(crate) fn is_bounded(&self) -> bool {
        self.deadline.is_some() || self.cancel.is_some()
    }

    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.is_expired() {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Error for a statement the engine interrupted on behalf of this context.
    pub(crate) fn interruption(&self) -> StoreError {
        if self.is_cancelled() {
            StoreError::Cancelled
        } else {
            StoreError::DeadlineExceeded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallContext, CancelToken};
    use crate::store::StoreError;
    use std::time::{Duration, Instant};

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let ctx = CallContext::new().with_cancel(token.clone());
        assert!(ctx.check().is_ok());
        token.cancel();
        assert!(matches!(ctx.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn expired_deadline_fails_check() {
        let ctx = CallContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(ctx.check(), Err(StoreError::DeadlineExceeded)));
        assert!(matches!(ctx.interruption(), StoreError::DeadlineExceeded));
    }

    #[test]
    fn earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_secs(1);
        let ctx = CallContext::new()
            .with_deadline(soon)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(soon));
    }
}
