//! Cancellation and deadline handling for a migration run

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, MigrationError, MigrationResult};

/// Races store calls against the caller's token and the run deadline
#[derive(Debug, Clone)]
pub struct RunGuard {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunGuard {
    /// The deadline starts counting now
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    /// Fail fast if the run has already been interrupted
    pub fn check(&self, name: Option<&str>) -> MigrationResult<()> {
        if self.token.is_cancelled() {
            return Err(cancelled(name, CancelReason::Requested));
        }
        if self.deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            return Err(cancelled(name, CancelReason::DeadlineExceeded));
        }
        Ok(())
    }

    /// Drive `fut` unless cancellation or the deadline comes first, in which
    /// case `fut` is dropped without being polled further.
    pub async fn run<F>(&self, name: Option<&str>, fut: F) -> MigrationResult<F::Output>
    where
        F: Future,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled(name, CancelReason::Requested)),
            _ = deadline => Err(cancelled(name, CancelReason::DeadlineExceeded)),
            output = fut => Ok(output),
        }
    }
}

fn cancelled(name: Option<&str>, reason: CancelReason) -> MigrationError {
    MigrationError::Cancelled {
        name: name.map(str::to_string),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_without_interruption() {
        let guard = RunGuard::new(CancellationToken::new(), None);
        let value = guard.run(None, async { 42 }).await.unwrap();
        assert_eq!(value, 42);
        assert!(guard.check(None).is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = RunGuard::new(token, None);

        let result = guard.run(Some("0001_a.sql"), async { 42 }).await;
        match result {
            Err(MigrationError::Cancelled { name, reason }) => {
                assert_eq!(name.as_deref(), Some("0001_a.sql"));
                assert_eq!(reason, CancelReason::Requested);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert!(guard.check(None).is_err());
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_future() {
        let guard = RunGuard::new(CancellationToken::new(), Some(Duration::from_millis(20)));

        let result = guard.run(None, std::future::pending::<()>()).await;
        assert!(matches!(
            result,
            Err(MigrationError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            })
        ));
        assert!(guard.check(None).is_err());
    }
}
