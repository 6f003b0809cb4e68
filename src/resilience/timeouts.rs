//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound a whole operation by a single deadline
//! - Cancel the wrapped future when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timed-out operations surface as [`DeadlineExceeded`] and return 504

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped operation did not finish in time.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation did not finish within {}ms", .0.as_millis())]
pub struct DeadlineExceeded(pub Duration);

/// Run `operation`, giving up after `deadline`.
pub async fn with_deadline<F>(deadline: Duration, operation: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_operation_completes() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_slow_operation_is_cut_off() {
        let deadline = Duration::from_millis(20);
        let result = with_deadline(deadline, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(DeadlineExceeded(deadline)));
        assert_eq!(
            DeadlineExceeded(deadline).to_string(),
            "operation did not finish within 20ms"
        );
    }
}
