use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("`{operation}` exceeded its {}ms deadline", .after.as_millis())]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run one adapter call under `deadline`. An elapsed call is dropped, never retried.
pub(crate) async fn with_deadline<F, T, E>(
    deadline: Duration,
    operation: &'static str,
    call: F,
) -> Result<Result<T, E>, DeadlineExceeded>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| DeadlineExceeded {
            operation,
            after: deadline,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_report_the_operation() {
        let outcome = with_deadline(Duration::from_millis(50), "cache.get", async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, std::io::Error>(())
        })
        .await;

        let err = outcome.expect_err("call should time out");
        assert_eq!(err.operation, "cache.get");
        assert_eq!(err.to_string(), "`cache.get` exceeded its 50ms deadline");
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let outcome = with_deadline(Duration::from_secs(1), "store.get_count", async {
            Ok::<_, std::io::Error>(7)
        })
        .await;
        assert_eq!(outcome.expect("no timeout").expect("no error"), 7);
    }
}
