use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Initial settle delay before the first attempt — several AWS control
/// planes need a moment before a just-created object is usable at all.
const SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Delay between retry attempts after the settle delay.
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Bounded attempt count — exhaustion surfaces `ProvisioningTimeout` rather
/// than retrying forever.
const MAX_ATTEMPTS: u32 = 100;

/// Bounded poll-until-success: sleep the settle delay, then retry `f` up to
/// `MAX_ATTEMPTS` times, a second apart, treating any `Err` as retryable.
///
/// Used for operations against AWS's eventually-consistent control plane —
/// a freshly created role is not immediately assumable, and a freshly
/// created topic cannot immediately accept an attribute referencing a
/// just-created role. Grounded on the 10-attempt/2s-backoff credential
/// validation loop in the teacher's account-bootstrap flow, generalized
/// into a reusable primitive with a longer budget for slower-converging
/// operations (function creation can take tens of seconds).
pub async fn poll_until_success<T, E, F, Fut>(context: &str, mut f: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    tokio::time::sleep(SETTLE_DELAY).await;

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(RETRY_DELAY).await;
        }

        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                tracing::debug!(context, attempt, error = %e, "retrying");
            }
            Err(e) => {
                tracing::warn!(context, error = %e, "poll exhausted");
            }
        }
    }

    Err(ProviderError::ProvisioningTimeout {
        attempts: MAX_ATTEMPTS,
        context: context.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_immediately_once_f_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = poll_until_success("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = poll_until_success("test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err("not ready yet".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_provisioning_timeout() {
        let result = poll_until_success("always-fails", || async { Err::<i32, _>("nope") }).await;
        assert!(matches!(
            result,
            Err(ProviderError::ProvisioningTimeout { attempts, .. }) if attempts == 100
        ));
    }
}
