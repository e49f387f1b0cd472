//! Bounded retry with jittered backoff for transient store errors.

use crate::error::StoreError;
use rand::Rng;
use std::time::Duration;
use vigil_core::RetryConfig;

/// Run `op` until it succeeds, fails hard, or exhausts the configured
/// attempts.
///
/// `NotFound` is surfaced verbatim on the first occurrence; there is no point
/// retrying or logging the absence of a row. Transient errors sleep
/// `base_delay * U(0.5, 1.5)` between attempts. Runs on the blocking pool, so
/// the sleep is a thread sleep.
pub(crate) fn run<T, F>(cfg: &RetryConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let attempts = cfg.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(StoreError::NotFound) => return Err(StoreError::NotFound),
            Err(err) if err.is_transient() => {
                if attempt >= attempts {
                    tracing::warn!(attempts, error = %err, "store retries exhausted");
                    return Err(StoreError::ExhaustedRetries {
                        attempts,
                        source: Box::new(err),
                    });
                }
                let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
                std::thread::sleep(Duration::from_secs_f64(
                    cfg.base_delay().as_secs_f64() * jitter,
                ));
            }
            Err(err) => return Err(err),
        }
    }
}
