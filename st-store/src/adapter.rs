use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{event, Level};

/// Distinguishes a transient store error (contention the caller should
/// retry) from anything else (syntax errors, constraint violations), which
/// must fail fast instead of being retried into a misleading success.
#[derive(Debug)]
pub enum StoreErrorKind {
    Transient,
    Permanent,
}

pub trait ClassifiableError {
    fn kind(&self) -> StoreErrorKind;
}

/// 3 attempts, linear backoff `0.5s * attempt`. Mirrors the state store's
/// own busy/locked retry policy (spec §4.1/§7); unlike the remote HTTP retry
/// wrapper, this never synthesizes a response — it only ever retries or
/// propagates the original error.
pub async fn with_retry<T, E, F, Fut>(operation_name: &str, mut op: F) -> Result<T, E>
where
    E: ClassifiableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => match err.kind() {
                StoreErrorKind::Permanent => return Err(err),
                StoreErrorKind::Transient if attempt >= MAX_ATTEMPTS => {
                    event!(Level::WARN, "{operation_name} exhausted {MAX_ATTEMPTS} attempts: {err}");
                    return Err(err);
                }
                StoreErrorKind::Transient => {
                    event!(Level::WARN, "{operation_name} attempt {attempt} failed transiently: {err}, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[derive(Debug)]
pub struct FakeTransientError(pub String);

impl std::fmt::Display for FakeTransientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ClassifiableError for FakeTransientError {
    fn kind(&self) -> StoreErrorKind {
        StoreErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_up_to_the_attempt_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeTransientError> = with_retry("test-op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FakeTransientError("busy".into()))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeTransientError> = with_retry("test-op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FakeTransientError("still busy".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
