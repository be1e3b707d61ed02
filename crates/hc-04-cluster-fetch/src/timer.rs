//! Deadline wrapper for blocking, cancel-aware work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use shared_types::P2pError;

/// Run a blocking callable under a deadline.
///
/// The callable runs on the blocking pool and receives a cancel flag it
/// must poll between work units. On expiry the flag is raised and
/// `Err(Timeout)` is returned promptly; the callable winds down on its own
/// once it observes the flag.
pub async fn invoke_with_timer<T, F>(callable: F, timeout: Duration) -> Result<T, P2pError>
where
    F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
    T: Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let handle = tokio::task::spawn_blocking(move || callable(flag));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(P2pError::Internal(format!("callable panicked: {e}"))),
        Err(_) => {
            debug!("timer expired, canceling callable");
            cancel.store(true, Ordering::Release);
            Err(P2pError::Timeout)
        }
    }
}
