//! Request work that must outlive the HTTP connection.
//!
//! axum drops a handler's future when the client goes away. Once a request
//! holds the compute lock it has to finish its stages and write its logs, so
//! handlers hand that work to its own task and only await the result.

use std::future::Future;

use crate::error_handler::AppResult;

/// Runs `work` on a separate task; dropping the caller does not cancel it.
pub async fn detached<T, F>(work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::AppError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn work_finishes_after_the_caller_is_dropped() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let caller = detached(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(
            tokio::time::timeout(Duration::from_millis(5), caller)
                .await
                .is_err()
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_panicking_task_becomes_an_error() {
        let err = detached::<(), _>(async { panic!("boom") }).await.unwrap_err();
        assert!(matches!(err, AppError::Task(_)));
    }
}
