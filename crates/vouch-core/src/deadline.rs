//! Cancellation helpers.
//!
//! Every provider call is a future; dropping it cancels the call. This module
//! adds the timeout half: a deadline that elapses becomes `OPERATION_CANCELLED`.

use std::future::Future;
use std::time::Duration;

use crate::errors::code::OPERATION_CANCELLED;
use crate::errors::{ComponentType, Result};

/// Run `operation`, failing with `OPERATION_CANCELLED` if it outlives `limit`.
pub async fn with_deadline<T, F>(limit: Duration, component: ComponentType, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(elapsed) => Err(OPERATION_CANCELLED
            .with_detail(format!("{} call exceeded {:?}", component, limit))
            .with_error(elapsed)
            .with_component_type(component)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::code::CONFIG_INVALID;

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let value = with_deadline(Duration::from_secs(1), ComponentType::Cache, async {
            Ok::<_, crate::errors::Error>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);

        let err = with_deadline(Duration::from_secs(1), ComponentType::Cache, async {
            Err::<(), _>(CONFIG_INVALID.error())
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), CONFIG_INVALID);
    }

    #[tokio::test]
    async fn test_slow_operation_is_cancelled() {
        let err = with_deadline(
            Duration::from_millis(20),
            ComponentType::ReferrerStore,
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, crate::errors::Error>(())
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), OPERATION_CANCELLED);
        assert_eq!(err.component_type(), Some(ComponentType::ReferrerStore));
    }
}
