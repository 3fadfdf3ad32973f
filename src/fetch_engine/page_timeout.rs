//! Timeout utilities for page operations
//!
//! Provides async timeout wrappers to prevent indefinite hangs during
//! page navigation, loading, and other browser operations.

use std::future::Future;
use std::time::Duration;

use super::fetch_types::FetchError;

/// Wrap an async page operation with an explicit timeout.
///
/// Elapsing the timeout is reported as [`FetchError::NetworkTimeout`] so the
/// retry policy treats it like any other slow navigation.
///
/// # Arguments
/// * `operation` - The async Future to execute with a timeout
/// * `timeout` - Ceiling for the operation
/// * `operation_name` - Human-readable name for error messages
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::NetworkTimeout(format!(
            "{operation_name} timeout after {timeout:?}"
        ))),
    }
}
