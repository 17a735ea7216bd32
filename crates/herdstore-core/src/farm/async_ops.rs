//! Async wrappers for blocking farm operations.
//!
//! Save and load move whole objects through the slice store and block for
//! the worker pool to drain, so they must not run on the async executor.
//! These wrappers run them on Tokio's blocking thread pool.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::farm::Farm;

/// Asynchronously saves a snapshot tagged `tag`.
///
/// # Errors
///
/// Returns an error if the save fails or the blocking task panics.
pub async fn save_snapshot_async(farm: Arc<Farm>, tag: String) -> Result<u32> {
    tokio::task::spawn_blocking(move || farm.save_snapshot(&tag))
        .await
        .map_err(|e| Error::Internal(format!("task join error: {e}")))?
}

/// Asynchronously loads the snapshot resolved by `(idx, tag)`.
///
/// # Errors
///
/// Returns an error if the load fails or the blocking task panics.
pub async fn load_snapshot_async(farm: Arc<Farm>, idx: u32, tag: String) -> Result<()> {
    tokio::task::spawn_blocking(move || farm.load_snapshot(idx, &tag))
        .await
        .map_err(|e| Error::Internal(format!("task join error: {e}")))?
}

/// Asynchronously checks whether `(idx, tag)` resolves to a snapshot.
///
/// # Errors
///
/// Returns an error if the blocking task panics.
pub async fn contain_snapshot_async(farm: Arc<Farm>, idx: u32, tag: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || farm.contain_snapshot(idx, &tag))
        .await
        .map_err(|e| Error::Internal(format!("task join error: {e}")))
}
