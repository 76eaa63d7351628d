//! HTTP handlers, one module per resource.
//!
//! Handlers validate presence of required strings, hand the typed draft to the
//! store on the blocking pool, and shape the JSON reply. Enum fields are
//! validated by serde during extraction.

pub mod ai;
pub mod archive;
pub mod emotion;
pub mod focus;
pub mod ingest;
pub mod loops;
pub mod mode;
pub mod predict;
pub mod threads;

use std::sync::Arc;

use mindstate_core::{StateResult, StateStore};

use crate::error::ApiError;

/// Run a store call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(store: &Arc<StateStore>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&StateStore) -> StateResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
}

/// Trimmed value of a required string field; blank is a 400.
pub(crate) fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("'{}' is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trimmed optional string; blank collapses to `None`.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
