//! Boundary to the store that holds SyncBinding objects

use async_trait::async_trait;

use crate::crd::{BindingKey, SyncBinding};
use crate::error::Result;

/// Fetch-by-identity and persist operations the reconciler relies on
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Current state of a binding; `Ok(None)` once it is fully deleted
    async fn get(&self, key: &BindingKey) -> Result<Option<SyncBinding>>;

    /// Write back an updated binding (metadata changes such as finalizers)
    async fn replace(&self, binding: &SyncBinding) -> Result<SyncBinding>;
}
