//! Custom Resource Definitions for the syncer operator
//!
//! This module defines the Kubernetes CRD that declares property bindings.

mod sync_binding;
mod types;


pub use sync_binding::{SyncBinding, SyncBindingSpec, SyncBindingStatus};
pub use types::*;
