//! Controller module for SyncBinding reconciliation
//!
//! This module contains the reconciliation state machine, the registry of
//! per-binding sync loops, and the loops themselves.

mod duration;
mod dynamic;
mod finalizers;
mod looper;
pub mod metrics;
pub mod property;
mod reconciler;
mod referent;
mod registry;
mod store;
#[cfg(test)]
mod test_support;

pub use duration::parse_duration;
pub use dynamic::{api_resource, KubeBindingStore, KubeResourceApi, PatchStrategy};
pub use finalizers::SYNC_LOOP_FINALIZER;
pub use looper::{sync_once, LoopFactory, Looper, LooperConfig, LooperFactory, SyncLoop, SyncOutcome};
pub use reconciler::{run_controller, ControllerState, ReconcileOutcome, Reconciler};
pub use referent::{
    coordinate_for, resolve, GroupVersion, ResolvedReferent, ResourceApi, ResourceCoordinate,
};
pub use registry::{EnsureOutcome, LoopRegistry};
pub use store::BindingStore;
