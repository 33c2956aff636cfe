//! Finalizer tokens owned by the syncer operator

/// Recorded on every SyncBinding so its loop is stopped before deletion completes
pub const SYNC_LOOP_FINALIZER: &str = "looper.finalizers.syncer.k8s.kfirs.com";
