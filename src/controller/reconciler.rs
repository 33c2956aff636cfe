use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{BindingKey, SyncBinding};
use crate::error::{Error, Result};

use super::finalizers::SYNC_LOOP_FINALIZER;
use super::looper::{sync_once, LoopFactory, SyncOutcome};
use super::metrics;
use super::referent::ResourceApi;
use super::registry::{EnsureOutcome, LoopRegistry};
use super::store::BindingStore;

/// What a single reconciliation did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Binding is gone; nothing to do
    Missing,
    /// A new loop was started
    LoopStarted,
    /// The existing loop was restarted with the current spec
    LoopRestarted,
    /// Binding has no interval; one pass ran inline
    SyncedOnce(SyncOutcome),
    /// Loop stopped and finalizer removed
    Finalized,
    /// Binding is being deleted and no longer carries our finalizer
    Released,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Missing => "missing",
            ReconcileOutcome::LoopStarted => "loop_started",
            ReconcileOutcome::LoopRestarted => "loop_restarted",
            ReconcileOutcome::SyncedOnce(_) => "synced_once",
            ReconcileOutcome::Finalized => "finalized",
            ReconcileOutcome::Released => "released",
        }
    }
}

/// Maps the current set of bindings onto the set of running loops
pub struct Reconciler {
    store: Arc<dyn BindingStore>,
    api: Arc<dyn ResourceApi>,
    registry: LoopRegistry,
    request_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn BindingStore>,
        api: Arc<dyn ResourceApi>,
        factory: Arc<dyn LoopFactory>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            api,
            registry: LoopRegistry::new(factory),
            request_timeout,
        }
    }

    pub fn registry(&self) -> &LoopRegistry {
        &self.registry
    }

    /// Stop all loops; called once the controller stream ends
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    /// Converge loops and finalizers for one binding
    #[instrument(skip(self, key), fields(binding = %key))]
    pub async fn reconcile(&self, key: &BindingKey) -> Result<ReconcileOutcome> {
        let result = self.converge(key).await;
        metrics::inc_reconciliation(match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        });
        result
    }

    async fn converge(&self, key: &BindingKey) -> Result<ReconcileOutcome> {
        let Some(mut binding) = self.store.get(key).await? else {
            debug!("Binding not found, ignoring since it must have been deleted");
            if self.registry.remove(key).await? {
                warn!("Stopped orphaned sync loop for {}", key);
            }
            return Ok(ReconcileOutcome::Missing);
        };

        if binding.is_being_deleted() {
            if !binding.has_finalizer(SYNC_LOOP_FINALIZER) {
                // Someone else stripped the finalizer; never leave a loop behind
                if self.registry.remove(key).await? {
                    warn!("Stopped orphaned sync loop for {}", key);
                }
                return Ok(ReconcileOutcome::Released);
            }

            // The loop must be fully stopped before the finalizer goes away
            self.registry.remove(key).await?;

            binding.remove_finalizer(SYNC_LOOP_FINALIZER);
            self.store.replace(&binding).await.map_err(|e| {
                Error::PersistenceFailed(format!("failed removing finalizer: {e}"))
            })?;
            info!("Released binding {} for deletion", key);
            return Ok(ReconcileOutcome::Finalized);
        }

        if binding.add_finalizer(SYNC_LOOP_FINALIZER) {
            binding = self.store.replace(&binding).await.map_err(|e| {
                Error::PersistenceFailed(format!("failed adding finalizer: {e}"))
            })?;
            debug!("Added finalizer to {}", key);
        }

        let interval = match binding.spec.poll_interval() {
            Ok(interval) => interval,
            Err(e) => {
                self.registry.remove(key).await?;
                return Err(e);
            }
        };
        if let Err(reason) = binding.spec.validate() {
            self.registry.remove(key).await?;
            return Err(Error::ValidationError(reason));
        }

        match interval {
            Some(_) => Ok(match self.registry.ensure(&binding).await? {
                EnsureOutcome::Started => ReconcileOutcome::LoopStarted,
                EnsureOutcome::Restarted => ReconcileOutcome::LoopRestarted,
            }),
            None => {
                // Edge-triggered binding: a loop left over from an earlier spec must go
                self.registry.remove(key).await?;
                let outcome = sync_once(self.api.as_ref(), &binding, self.request_timeout).await;
                Ok(ReconcileOutcome::SyncedOnce(outcome))
            }
        }
    }
}

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub reconciler: Reconciler,
    /// Restrict the watch to one namespace; `None` watches all
    pub namespace: Option<String>,
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let bindings: Api<SyncBinding> = match &state.namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    info!("Starting SyncBinding controller");

    // Verify CRD exists
    match bindings.list(&Default::default()).await {
        Ok(_) => info!("SyncBinding CRD is available"),
        Err(e) => {
            error!(
                "SyncBinding CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "SyncBinding CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(bindings, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::clone(&state))
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    info!("Controller stopped, stopping sync loops");
    state.reconciler.shutdown().await;
    Ok(())
}

/// The kube-runtime reconcile hook
///
/// Called whenever a SyncBinding is created, updated or marked for deletion.
/// The object is re-read by key so decisions use the freshest state.
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<SyncBinding>, ctx: Arc<ControllerState>) -> Result<Action> {
    let key = obj.key();
    let outcome = ctx.reconciler.reconcile(&key).await?;
    debug!("Reconciled SyncBinding {}: {:?}", key, outcome);
    Ok(Action::await_change())
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(binding: Arc<SyncBinding>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", binding.name_any(), error);

    // Use shorter retry for retriable errors
    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
