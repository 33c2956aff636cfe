//! Per-binding sync loops
//!
//! A loop owns one binding snapshot and, on every tick, copies the source
//! property into the target property when the two differ. Passes are
//! stateless: nothing is cached between ticks, so out-of-band changes on
//! either side are always re-observed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use super::metrics;
use super::property;
use super::referent::{resolve, ResourceApi};
use crate::crd::{Referent, SyncBinding};
use crate::error::{Error, Result};

/// Result of one synchronization pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Target was patched with the source value
    Updated,
    /// Values already matched; nothing written
    InSync,
    /// Source object does not exist
    SourceMissing,
    /// Target object does not exist
    TargetMissing,
    /// Pass aborted on an error
    Failed(String),
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Updated => "updated",
            SyncOutcome::InSync => "in_sync",
            SyncOutcome::SourceMissing => "source_missing",
            SyncOutcome::TargetMissing => "target_missing",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

/// Timeouts governing loop behavior
#[derive(Clone, Copy, Debug)]
pub struct LooperConfig {
    /// Upper bound for each call to the resource API
    pub request_timeout: Duration,
    /// Upper bound for a loop to wind down after cancellation
    pub stop_timeout: Duration,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(30),
        }
    }
}

static NULL: Value = Value::Null;

async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            timeout,
        })?
}

fn abort(message: &str, referent: &Referent, err: Error) -> SyncOutcome {
    if err.is_configuration_error() || matches!(err, Error::UpdateFailed(_)) {
        warn!(referent = %referent, "{}: {}", message, err);
    } else {
        debug!(referent = %referent, "{}: {}", message, err);
    }
    SyncOutcome::Failed(err.to_string())
}

/// Run one synchronization pass for `binding`
///
/// Never fails: every problem is logged and reported through the outcome,
/// and the next pass starts over from scratch.
pub async fn sync_once(
    api: &dyn ResourceApi,
    binding: &SyncBinding,
    request_timeout: Duration,
) -> SyncOutcome {
    let outcome = run_pass(api, binding, request_timeout).await;
    metrics::inc_sync_pass(outcome.as_str());
    outcome
}

async fn run_pass(
    api: &dyn ResourceApi,
    binding: &SyncBinding,
    request_timeout: Duration,
) -> SyncOutcome {
    let namespace = binding.namespace().unwrap_or_default();
    let spec = &binding.spec;

    let source = match bounded(
        request_timeout,
        "source lookup",
        resolve(api, &namespace, &spec.source),
    )
    .await
    {
        Ok(Some(source)) => source,
        Ok(None) => {
            debug!(source = %spec.source, "Source referent not found");
            return SyncOutcome::SourceMissing;
        }
        Err(e) => return abort("Failed looking up source referent", &spec.source, e),
    };
    let source_value: Value = match property::get(&source.object, &spec.source.property) {
        Ok(value) => value.clone(),
        Err(e) => return abort("Failed accessing source property", &spec.source, e),
    };

    let target = match bounded(
        request_timeout,
        "target lookup",
        resolve(api, &namespace, &spec.target),
    )
    .await
    {
        Ok(Some(target)) => target,
        Ok(None) => {
            debug!(target = %spec.target, "Target referent not found");
            return SyncOutcome::TargetMissing;
        }
        Err(e) => return abort("Failed looking up target referent", &spec.target, e),
    };
    if let Err(e) = property::ensure_mergeable(&target.object, &spec.target.property) {
        return abort("Failed accessing target property", &spec.target, e);
    }
    let target_value = match property::get(&target.object, &spec.target.property) {
        Ok(value) => value,
        // a null written through a merge patch deletes the field, so absent counts as null
        Err(_)
            if source_value.is_null()
                && property::leaf_is_absent(&target.object, &spec.target.property) =>
        {
            &NULL
        }
        Err(e) => return abort("Failed accessing target property", &spec.target, e),
    };

    if property::values_equal(&source_value, target_value) {
        trace!(target = %spec.target, "Target referent is synced");
        return SyncOutcome::InSync;
    }

    let patch = match property::build_patch(&spec.target.property, source_value.clone()) {
        Ok(patch) => patch,
        Err(e) => return abort("Failed creating target patch", &spec.target, e),
    };

    let coordinate = target.coordinate.in_namespace(target.namespace());
    let name = target.name(&spec.target.name);
    if let Err(e) = bounded(
        request_timeout,
        "target update",
        api.patch(&coordinate, name, &patch),
    )
    .await
    {
        let e = if matches!(e, Error::UpdateFailed(_)) {
            e
        } else {
            Error::UpdateFailed(e.to_string())
        };
        return abort("Failed updating target", &spec.target, e);
    }

    info!(
        source = %spec.source,
        target = %spec.target,
        data = %source_value,
        "Updated target"
    );
    SyncOutcome::Updated
}

/// Lifecycle of a background sync loop
#[async_trait]
pub trait SyncLoop: Send + Sync {
    /// Begin ticking; a no-op when already running
    async fn start(&mut self) -> Result<()>;

    /// Cancel and wait for the background task to exit; a no-op when not running
    async fn stop(&mut self) -> Result<()>;

    /// Replace the binding snapshot; takes effect on the next `start`
    fn rebind(&mut self, binding: SyncBinding);

    fn is_running(&self) -> bool;

    /// Period of the currently running ticker
    fn interval(&self) -> Option<Duration>;
}

/// Creates loops for newly observed bindings
pub trait LoopFactory: Send + Sync {
    fn create(&self, binding: SyncBinding) -> Box<dyn SyncLoop>;
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
    interval: Duration,
}

/// Tokio-backed sync loop for one binding
pub struct Looper {
    binding: Arc<SyncBinding>,
    api: Arc<dyn ResourceApi>,
    config: LooperConfig,
    running: Option<RunningLoop>,
}

impl Looper {
    pub fn new(binding: SyncBinding, api: Arc<dyn ResourceApi>, config: LooperConfig) -> Self {
        Self {
            binding: Arc::new(binding),
            api,
            config,
            running: None,
        }
    }
}

async fn run_loop(
    api: Arc<dyn ResourceApi>,
    binding: Arc<SyncBinding>,
    interval: Duration,
    request_timeout: Duration,
    token: CancellationToken,
) {
    debug!("Starting sync loop every {:?}", interval);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Abandoning in-flight sync pass");
                break;
            }
            _ = sync_once(api.as_ref(), &binding, request_timeout) => {}
        }
    }

    debug!("Stopping sync loop");
}

#[async_trait]
impl SyncLoop for Looper {
    async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let key = self.binding.key();
        let interval = self
            .binding
            .spec
            .poll_interval()?
            .ok_or_else(|| Error::InvalidInterval {
                interval: String::new(),
                reason: format!("binding {key} has no interval to poll on"),
            })?;

        let token = CancellationToken::new();
        let handle = tokio::spawn(
            run_loop(
                Arc::clone(&self.api),
                Arc::clone(&self.binding),
                interval,
                self.config.request_timeout,
                token.clone(),
            )
            .instrument(info_span!("sync_loop", binding = %key)),
        );

        self.running = Some(RunningLoop {
            token,
            handle,
            interval,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        running.token.cancel();

        match tokio::time::timeout(self.config.stop_timeout, &mut running.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Sync loop for {} ended abnormally: {}", self.binding.key(), e);
                Ok(())
            }
            Err(_) => {
                let err = Error::StopTimeout {
                    binding: self.binding.key().to_string(),
                    timeout: self.config.stop_timeout,
                };
                self.running = Some(running);
                Err(err)
            }
        }
    }

    fn rebind(&mut self, binding: SyncBinding) {
        self.binding = Arc::new(binding);
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|running| running.interval)
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.token.cancel();
        }
    }
}

/// Builds `Looper`s that share one resource API client
pub struct LooperFactory {
    api: Arc<dyn ResourceApi>,
    config: LooperConfig,
}

impl LooperFactory {
    pub fn new(api: Arc<dyn ResourceApi>, config: LooperConfig) -> Self {
        Self { api, config }
    }
}

impl LoopFactory for LooperFactory {
    fn create(&self, binding: SyncBinding) -> Box<dyn SyncLoop> {
        Box::new(Looper::new(binding, Arc::clone(&self.api), self.config))
    }
}
