//! Registry of running sync loops, keyed by binding identity
//!
//! All mutations go through one async mutex, so concurrent reconciliations
//! of different bindings never race on the map. At most one loop exists per
//! binding at any time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::looper::{LoopFactory, SyncLoop};
use super::metrics;
use crate::crd::{BindingKey, SyncBinding};
use crate::error::Result;

/// What `LoopRegistry::ensure` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    Started,
    Restarted,
}

pub struct LoopRegistry {
    factory: Arc<dyn LoopFactory>,
    loops: Mutex<HashMap<BindingKey, Box<dyn SyncLoop>>>,
    /// Mirrors `loops.len()`; readable while a stop holds the lock
    active: AtomicUsize,
}

impl LoopRegistry {
    pub fn new(factory: Arc<dyn LoopFactory>) -> Self {
        Self {
            factory,
            loops: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
        }
    }

    fn publish(&self, count: usize) {
        self.active.store(count, Ordering::SeqCst);
        metrics::set_active_loops(count);
    }

    /// Make sure a loop runs against the given binding snapshot
    ///
    /// An existing loop is stopped, rebound and started again so spec changes
    /// always take effect. A loop that fails to (re)start is dropped.
    pub async fn ensure(&self, binding: &SyncBinding) -> Result<EnsureOutcome> {
        let key = binding.key();
        let mut loops = self.loops.lock().await;

        let outcome = if let Some(existing) = loops.get_mut(&key) {
            existing.stop().await?;
            existing.rebind(binding.clone());
            if let Err(e) = existing.start().await {
                loops.remove(&key);
                self.publish(loops.len());
                return Err(e);
            }
            debug!("Restarted sync loop for {}", key);
            EnsureOutcome::Restarted
        } else {
            let mut created = self.factory.create(binding.clone());
            created.start().await?;
            loops.insert(key.clone(), created);
            info!("Started sync loop for {}", key);
            EnsureOutcome::Started
        };

        self.publish(loops.len());
        Ok(outcome)
    }

    /// Stop and unregister the loop for `key`; returns whether one existed
    ///
    /// When stopping fails the loop stays registered so a later call can retry.
    pub async fn remove(&self, key: &BindingKey) -> Result<bool> {
        let mut loops = self.loops.lock().await;
        let Some(existing) = loops.get_mut(key) else {
            return Ok(false);
        };
        existing.stop().await?;
        loops.remove(key);
        self.publish(loops.len());
        info!("Stopped sync loop for {}", key);
        Ok(true)
    }

    pub async fn contains(&self, key: &BindingKey) -> bool {
        self.loops.lock().await.contains_key(key)
    }

    /// Last published loop count, without waiting on the registry lock
    pub fn active_loops(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.loops.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.loops.lock().await.is_empty()
    }

    /// Ticker period of the loop registered for `key`
    pub async fn interval(&self, key: &BindingKey) -> Option<Duration> {
        self.loops
            .lock()
            .await
            .get(key)
            .and_then(|looper| looper.interval())
    }

    /// Stop every loop; used when the controller shuts down
    pub async fn shutdown(&self) {
        let mut loops = self.loops.lock().await;
        for (key, mut looper) in loops.drain() {
            if let Err(e) = looper.stop().await {
                warn!("Failed to stop sync loop for {}: {}", key, e);
            }
        }
        self.publish(0);
    }
}
