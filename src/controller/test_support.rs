//! In-memory fakes shared by the controller tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::looper::{LoopFactory, SyncLoop};
use super::referent::{ResourceApi, ResourceCoordinate};
use super::store::BindingStore;
use crate::crd::{BindingKey, Referent, SyncBinding, SyncBindingSpec};
use crate::error::{Error, Result};

/// Build a binding mirroring `primary` status replicas into `secondary` spec replicas
pub fn binding(namespace: &str, name: &str, interval: Option<&str>) -> SyncBinding {
    let referent = |name: &str, property: &str| Referent {
        api_version: "apps/v1".to_string(),
        kind: "deployments".to_string(),
        namespace: None,
        name: name.to_string(),
        resource: None,
        property: property.to_string(),
    };
    let mut binding = SyncBinding::new(
        name,
        SyncBindingSpec {
            source: referent("primary", "/status/replicas"),
            target: referent("secondary", "/spec/replicas"),
            interval: interval.map(String::from),
        },
    );
    binding.metadata.namespace = Some(namespace.to_string());
    binding
}

/// RFC 7386 merge of `patch` into `target`
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

type ObjectKey = (String, String, String);

/// Resource API over a map of (resource, namespace, name) -> object
#[derive(Default)]
pub struct FakeResourceApi {
    objects: Mutex<HashMap<ObjectKey, Value>>,
    patches: Mutex<Vec<(ResourceCoordinate, String, Value)>>,
    pub gets: AtomicUsize,
    pub hang_gets: AtomicBool,
    pub fail_patches: AtomicBool,
}

impl FakeResourceApi {
    pub fn insert(&self, resource: &str, namespace: &str, name: &str, object: Value) {
        self.objects.lock().unwrap().insert(
            (resource.to_string(), namespace.to_string(), name.to_string()),
            object,
        );
    }

    pub fn object(&self, resource: &str, namespace: &str, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&(resource.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn patches(&self) -> Vec<(ResourceCoordinate, String, Value)> {
        self.patches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceApi for FakeResourceApi {
    async fn get(&self, coordinate: &ResourceCoordinate, name: &str) -> Result<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.hang_gets.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.object(&coordinate.resource, &coordinate.namespace, name))
    }

    async fn patch(
        &self,
        coordinate: &ResourceCoordinate,
        name: &str,
        patch: &Value,
    ) -> Result<()> {
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(Error::UpdateFailed("admission webhook denied".to_string()));
        }
        self.patches
            .lock()
            .unwrap()
            .push((coordinate.clone(), name.to_string(), patch.clone()));
        let mut objects = self.objects.lock().unwrap();
        let key = (
            coordinate.resource.clone(),
            coordinate.namespace.clone(),
            name.to_string(),
        );
        match objects.get_mut(&key) {
            Some(object) => {
                merge(object, patch);
                Ok(())
            }
            None => Err(Error::UpdateFailed(format!("{name} not found"))),
        }
    }
}

/// Shared, ordered log of lifecycle calls
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Binding store backed by a map, recording persist calls into an `EventLog`
pub struct FakeBindingStore {
    bindings: Mutex<HashMap<BindingKey, SyncBinding>>,
    log: EventLog,
    pub fail_replace: AtomicBool,
}

impl FakeBindingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
            log,
            fail_replace: AtomicBool::new(false),
        }
    }

    pub fn put(&self, binding: SyncBinding) {
        self.bindings.lock().unwrap().insert(binding.key(), binding);
    }

    pub fn take(&self, key: &BindingKey) -> Option<SyncBinding> {
        self.bindings.lock().unwrap().remove(key)
    }

    pub fn stored(&self, key: &BindingKey) -> Option<SyncBinding> {
        self.bindings.lock().unwrap().get(key).cloned()
    }

    /// Mark a binding as deleted, the way the API server does when finalizers are pending
    pub fn mark_deleted(&self, key: &BindingKey) {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

        if let Some(binding) = self.bindings.lock().unwrap().get_mut(key) {
            binding.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
    }
}

#[async_trait]
impl BindingStore for FakeBindingStore {
    async fn get(&self, key: &BindingKey) -> Result<Option<SyncBinding>> {
        Ok(self.stored(key))
    }

    async fn replace(&self, binding: &SyncBinding) -> Result<SyncBinding> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(Error::PersistenceFailed("conflict".to_string()));
        }
        let key = binding.key();
        let finalizers = binding.metadata.finalizers.clone().unwrap_or_default();
        self.log
            .push(format!("persist:{key}:finalizers={}", finalizers.join(",")));
        self.put(binding.clone());
        Ok(binding.clone())
    }
}

/// Loop double that records lifecycle calls instead of spawning tasks
pub struct RecordingLoop {
    binding: SyncBinding,
    log: EventLog,
    running: Option<Duration>,
    stop_times_out: Arc<AtomicBool>,
}

#[async_trait]
impl SyncLoop for RecordingLoop {
    async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        let interval = self.binding.spec.poll_interval()?.ok_or_else(|| {
            Error::InvalidInterval {
                interval: String::new(),
                reason: "missing".to_string(),
            }
        })?;
        self.log
            .push(format!("start:{}:{:?}", self.binding.key(), interval));
        self.running = Some(interval);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.running.is_none() {
            return Ok(());
        }
        if self.stop_times_out.load(Ordering::SeqCst) {
            return Err(Error::StopTimeout {
                binding: self.binding.key().to_string(),
                timeout: Duration::from_secs(30),
            });
        }
        self.log.push(format!("stop:{}", self.binding.key()));
        self.running = None;
        Ok(())
    }

    fn rebind(&mut self, binding: SyncBinding) {
        self.binding = binding;
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn interval(&self) -> Option<Duration> {
        self.running
    }
}

/// Factory for `RecordingLoop`s sharing one log
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub log: EventLog,
    pub created: Arc<AtomicUsize>,
    pub stop_times_out: Arc<AtomicBool>,
}

impl LoopFactory for RecordingFactory {
    fn create(&self, binding: SyncBinding) -> Box<dyn SyncLoop> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingLoop {
            binding,
            log: self.log.clone(),
            running: None,
            stop_times_out: Arc::clone(&self.stop_times_out),
        })
    }
}
