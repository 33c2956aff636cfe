//! SyncBinding Custom Resource Definition
//!
//! A SyncBinding copies one property of a source resource into one property
//! of a target resource. With an `interval` the operator polls on that period;
//! without one it only syncs when the binding itself is reconciled.

use std::time::Duration;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{BindingKey, Referent};
use crate::controller::parse_duration;

/// The SyncBinding CRD binds a target property to a source property.
///
/// # Example
///
/// ```yaml
/// apiVersion: syncer.k8s.kfirs.com/v1
/// kind: SyncBinding
/// metadata:
///   name: replicas-mirror
///   namespace: apps
/// spec:
///   interval: "30s"
///   source:
///     apiVersion: apps/v1
///     kind: deployments
///     name: primary
///     property: /status/replicas
///   target:
///     apiVersion: apps/v1
///     kind: deployments
///     name: secondary
///     property: /spec/replicas
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "syncer.k8s.kfirs.com",
    version = "v1",
    kind = "SyncBinding",
    namespaced,
    status = "SyncBindingStatus",
    shortname = "sb",
    printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.source.name"}"#,
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.target.name"}"#,
    printcolumn = r#"{"name":"Interval","type":"string","jsonPath":".spec.interval"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SyncBindingSpec {
    /// Where the value is read from
    pub source: Referent,

    /// Where the value is written to; the only property this operator mutates
    pub target: Referent,

    /// Poll period as a duration literal (e.g. "30s", "1m30s")
    /// When omitted the binding is synced on reconciliation only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl SyncBindingSpec {
    /// Validate the spec before any loop is created for it
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate("source")?;
        self.target.validate("target")?;
        if self.target.property.is_empty() {
            return Err("target.property must address a field, not the whole object".to_string());
        }
        if let Some(interval) = &self.interval {
            parse_duration(interval).map_err(|e| format!("interval: {e}"))?;
        }
        Ok(())
    }

    /// Parsed poll interval; `None` means edge-triggered only
    pub fn poll_interval(&self) -> crate::error::Result<Option<Duration>> {
        self.interval.as_deref().map(parse_duration).transpose()
    }
}

/// Status subresource for SyncBinding
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncBindingStatus {
    /// Observed generation for status sync detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl SyncBinding {
    /// Registry identity of this binding
    pub fn key(&self) -> BindingKey {
        BindingKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Whether the object carries a deletion timestamp
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Add `finalizer` if missing; returns whether anything changed
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers_mut().push(finalizer.to_string());
        true
    }

    /// Remove every occurrence of `finalizer`; returns whether anything changed
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers().len();
        self.finalizers_mut().retain(|f| f != finalizer);
        before != self.finalizers().len()
    }
}
