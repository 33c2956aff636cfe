//! kube-rs backed implementations of the resource and binding boundaries

use async_trait::async_trait;
use kube::{
    api::{Api, ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams},
    Client, ResourceExt,
};
use serde_json::Value;
use tracing::trace;

use super::referent::{ResourceApi, ResourceCoordinate};
use super::store::BindingStore;
use crate::crd::{BindingKey, SyncBinding};
use crate::error::{Error, Result};

/// How partial updates are sent to target objects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PatchStrategy {
    /// JSON merge patch; works for every resource including custom ones
    #[default]
    Merge,
    /// Strategic merge patch; built-in resource types only
    Strategic,
}

/// Describe a coordinate to kube's dynamic API
///
/// Only the plural name matters for building request paths, so it doubles
/// as the kind.
pub fn api_resource(coordinate: &ResourceCoordinate) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&coordinate.group, &coordinate.version, &coordinate.resource);
    ApiResource::from_gvk_with_plural(&gvk, &coordinate.resource)
}

/// Generic resource access through the dynamic client
#[derive(Clone)]
pub struct KubeResourceApi {
    client: Client,
    strategy: PatchStrategy,
}

impl KubeResourceApi {
    pub fn new(client: Client, strategy: PatchStrategy) -> Self {
        Self { client, strategy }
    }

    fn api(&self, coordinate: &ResourceCoordinate) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &coordinate.namespace,
            &api_resource(coordinate),
        )
    }
}

#[async_trait]
impl ResourceApi for KubeResourceApi {
    async fn get(&self, coordinate: &ResourceCoordinate, name: &str) -> Result<Option<Value>> {
        trace!("GET {} {}", coordinate, name);
        match self.api(coordinate).get_opt(name).await? {
            Some(object) => Ok(Some(serde_json::to_value(object)?)),
            None => Ok(None),
        }
    }

    async fn patch(
        &self,
        coordinate: &ResourceCoordinate,
        name: &str,
        patch: &Value,
    ) -> Result<()> {
        trace!("PATCH {} {}: {}", coordinate, name, patch);
        let api = self.api(coordinate);
        let params = PatchParams::default();
        let result = match self.strategy {
            PatchStrategy::Merge => api.patch(name, &params, &Patch::Merge(patch)).await,
            PatchStrategy::Strategic => api.patch(name, &params, &Patch::Strategic(patch)).await,
        };
        result
            .map(|_| ())
            .map_err(|e| Error::UpdateFailed(format!("patching {name} ({coordinate}): {e}")))
    }
}

/// SyncBinding access through the typed API
#[derive(Clone)]
pub struct KubeBindingStore {
    client: Client,
}

impl KubeBindingStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BindingStore for KubeBindingStore {
    async fn get(&self, key: &BindingKey) -> Result<Option<SyncBinding>> {
        let api: Api<SyncBinding> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn replace(&self, binding: &SyncBinding) -> Result<SyncBinding> {
        let key = binding.key();
        let api: Api<SyncBinding> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api
            .replace(&binding.name_any(), &PostParams::default(), binding)
            .await?)
    }
}
