//! Referent resolution
//!
//! Turns a `Referent` into concrete resource coordinates and fetches the
//! live object through a `ResourceApi`.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::crd::Referent;
use crate::error::{Error, Result};

/// API group and version parsed from an `apiVersion` string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    /// Parse `v1` (core group) or `group/version`
    pub fn parse(api_version: &str) -> Result<Self> {
        let invalid = || {
            Error::InvalidReference(format!("failed to parse API version '{api_version}'"))
        };
        let mut parts = api_version.split('/');
        let (group, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), None, None) => ("", version),
            (Some(group), Some(version), None) if !group.is_empty() => (group, version),
            _ => return Err(invalid()),
        };
        if version.is_empty() || api_version.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self {
            group: group.to_string(),
            version: version.to_string(),
        })
    }
}

/// Concrete coordinates of a namespaced resource collection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceCoordinate {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
}

impl ResourceCoordinate {
    /// Same collection, different namespace
    pub fn in_namespace(&self, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ResourceCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{} in {}", self.version, self.resource, self.namespace)
        } else {
            write!(
                f,
                "{}/{}/{} in {}",
                self.group, self.version, self.resource, self.namespace
            )
        }
    }
}

/// Boundary to the cluster's generic resource API
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, coordinate: &ResourceCoordinate, name: &str) -> Result<Option<Value>>;

    /// Apply a partial update document to an object
    async fn patch(&self, coordinate: &ResourceCoordinate, name: &str, patch: &Value)
        -> Result<()>;
}

/// A referent that resolved to a live object
#[derive(Clone, Debug)]
pub struct ResolvedReferent {
    pub coordinate: ResourceCoordinate,
    pub object: Value,
}

impl ResolvedReferent {
    /// Namespace recorded on the fetched object, falling back to the lookup namespace
    pub fn namespace(&self) -> &str {
        self.object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(self.coordinate.namespace.as_str())
    }

    /// Name recorded on the fetched object, falling back to `fallback`
    pub fn name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(fallback)
    }
}

/// Compute the coordinates a referent points at
pub fn coordinate_for(default_namespace: &str, referent: &Referent) -> Result<ResourceCoordinate> {
    let gv = GroupVersion::parse(&referent.api_version)?;
    Ok(ResourceCoordinate {
        group: gv.group,
        version: gv.version,
        resource: referent.resource_name().to_string(),
        namespace: referent.namespace_or(default_namespace).to_string(),
    })
}

/// Resolve a referent and fetch its object; `Ok(None)` when the object is absent
pub async fn resolve(
    api: &dyn ResourceApi,
    default_namespace: &str,
    referent: &Referent,
) -> Result<Option<ResolvedReferent>> {
    let coordinate = coordinate_for(default_namespace, referent)?;
    trace!("Resolving {} as {}", referent, coordinate);
    Ok(api
        .get(&coordinate, &referent.name)
        .await?
        .map(|object| ResolvedReferent { coordinate, object }))
}
