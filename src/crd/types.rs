//! Shared types for binding specifications
//!
//! These types are used across the CRD definitions and controller logic.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reference to a single property inside another resource.
///
/// `property` is a JSON pointer into the referenced object
/// (e.g. `/status/replicas`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Referent {
    /// API group and version of the referenced resource (e.g. "apps/v1" or "v1")
    pub api_version: String,

    /// Kind of the referenced resource
    /// Used verbatim as the resource name unless `resource` is set
    pub kind: String,

    /// Namespace of the referenced resource
    /// Defaults to the namespace of the binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the referenced resource
    pub name: String,

    /// Plural resource name (e.g. "deployments")
    /// Overrides `kind` when building the API path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// JSON pointer to the property inside the referenced resource
    pub property: String,
}

impl Referent {
    /// Namespace to look the referent up in; empty values fall back to `default`
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => default,
        }
    }

    /// Resource name used in the API path
    pub fn resource_name(&self) -> &str {
        match self.resource.as_deref() {
            Some(resource) if !resource.is_empty() => resource,
            _ => &self.kind,
        }
    }

    /// Validate the static shape of the reference
    pub fn validate(&self, field: &str) -> Result<(), String> {
        if self.api_version.trim().is_empty() {
            return Err(format!("{field}.apiVersion must not be empty"));
        }
        if self.kind.trim().is_empty() {
            return Err(format!("{field}.kind must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(format!("{field}.name must not be empty"));
        }
        if !self.property.is_empty() && !self.property.starts_with('/') {
            return Err(format!(
                "{field}.property must be empty or start with '/', got '{}'",
                self.property
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Referent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ", self.api_version, self.resource_name())?;
        if let Some(ns) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            write!(f, "{ns}/")?;
        }
        write!(f, "{}#{}", self.name, self.property)
    }
}

/// Identity of a binding: namespace plus name
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BindingKey {
    pub namespace: String,
    pub name: String,
}

impl BindingKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
