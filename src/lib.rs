//! Kubernetes operator that keeps a property of a target resource in sync
//! with a property of a source resource, as declared by SyncBinding objects.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod rest_api;
