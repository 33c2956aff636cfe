//! Request handlers for the operator's HTTP endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::controller::ControllerState;

/// Readiness payload
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub active_loops: usize,
}

/// Liveness probe
pub async fn health() -> &'static str {
    "OK"
}

/// Readiness probe reporting how many sync loops are running
///
/// Reads the published count so it never waits behind a stopping loop.
pub async fn ready(State(state): State<Arc<ControllerState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
        active_loops: state.reconciler.registry().active_loops(),
    })
}

/// Prometheus text exposition of the global registry
pub async fn metrics() -> Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_ok() {
        assert_eq!(health().await, "OK");
    }

    #[tokio::test]
    async fn test_metrics_exposes_operator_families() {
        crate::controller::metrics::inc_sync_pass("updated");
        crate::controller::metrics::set_active_loops(2);

        let body = metrics().await.unwrap();
        assert!(body.contains("syncer_active_loops"));
        assert!(body.contains("syncer_sync_passes_total{outcome=\"updated\"}"));
    }
}
