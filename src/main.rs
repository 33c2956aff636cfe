//! syncer-operator: keeps resource properties in sync as declared by
//! SyncBinding objects.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kube::{Client, CustomResourceExt};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kube_syncer::config::OperatorConfig;
use kube_syncer::controller::{
    self, ControllerState, KubeBindingStore, KubeResourceApi, LooperFactory, Reconciler,
};
use kube_syncer::crd::SyncBinding;
use kube_syncer::rest_api;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();
    config.validate()?;

    if config.print_crd {
        print!("{}", serde_yaml::to_string(&SyncBinding::crd())?);
        return Ok(());
    }

    init_tracing(config.log_json);
    info!(
        "Starting syncer-operator v{} (namespace: {})",
        env!("CARGO_PKG_VERSION"),
        config.namespace.as_deref().unwrap_or("<all>")
    );

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let api = Arc::new(KubeResourceApi::new(client.clone(), config.patch_strategy));
    let store = Arc::new(KubeBindingStore::new(client.clone()));
    let factory = Arc::new(LooperFactory::new(api.clone(), config.looper_config()));
    let reconciler = Reconciler::new(store, api, factory, config.request_timeout);

    let state = Arc::new(ControllerState {
        client,
        reconciler,
        namespace: config.namespace.clone(),
    });

    let server_state = Arc::clone(&state);
    let addr = config.metrics_addr;
    let server = tokio::spawn(async move {
        if let Err(e) = rest_api::run_server(server_state, addr).await {
            error!("HTTP server failed: {}", e);
        }
    });

    let result = controller::run_controller(state).await;
    server.abort();
    result.context("controller exited with an error")?;

    info!("syncer-operator stopped");
    Ok(())
}
