//! Operator configuration from command line flags and environment

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::controller::{parse_duration, LooperConfig, PatchStrategy};
use crate::error::{Error, Result};

fn duration_arg(value: &str) -> std::result::Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

#[derive(Parser, Debug, Clone)]
#[command(name = "syncer-operator")]
#[command(about = "Keeps resource properties in sync as declared by SyncBinding objects", long_about = None)]
#[command(version)]
pub struct OperatorConfig {
    /// Address of the health and metrics HTTP server
    #[arg(long, env = "SYNCER_METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,

    /// Only watch SyncBindings in this namespace (defaults to all namespaces)
    #[arg(short, long, env = "SYNCER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Upper bound for each resource API call made by a sync pass
    #[arg(long, env = "SYNCER_REQUEST_TIMEOUT", default_value = "10s", value_parser = duration_arg)]
    pub request_timeout: Duration,

    /// Upper bound for a sync loop to stop before reconciliation fails
    #[arg(long, env = "SYNCER_STOP_TIMEOUT", default_value = "30s", value_parser = duration_arg)]
    pub stop_timeout: Duration,

    /// Patch flavor used to update target properties
    #[arg(long, env = "SYNCER_PATCH_STRATEGY", value_enum, default_value_t = PatchStrategy::Merge)]
    pub patch_strategy: PatchStrategy,

    /// Emit logs as JSON lines
    #[arg(long, env = "SYNCER_LOG_JSON")]
    pub log_json: bool,

    /// Print the SyncBinding CRD as YAML and exit
    #[arg(long)]
    pub print_crd: bool,
}

impl OperatorConfig {
    /// Reject combinations clap cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(namespace) = &self.namespace {
            if namespace.trim().is_empty() {
                return Err(Error::ConfigError(
                    "namespace must not be empty when given".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn looper_config(&self) -> LooperConfig {
        LooperConfig {
            request_timeout: self.request_timeout,
            stop_timeout: self.stop_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::try_parse_from(["syncer-operator"]).unwrap();
        assert_eq!(config.metrics_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.namespace, None);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.patch_strategy, PatchStrategy::Merge);
        assert!(!config.print_crd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::try_parse_from([
            "syncer-operator",
            "--namespace",
            "apps",
            "--request-timeout",
            "2s",
            "--stop-timeout",
            "1m",
            "--patch-strategy",
            "strategic",
        ])
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("apps"));
        let looper = config.looper_config();
        assert_eq!(looper.request_timeout, Duration::from_secs(2));
        assert_eq!(looper.stop_timeout, Duration::from_secs(60));
        assert_eq!(config.patch_strategy, PatchStrategy::Strategic);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(
            OperatorConfig::try_parse_from(["syncer-operator", "--stop-timeout", "soon"]).is_err()
        );
        let config =
            OperatorConfig::try_parse_from(["syncer-operator", "--namespace", " "]).unwrap();
        assert!(config.validate().is_err());
    }
}
