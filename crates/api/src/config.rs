use std::time::Duration;

use leaderboard::WorkerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub redis_url: String,
    /// Comma-separated cluster node URLs. Selects the cluster store when set.
    #[serde(default)]
    pub redis_cluster_nodes: Option<String>,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Upper bound for `pageSize` and top-percentage results.
    #[serde(default = "default_max_returned_members")]
    pub max_returned_members: i64,
    #[serde(default = "default_expiration_check_interval_secs")]
    pub expiration_check_interval_secs: u64,
    #[serde(default = "default_expiration_limit_per_run")]
    pub expiration_limit_per_run: i64,
}

fn default_max_returned_members() -> i64 {
    2000
}

fn default_expiration_check_interval_secs() -> u64 {
    60
}

fn default_expiration_limit_per_run() -> i64 {
    1000
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn cluster_nodes(&self) -> Vec<String> {
        self.redis_cluster_nodes
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            interval: Duration::from_secs(self.expiration_check_interval_secs),
            limit_per_run: self.expiration_limit_per_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::prefixed("LEADERBOARD_").from_iter(
            vars.iter()
                .map(|(key, value)| (format!("LEADERBOARD_{key}"), value.to_string())),
        )
    }

    #[test]
    fn applies_defaults() {
        let config = from_vars(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("REDIS_URL", "redis://localhost:6379"),
        ])
        .unwrap();

        assert_eq!(config.max_returned_members, 2000);
        assert_eq!(config.worker_config().interval, Duration::from_secs(60));
        assert_eq!(config.worker_config().limit_per_run, 1000);
        assert!(config.cluster_nodes().is_empty());
        assert!(!config.is_production());
    }

    #[test]
    fn splits_cluster_nodes() {
        let config = from_vars(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("REDIS_CLUSTER_NODES", "redis://a:7000, redis://b:7001,"),
        ])
        .unwrap();

        assert_eq!(
            config.cluster_nodes(),
            vec!["redis://a:7000".to_string(), "redis://b:7001".to_string()]
        );
    }

    #[test]
    fn requires_redis_url() {
        let result = from_vars(&[("HOST", "0.0.0.0"), ("PORT", "8080")]);

        assert!(result.is_err());
    }
}
