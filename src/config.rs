// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Values come from command-line flags, each of which can also be set through
//! an environment variable. An optional YAML file supplies defaults for any
//! flag left unset. Feature gates are plain fields of [`ControllerConfig`]
//! and are passed explicitly to the code that needs them.
//!
//! # Example
//!
//! ```yaml
//! finalizerPrefix: azurecluster.infrastructure.cluster.x-k8s.io
//! machinePoolsEnabled: true
//! mappingTimeoutSecs: 10
//! watchNamespace: capz-system
//! ```

use crate::constants::{
    DEFAULT_FINALIZER_PREFIX, DEFAULT_MAPPING_TIMEOUT_SECS, DEFAULT_METRICS_BIND_ADDRESS,
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_REQUEUE_ERROR_SECS, DEFAULT_REQUEUE_SUCCESS_SECS,
    MAX_FINALIZER_PREFIX_LEN,
};
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Command-line flags. Every field is optional so that a config file can fill gaps.
#[derive(Debug, Default, Parser)]
#[command(name = "capz-adopt", version, about = "Adopts ASO-managed AKS resources into Cluster API")]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, env = "CAPZ_ADOPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Prefix of cluster identity finalizers
    #[arg(long, env = "CAPZ_ADOPT_FINALIZER_PREFIX")]
    pub finalizer_prefix: Option<String>,

    /// Whether the Cluster API `MachinePool` feature gate is enabled
    #[arg(long, env = "CAPZ_ADOPT_MACHINE_POOLS_ENABLED")]
    pub machine_pools_enabled: Option<bool>,

    /// Timeout for a single watch-mapping fan-out, in seconds
    #[arg(long, env = "CAPZ_ADOPT_MAPPING_TIMEOUT_SECS")]
    pub mapping_timeout_secs: Option<u64>,

    /// Timeout for the store calls of one reconcile, in seconds
    #[arg(long, env = "CAPZ_ADOPT_OPERATION_TIMEOUT_SECS")]
    pub operation_timeout_secs: Option<u64>,

    /// Requeue interval after a successful reconcile, in seconds
    #[arg(long, env = "CAPZ_ADOPT_REQUEUE_SUCCESS_SECS")]
    pub requeue_success_secs: Option<u64>,

    /// Requeue interval after a failed reconcile, in seconds
    #[arg(long, env = "CAPZ_ADOPT_REQUEUE_ERROR_SECS")]
    pub requeue_error_secs: Option<u64>,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "CAPZ_ADOPT_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Address the metrics endpoint listens on
    #[arg(long, env = "CAPZ_ADOPT_METRICS_BIND_ADDRESS")]
    pub metrics_bind_address: Option<String>,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Fully resolved controller configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Prefix of cluster identity finalizers
    pub finalizer_prefix: String,

    /// Whether the Cluster API `MachinePool` feature gate is enabled.
    ///
    /// Enables VMSS Flex nodes in generated cloud provider configs.
    pub machine_pools_enabled: bool,

    /// Timeout for a single watch-mapping fan-out, in seconds
    pub mapping_timeout_secs: u64,

    /// Timeout for the store calls of one reconcile, in seconds
    pub operation_timeout_secs: u64,

    /// Requeue interval after a successful reconcile, in seconds
    pub requeue_success_secs: u64,

    /// Requeue interval after a failed reconcile, in seconds
    pub requeue_error_secs: u64,

    /// Only watch this namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,

    /// Address the metrics endpoint listens on
    pub metrics_bind_address: String,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            finalizer_prefix: DEFAULT_FINALIZER_PREFIX.to_string(),
            machine_pools_enabled: false,
            mapping_timeout_secs: DEFAULT_MAPPING_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            requeue_success_secs: DEFAULT_REQUEUE_SUCCESS_SECS,
            requeue_error_secs: DEFAULT_REQUEUE_ERROR_SECS,
            watch_namespace: None,
            metrics_bind_address: DEFAULT_METRICS_BIND_ADDRESS.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Resolve the configuration from parsed flags, reading the config file they name.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let base = match cli.config.as_deref() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = Self {
            finalizer_prefix: cli.finalizer_prefix.unwrap_or(base.finalizer_prefix),
            machine_pools_enabled: cli
                .machine_pools_enabled
                .unwrap_or(base.machine_pools_enabled),
            mapping_timeout_secs: cli
                .mapping_timeout_secs
                .unwrap_or(base.mapping_timeout_secs),
            operation_timeout_secs: cli
                .operation_timeout_secs
                .unwrap_or(base.operation_timeout_secs),
            requeue_success_secs: cli
                .requeue_success_secs
                .unwrap_or(base.requeue_success_secs),
            requeue_error_secs: cli.requeue_error_secs.unwrap_or(base.requeue_error_secs),
            watch_namespace: cli.watch_namespace.or(base.watch_namespace),
            metrics_bind_address: cli
                .metrics_bind_address
                .unwrap_or(base.metrics_bind_address),
            log_format: cli.log_format.unwrap_or(base.log_format),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Check invariants that would otherwise surface as API server rejections.
    ///
    /// # Errors
    ///
    /// Returns an error if the finalizer prefix is empty, contains `/`, or is
    /// longer than a DNS subdomain, or if a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.finalizer_prefix.is_empty() {
            bail!("finalizer prefix must not be empty");
        }
        if self.finalizer_prefix.contains('/') {
            bail!(
                "finalizer prefix {:?} must not contain '/'",
                self.finalizer_prefix
            );
        }
        if self.finalizer_prefix.len() > MAX_FINALIZER_PREFIX_LEN {
            bail!(
                "finalizer prefix {:?} is {} characters; at most {} are allowed",
                self.finalizer_prefix,
                self.finalizer_prefix.len(),
                MAX_FINALIZER_PREFIX_LEN
            );
        }
        if self.mapping_timeout_secs == 0 || self.operation_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    /// Mapping fan-out timeout.
    #[must_use]
    pub fn mapping_timeout(&self) -> Duration {
        Duration::from_secs(self.mapping_timeout_secs)
    }

    /// Per-reconcile store timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Requeue interval after success.
    #[must_use]
    pub fn requeue_success(&self) -> Duration {
        Duration::from_secs(self.requeue_success_secs)
    }

    /// Requeue interval after failure.
    #[must_use]
    pub fn requeue_error(&self) -> Duration {
        Duration::from_secs(self.requeue_error_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
