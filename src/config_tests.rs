// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

use crate::config::{Cli, ControllerConfig, LogFormat};
use clap::Parser;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults_are_valid() {
    let config = ControllerConfig::default();
    config.validate().unwrap();
    assert_eq!(config.finalizer_prefix, "azurecluster.infrastructure.cluster.x-k8s.io");
    assert_eq!(config.mapping_timeout(), Duration::from_secs(10));
    assert_eq!(config.requeue_error(), Duration::from_secs(30));
    assert!(!config.machine_pools_enabled);
}

#[test]
fn test_flags_are_parsed() {
    let cli = Cli::try_parse_from([
        "capz-adopt",
        "--machine-pools-enabled",
        "true",
        "--mapping-timeout-secs",
        "5",
        "--log-format",
        "json",
        "--watch-namespace",
        "capz-system",
    ])
    .unwrap();

    let config = ControllerConfig::from_cli(cli).unwrap();

    assert!(config.machine_pools_enabled);
    assert_eq!(config.mapping_timeout_secs, 5);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.watch_namespace.as_deref(), Some("capz-system"));
    assert_eq!(config.operation_timeout_secs, 30);
}

#[test]
fn test_file_fills_unset_flags() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "finalizerPrefix: example.com\nmachinePoolsEnabled: true\nrequeueErrorSecs: 5"
    )
    .unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        requeue_error_secs: Some(9),
        ..Cli::default()
    };
    let config = ControllerConfig::from_cli(cli).unwrap();

    assert_eq!(config.finalizer_prefix, "example.com");
    assert!(config.machine_pools_enabled);
    // flags win over the file
    assert_eq!(config.requeue_error_secs, 9);
    assert_eq!(config.requeue_success_secs, 300);
}

#[test]
fn test_unreadable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");

    let err = ControllerConfig::from_file(&missing).unwrap_err();

    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "mappingTimeoutSecs: [not, a, number]").unwrap();

    let err = ControllerConfig::from_file(file.path()).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_finalizer_prefix_validation() {
    let with = |prefix: String| ControllerConfig {
        finalizer_prefix: prefix,
        ..ControllerConfig::default()
    };

    assert!(with(String::new()).validate().is_err());
    assert!(with("example.com/x".to_string()).validate().is_err());
    assert!(with("a".repeat(254)).validate().is_err());
    assert!(with("a".repeat(253)).validate().is_ok());
}

#[test]
fn test_zero_timeouts_are_rejected() {
    let config = ControllerConfig {
        mapping_timeout_secs: 0,
        ..ControllerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_flags_fail_from_cli() {
    let cli = Cli {
        finalizer_prefix: Some("bad/prefix".to_string()),
        ..Cli::default()
    };
    assert!(ControllerConfig::from_cli(cli).is_err());
}
