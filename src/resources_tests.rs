// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

use crate::context::OpContext;
use crate::crd::{Cluster, ClusterSpec};
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use crate::resources::{create_or_get, from_dynamic, nested, nested_bool, nested_str, new_object, to_dynamic};
use crate::store::{MemoryStore, ObjectStore};
use serde_json::json;

#[test]
fn test_new_object_scopes_namespace_by_kind() {
    let secret = new_object(&ResourceKind::secret(), "ns1", "s", json!({}));
    assert_eq!(secret.metadata.namespace.as_deref(), Some("ns1"));

    let namespace = new_object(&ResourceKind::namespace(), "ns1", "ns1", json!({}));
    assert_eq!(namespace.metadata.namespace, None);
}

#[test]
fn test_typed_round_trip() {
    let mut cluster = Cluster::new(
        "c1",
        ClusterSpec {
            paused: Some(true),
            ..ClusterSpec::default()
        },
    );
    cluster.metadata.namespace = Some("ns1".to_string());

    let dynamic = to_dynamic(&cluster).unwrap();
    assert_eq!(dynamic.types.as_ref().unwrap().kind, "Cluster");
    assert_eq!(nested_bool(&dynamic, &["spec", "paused"]), Some(true));

    let back: Cluster = from_dynamic(&dynamic).unwrap();
    assert_eq!(back.spec, cluster.spec);
    assert_eq!(back.metadata.namespace.as_deref(), Some("ns1"));
}

#[test]
fn test_from_dynamic_rejects_mismatched_payload() {
    let obj = new_object(
        &ResourceKind::cluster(),
        "ns1",
        "c1",
        json!({ "spec": { "paused": "yes" } }),
    );
    let result: Result<Cluster, StoreError> = from_dynamic(&obj);
    assert!(matches!(result, Err(StoreError::Serialization(_))));
}

#[test]
fn test_nested_accessors() {
    let obj = new_object(
        &ResourceKind::aks_agent_pool(),
        "ns1",
        "pool",
        json!({ "spec": { "mode": "System", "count": 3, "enableAutoScaling": false } }),
    );

    assert_eq!(nested_str(&obj, &["spec", "mode"]), Some("System"));
    assert_eq!(nested(&obj, &["spec", "count"]), Some(&json!(3)));
    assert_eq!(nested_bool(&obj, &["spec", "enableAutoScaling"]), Some(false));
    assert_eq!(nested_str(&obj, &["spec", "count"]), None);
    assert_eq!(nested(&obj, &["status", "ready"]), None);
}

#[tokio::test]
async fn test_create_or_get_returns_existing() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({ "spec": {} }));

    let (first, created) = create_or_get(&store, &ctx, &obj).await.unwrap();
    assert!(created);

    let (second, created) = create_or_get(&store, &ctx, &obj).await.unwrap();
    assert!(!created);
    assert_eq!(second.metadata.uid, first.metadata.uid);
    assert_eq!(store.calls().creates, 2);
    assert_eq!(store.calls().gets, 1);
}

#[tokio::test]
async fn test_create_or_get_propagates_other_errors() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    ctx.cancel();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({}));

    let err = create_or_get(&store, &ctx, &obj).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(store
        .get(&OpContext::new(), &ResourceKind::cluster(), "ns1", "c1")
        .await
        .is_err());
}
