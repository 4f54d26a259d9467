// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/memory.rs`

use crate::context::OpContext;
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use crate::resources::new_object;
use crate::store::{LabelSelector, MemoryStore, ObjectStore};
use kube::api::DynamicObject;
use serde_json::json;
use std::collections::BTreeMap;

fn labelled(namespace: &str, name: &str, cluster: &str) -> DynamicObject {
    let mut obj = new_object(&ResourceKind::machine(), namespace, name, json!({ "spec": {} }));
    obj.metadata.labels = Some(BTreeMap::from([(
        "cluster.x-k8s.io/cluster-name".to_string(),
        cluster.to_string(),
    )]));
    obj
}

fn selector(cluster: &str) -> LabelSelector {
    BTreeMap::from([(
        "cluster.x-k8s.io/cluster-name".to_string(),
        cluster.to_string(),
    )])
}

#[tokio::test]
async fn test_create_assigns_uid_and_resource_version() {
    let store = MemoryStore::new();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({ "spec": {} }));

    let created = store.create(&OpContext::new(), &obj).await.unwrap();

    assert_eq!(created.metadata.uid.as_deref(), Some("uid-cluster-c1"));
    assert!(created.metadata.resource_version.is_some());
    assert_eq!(store.calls().creates, 1);
}

#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({ "spec": {} }));

    store.create(&ctx, &obj).await.unwrap();
    let err = store.create(&ctx, &obj).await.unwrap_err();

    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_same_name_in_other_namespace_is_distinct() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();

    store
        .create(&ctx, &new_object(&ResourceKind::cluster(), "ns1", "c1", json!({})))
        .await
        .unwrap();
    store
        .create(&ctx, &new_object(&ResourceKind::cluster(), "ns2", "c1", json!({})))
        .await
        .unwrap();

    assert_eq!(store.count(&ResourceKind::cluster()), 2);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store = MemoryStore::new();

    let err = store
        .get(&OpContext::new(), &ResourceKind::secret(), "ns1", "nope")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound { ref name, .. } if name == "nope"));
    assert_eq!(store.calls().gets, 1);
}

#[tokio::test]
async fn test_list_filters_by_namespace_and_labels() {
    let store = MemoryStore::new();
    store.insert(labelled("ns1", "m1", "a")).unwrap();
    store.insert(labelled("ns1", "m2", "b")).unwrap();
    store.insert(labelled("ns2", "m3", "a")).unwrap();
    let ctx = OpContext::new();

    let in_ns1 = store
        .list(&ctx, &ResourceKind::machine(), Some("ns1"), &selector("a"))
        .await
        .unwrap();
    let everywhere = store
        .list(&ctx, &ResourceKind::machine(), None, &selector("a"))
        .await
        .unwrap();
    let unfiltered = store
        .list(&ctx, &ResourceKind::machine(), Some("ns1"), &LabelSelector::new())
        .await
        .unwrap();

    assert_eq!(in_ns1.len(), 1);
    assert_eq!(in_ns1[0].metadata.name.as_deref(), Some("m1"));
    assert_eq!(everywhere.len(), 2);
    assert_eq!(unfiltered.len(), 2);
}

#[tokio::test]
async fn test_patch_merges_and_bumps_resource_version() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    store
        .insert(new_object(
            &ResourceKind::secret(),
            "ns1",
            "s1",
            json!({ "data": { "a": "MQ==" } }),
        ))
        .unwrap();

    let baseline = store.get(&ctx, &ResourceKind::secret(), "ns1", "s1").await.unwrap();
    let mut desired = baseline.clone();
    desired.data["data"]["b"] = json!("Mg==");
    desired.metadata.finalizers = Some(vec!["example.com/f".to_string()]);

    let patched = store.patch(&ctx, &desired, &baseline).await.unwrap();

    assert_eq!(patched.data["data"], json!({ "a": "MQ==", "b": "Mg==" }));
    assert_eq!(patched.metadata.finalizers, Some(vec!["example.com/f".to_string()]));
    assert_ne!(patched.metadata.resource_version, baseline.metadata.resource_version);
    assert_eq!(store.calls().patches, 1);
}

#[tokio::test]
async fn test_stale_baseline_conflicts() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    store
        .insert(new_object(&ResourceKind::secret(), "ns1", "s1", json!({ "data": {} })))
        .unwrap();

    let baseline = store.get(&ctx, &ResourceKind::secret(), "ns1", "s1").await.unwrap();
    let mut first = baseline.clone();
    first.data["data"]["a"] = json!("MQ==");
    store.patch(&ctx, &first, &baseline).await.unwrap();

    let mut second = baseline.clone();
    second.data["data"]["b"] = json!("Mg==");
    let err = store.patch(&ctx, &second, &baseline).await.unwrap_err();

    assert!(matches!(err, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn test_patch_missing_object_is_not_found() {
    let store = MemoryStore::new();
    let obj = new_object(&ResourceKind::secret(), "ns1", "gone", json!({}));

    let err = store.patch(&OpContext::new(), &obj, &obj).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_cancelled_context_fails_every_call() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    ctx.cancel();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({}));

    assert!(store
        .list(&ctx, &ResourceKind::cluster(), None, &LabelSelector::new())
        .await
        .unwrap_err()
        .is_cancelled());
    assert!(store.create(&ctx, &obj).await.unwrap_err().is_cancelled());
    assert_eq!(store.count(&ResourceKind::cluster()), 0);
}

#[test]
fn test_insert_requires_name() {
    let store = MemoryStore::new();
    let mut obj = new_object(&ResourceKind::secret(), "ns1", "s1", json!({}));
    obj.metadata.name = None;

    assert!(matches!(store.insert(obj), Err(StoreError::InvalidObject(_))));
}

#[tokio::test]
async fn test_reset_calls() {
    let store = MemoryStore::new();
    let _ = store
        .get(&OpContext::new(), &ResourceKind::secret(), "ns1", "s1")
        .await;
    store.reset_calls();
    assert_eq!(store.calls().gets, 0);
}
