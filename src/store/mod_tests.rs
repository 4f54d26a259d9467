// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/mod.rs`

use crate::context::OpContext;
use crate::kinds::ResourceKind;
use crate::resources::new_object;
use crate::store::{
    apply_merge_patch, create_idempotent, get_optional, is_empty_patch, merge_patch, MemoryStore,
};
use serde_json::json;

#[test]
fn test_merge_patch_only_carries_changes() {
    let baseline = json!({
        "metadata": { "name": "a", "labels": { "x": "1", "y": "2" } },
        "spec": { "replicas": 1, "ports": [80] },
    });
    let desired = json!({
        "metadata": { "name": "a", "labels": { "x": "1", "z": "3" } },
        "spec": { "replicas": 2, "ports": [80] },
    });

    let patch = merge_patch(&baseline, &desired);

    assert_eq!(
        patch,
        json!({
            "metadata": { "labels": { "y": null, "z": "3" } },
            "spec": { "replicas": 2 },
        })
    );
}

#[test]
fn test_merge_patch_replaces_arrays_whole() {
    let patch = merge_patch(&json!({ "list": [1, 2] }), &json!({ "list": [1, 2, 3] }));
    assert_eq!(patch, json!({ "list": [1, 2, 3] }));
}

#[test]
fn test_identical_documents_produce_empty_patch() {
    let doc = json!({ "a": { "b": 1 } });
    let patch = merge_patch(&doc, &doc);
    assert!(is_empty_patch(&patch));
    assert!(!is_empty_patch(&json!({ "a": null })));
}

#[test]
fn test_apply_merge_patch_reaches_desired() {
    let baseline = json!({
        "metadata": { "finalizers": ["a"], "annotations": { "k": "v" } },
        "data": { "x": "1" },
    });
    let desired = json!({
        "metadata": { "finalizers": ["a", "b"] },
        "data": { "x": "1", "y": "2" },
    });

    let mut target = baseline.clone();
    apply_merge_patch(&mut target, &merge_patch(&baseline, &desired));

    assert_eq!(target, desired);
}

#[test]
fn test_apply_merge_patch_keeps_concurrent_fields() {
    let baseline = json!({ "spec": { "a": 1 } });
    let desired = json!({ "spec": { "a": 2 } });
    // a field written by someone else since the baseline was read
    let mut current = json!({ "spec": { "a": 1, "b": true } });

    apply_merge_patch(&mut current, &merge_patch(&baseline, &desired));

    assert_eq!(current, json!({ "spec": { "a": 2, "b": true } }));
}

#[tokio::test]
async fn test_get_optional_maps_not_found_to_none() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    store
        .insert(new_object(&ResourceKind::secret(), "ns1", "present", json!({})))
        .unwrap();

    assert!(get_optional(&store, &ctx, &ResourceKind::secret(), "ns1", "present")
        .await
        .unwrap()
        .is_some());
    assert!(get_optional(&store, &ctx, &ResourceKind::secret(), "ns1", "absent")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_get_optional_propagates_cancellation() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    ctx.cancel();

    let err = get_optional(&store, &ctx, &ResourceKind::secret(), "ns1", "absent")
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_create_idempotent_reports_who_created() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    let obj = new_object(&ResourceKind::cluster(), "ns1", "c1", json!({ "spec": {} }));

    assert!(create_idempotent(&store, &ctx, &obj).await.unwrap());
    assert!(!create_idempotent(&store, &ctx, &obj).await.unwrap());
    assert_eq!(store.count(&ResourceKind::cluster()), 1);
}
