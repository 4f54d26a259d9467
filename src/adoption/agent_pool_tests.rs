// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `adoption/agent_pool.rs`

use super::cluster_name_for;
use crate::adoption::{adopt, AdoptionState, AdoptionTarget};
use crate::context::OpContext;
use crate::crd::{AzureASOManagedMachinePool, MachinePool};
use crate::errors::{Error, ResolutionError};
use crate::kinds::ResourceKind;
use crate::resources::{from_dynamic, new_object};
use crate::store::MemoryStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{}-{name}", kind.to_lowercase()),
        ..OwnerReference::default()
    }
}

fn agent_pool(spec: Value) -> DynamicObject {
    let mut pool = new_object(&ResourceKind::aks_agent_pool(), "ns1", "pool-a", json!({ "spec": spec }));
    pool.metadata.annotations = Some(BTreeMap::from([(
        "sigs.k8s.io/cluster-api-provider-azure-adopt".to_string(),
        "true".to_string(),
    )]));
    pool.metadata.owner_references = Some(vec![owner(
        "containerservice.azure.com/v1api20231001",
        "ManagedCluster",
        "cluster-a",
    )]);
    pool
}

fn control_plane(labels: Option<BTreeMap<String, String>>) -> DynamicObject {
    let mut cp = new_object(
        &ResourceKind::aso_managed_control_plane(),
        "ns1",
        "cluster-a",
        json!({ "spec": { "resources": [] } }),
    );
    cp.metadata.labels = labels;
    cp
}

/// Seed the `ManagedCluster` and its adopting control plane.
fn seed_owners(store: &MemoryStore) {
    let mut mc = new_object(
        &ResourceKind::aks_managed_cluster(),
        "ns1",
        "cluster-a",
        json!({ "spec": { "location": "eastus" } }),
    );
    mc.metadata.owner_references = Some(vec![owner(
        "infrastructure.cluster.x-k8s.io/v1alpha1",
        "AzureASOManagedControlPlane",
        "cluster-a",
    )]);
    store.insert(mc).unwrap();
    store
        .insert(control_plane(Some(BTreeMap::from([(
            "cluster.x-k8s.io/cluster-name".to_string(),
            "cluster-a".to_string(),
        )]))))
        .unwrap();
}

#[tokio::test]
async fn test_adopts_agent_pool_into_machine_pool() {
    let store = MemoryStore::new();
    seed_owners(&store);
    let pool = agent_pool(json!({ "count": 3, "mode": "User", "owner": { "name": "cluster-a" } }));

    let outcome = adopt(&store, &OpContext::new(), &pool, AdoptionTarget::AgentPool)
        .await
        .unwrap();

    assert_eq!(outcome.state, AdoptionState::PendingAdoption);
    assert_eq!(
        outcome.created,
        vec!["AzureASOManagedMachinePool/pool-a", "MachinePool/pool-a"]
    );
    assert_eq!(store.count(&ResourceKind::machine_pool()), 1);
    assert_eq!(store.count(&ResourceKind::aso_managed_machine_pool()), 1);

    let machine_pool: MachinePool =
        from_dynamic(&store.peek(&ResourceKind::machine_pool(), "ns1", "pool-a").unwrap()).unwrap();
    assert_eq!(machine_pool.spec.cluster_name, "cluster-a");
    assert_eq!(machine_pool.spec.replicas, Some(3));
    assert!(machine_pool.metadata.annotations.is_none());

    let template = &machine_pool.spec.template.spec;
    assert_eq!(template.cluster_name, "cluster-a");
    assert_eq!(template.bootstrap.data_secret_name.as_deref(), Some(""));
    assert_eq!(
        template.infrastructure_ref.kind.as_deref(),
        Some("AzureASOManagedMachinePool")
    );
    assert_eq!(template.infrastructure_ref.name.as_deref(), Some("pool-a"));

    let wrapper: AzureASOManagedMachinePool = from_dynamic(
        &store
            .peek(&ResourceKind::aso_managed_machine_pool(), "ns1", "pool-a")
            .unwrap(),
    )
    .unwrap();
    assert_eq!(
        wrapper
            .metadata
            .labels
            .unwrap()
            .get("cluster.x-k8s.io/cluster-name")
            .map(String::as_str),
        Some("cluster-a")
    );
    assert_eq!(
        wrapper.spec.resources,
        vec![json!({
            "apiVersion": "containerservice.azure.com/v1api20231001",
            "kind": "ManagedClustersAgentPool",
            "metadata": { "name": "pool-a" },
            "spec": { "count": 3, "mode": "User", "owner": { "name": "cluster-a" } },
        })]
    );
}

#[tokio::test]
async fn test_autoscaling_pool_hands_replicas_to_aks() {
    let store = MemoryStore::new();
    seed_owners(&store);
    let pool = agent_pool(json!({ "count": 2, "enableAutoScaling": true }));

    adopt(&store, &OpContext::new(), &pool, AdoptionTarget::AgentPool)
        .await
        .unwrap();

    let machine_pool = store.peek(&ResourceKind::machine_pool(), "ns1", "pool-a").unwrap();
    assert_eq!(
        machine_pool
            .metadata
            .annotations
            .unwrap()
            .get("cluster.x-k8s.io/replicas-managed-by")
            .map(String::as_str),
        Some("aks")
    );
}

#[tokio::test]
async fn test_missing_count_leaves_replicas_unset() {
    let store = MemoryStore::new();
    seed_owners(&store);

    adopt(&store, &OpContext::new(), &agent_pool(json!({})), AdoptionTarget::AgentPool)
        .await
        .unwrap();

    let machine_pool: MachinePool =
        from_dynamic(&store.peek(&ResourceKind::machine_pool(), "ns1", "pool-a").unwrap()).unwrap();
    assert_eq!(machine_pool.spec.replicas, None);
}

#[tokio::test]
async fn test_unadopted_managed_cluster_is_owner_not_found() {
    let store = MemoryStore::new();
    store
        .insert(new_object(
            &ResourceKind::aks_managed_cluster(),
            "ns1",
            "cluster-a",
            json!({ "spec": {} }),
        ))
        .unwrap();

    let err = adopt(
        &store,
        &OpContext::new(),
        &agent_pool(json!({ "count": 1 })),
        AdoptionTarget::AgentPool,
    )
    .await
    .unwrap_err();

    match err {
        Error::Resolution(ResolutionError::OwnerNotFound { hop, kind, name, .. }) => {
            assert_eq!(hop, ResourceKind::aso_managed_control_plane().group_kind());
            assert_eq!(kind, "ManagedCluster");
            assert_eq!(name, "cluster-a");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.calls().writes(), 0);
}

#[tokio::test]
async fn test_missing_managed_cluster_is_not_found() {
    let store = MemoryStore::new();

    let err = adopt(
        &store,
        &OpContext::new(),
        &agent_pool(json!({ "count": 1 })),
        AdoptionTarget::AgentPool,
    )
    .await
    .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_adoption_is_idempotent() {
    let store = MemoryStore::new();
    seed_owners(&store);
    let pool = agent_pool(json!({ "count": 3 }));
    let ctx = OpContext::new();

    adopt(&store, &ctx, &pool, AdoptionTarget::AgentPool).await.unwrap();
    let second = adopt(&store, &ctx, &pool, AdoptionTarget::AgentPool).await.unwrap();

    assert!(second.created.is_empty());
    assert_eq!(store.count(&ResourceKind::machine_pool()), 1);
    assert_eq!(store.count(&ResourceKind::aso_managed_machine_pool()), 1);
}

#[tokio::test]
async fn test_already_adopted_pool_is_skipped() {
    let store = MemoryStore::new();
    seed_owners(&store);
    let mut pool = agent_pool(json!({ "count": 3 }));
    pool.metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(owner(
            "infrastructure.cluster.x-k8s.io/v1alpha1",
            "AzureASOManagedMachinePool",
            "pool-a",
        ));

    let outcome = adopt(&store, &OpContext::new(), &pool, AdoptionTarget::AgentPool)
        .await
        .unwrap();

    assert_eq!(outcome.state, AdoptionState::AlreadyAdopted);
    assert_eq!(store.count(&ResourceKind::machine_pool()), 0);
}

#[test]
fn test_cluster_name_prefers_label() {
    let cp = control_plane(Some(BTreeMap::from([(
        "cluster.x-k8s.io/cluster-name".to_string(),
        "from-label".to_string(),
    )])));
    assert_eq!(cluster_name_for(&cp), "from-label");
}

#[test]
fn test_cluster_name_falls_back_to_owner_then_name() {
    let mut cp = control_plane(None);
    assert_eq!(cluster_name_for(&cp), "cluster-a");

    cp.metadata.owner_references = Some(vec![owner("cluster.x-k8s.io/v1beta1", "Cluster", "owner-cluster")]);
    assert_eq!(cluster_name_for(&cp), "owner-cluster");

    // an empty label is ignored
    cp.metadata.labels = Some(BTreeMap::from([(
        "cluster.x-k8s.io/cluster-name".to_string(),
        String::new(),
    )]));
    assert_eq!(cluster_name_for(&cp), "owner-cluster");
}
