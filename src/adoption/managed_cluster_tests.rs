// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `adoption/managed_cluster.rs`

use crate::adoption::{adopt, AdoptionState, AdoptionTarget};
use crate::context::OpContext;
use crate::crd::{AzureASOManagedCluster, AzureASOManagedControlPlane, Cluster};
use crate::resources::{from_dynamic, new_object};
use crate::kinds::ResourceKind;
use crate::store::MemoryStore;
use kube::api::DynamicObject;
use serde_json::json;
use std::collections::BTreeMap;

fn managed_cluster() -> DynamicObject {
    let mut mc = new_object(
        &ResourceKind::aks_managed_cluster(),
        "ns1",
        "cluster-a",
        json!({
            "spec": { "location": "eastus", "owner": { "name": "rg-a" } },
            "status": { "provisioningState": "Succeeded" },
        }),
    );
    mc.metadata.annotations = Some(BTreeMap::from([(
        "sigs.k8s.io/cluster-api-provider-azure-adopt".to_string(),
        "true".to_string(),
    )]));
    mc.metadata.resource_version = Some("7".to_string());
    mc
}

fn seed_resource_group(store: &MemoryStore) {
    store
        .insert(new_object(
            &ResourceKind::resource_group(),
            "ns1",
            "rg-a",
            json!({ "spec": { "location": "eastus" }, "status": { "id": "/subscriptions/x" } }),
        ))
        .unwrap();
}

#[tokio::test]
async fn test_adopts_managed_cluster() {
    let store = MemoryStore::new();
    seed_resource_group(&store);

    let outcome = adopt(&store, &OpContext::new(), &managed_cluster(), AdoptionTarget::ManagedCluster)
        .await
        .unwrap();

    assert_eq!(outcome.state, AdoptionState::PendingAdoption);
    assert_eq!(
        outcome.created,
        vec![
            "Cluster/cluster-a",
            "AzureASOManagedCluster/cluster-a",
            "AzureASOManagedControlPlane/cluster-a",
        ]
    );

    let cluster: Cluster =
        from_dynamic(&store.peek(&ResourceKind::cluster(), "ns1", "cluster-a").unwrap()).unwrap();
    let infra_ref = cluster.spec.infrastructure_ref.unwrap();
    assert_eq!(infra_ref.kind.as_deref(), Some("AzureASOManagedCluster"));
    assert_eq!(
        infra_ref.api_version.as_deref(),
        Some("infrastructure.cluster.x-k8s.io/v1alpha1")
    );
    assert_eq!(
        cluster.spec.control_plane_ref.unwrap().kind.as_deref(),
        Some("AzureASOManagedControlPlane")
    );

    let aso_cluster: AzureASOManagedCluster = from_dynamic(
        &store
            .peek(&ResourceKind::aso_managed_cluster(), "ns1", "cluster-a")
            .unwrap(),
    )
    .unwrap();
    let owner = &aso_cluster.metadata.owner_references.unwrap()[0];
    assert_eq!(owner.kind, "Cluster");
    assert_eq!(owner.uid, "uid-cluster-cluster-a");
    assert_eq!(
        aso_cluster.spec.resources,
        vec![json!({
            "apiVersion": "resources.azure.com/v1api20200601",
            "kind": "ResourceGroup",
            "metadata": { "name": "rg-a" },
            "spec": { "location": "eastus" },
        })]
    );

    let control_plane: AzureASOManagedControlPlane = from_dynamic(
        &store
            .peek(&ResourceKind::aso_managed_control_plane(), "ns1", "cluster-a")
            .unwrap(),
    )
    .unwrap();
    assert_eq!(
        control_plane.spec.resources,
        vec![json!({
            "apiVersion": "containerservice.azure.com/v1api20231001",
            "kind": "ManagedCluster",
            "metadata": { "name": "cluster-a" },
            "spec": { "location": "eastus", "owner": { "name": "rg-a" } },
        })]
    );
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let store = MemoryStore::new();
    seed_resource_group(&store);
    let ctx = OpContext::new();

    adopt(&store, &ctx, &managed_cluster(), AdoptionTarget::ManagedCluster)
        .await
        .unwrap();
    let outcome = adopt(&store, &ctx, &managed_cluster(), AdoptionTarget::ManagedCluster)
        .await
        .unwrap();

    assert!(outcome.created.is_empty());
    assert_eq!(store.count(&ResourceKind::cluster()), 1);
    assert_eq!(store.count(&ResourceKind::aso_managed_cluster()), 1);
    assert_eq!(store.count(&ResourceKind::aso_managed_control_plane()), 1);
}

#[tokio::test]
async fn test_missing_resource_group_aborts_after_cluster() {
    let store = MemoryStore::new();

    let err = adopt(&store, &OpContext::new(), &managed_cluster(), AdoptionTarget::ManagedCluster)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.count(&ResourceKind::cluster()), 1);
    assert_eq!(store.count(&ResourceKind::aso_managed_cluster()), 0);

    // retry converges once the resource group exists
    seed_resource_group(&store);
    let outcome = adopt(&store, &OpContext::new(), &managed_cluster(), AdoptionTarget::ManagedCluster)
        .await
        .unwrap();
    assert_eq!(outcome.created.len(), 2);
}

#[tokio::test]
async fn test_missing_owner_name_is_resolution_error() {
    let store = MemoryStore::new();
    let mut mc = managed_cluster();
    mc.data["spec"].as_object_mut().unwrap().remove("owner");

    let err = adopt(&store, &OpContext::new(), &mc, AdoptionTarget::ManagedCluster)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("spec.owner.name"));
}
