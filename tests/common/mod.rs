// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use capz_adopt::kinds::ResourceKind;
use capz_adopt::resources::new_object;
use capz_adopt::store::MemoryStore;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::client::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const ADOPT_ANNOTATION: &str = "sigs.k8s.io/cluster-api-provider-azure-adopt";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "capz-adopt-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

/// Owner reference with a uid derived from kind and name
pub fn owner_ref(api_version: &str, kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{}-{name}", kind.to_lowercase()),
        ..OwnerReference::default()
    }
}

/// Mark an object for adoption
pub fn annotate_for_adoption(obj: &mut DynamicObject) {
    obj.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ADOPT_ANNOTATION.to_string(), "true".to_string());
}

/// ASO `ResourceGroup`
pub fn resource_group(namespace: &str, name: &str) -> DynamicObject {
    new_object(
        &ResourceKind::resource_group(),
        namespace,
        name,
        json!({
            "spec": { "location": "eastus" },
            "status": { "provisioningState": "Succeeded" },
        }),
    )
}

/// ASO `ManagedCluster` owned by `resource_group`, annotated for adoption
pub fn aks_cluster(namespace: &str, name: &str, resource_group: &str) -> DynamicObject {
    let mut mc = new_object(
        &ResourceKind::aks_managed_cluster(),
        namespace,
        name,
        json!({
            "spec": {
                "location": "eastus",
                "dnsPrefix": name,
                "owner": { "name": resource_group },
            },
            "status": { "provisioningState": "Succeeded" },
        }),
    );
    annotate_for_adoption(&mut mc);
    mc
}

/// ASO `ManagedClustersAgentPool` owned by `cluster`, annotated for adoption
pub fn agent_pool(namespace: &str, name: &str, cluster: &str, spec: Value) -> DynamicObject {
    let mut pool = new_object(
        &ResourceKind::aks_agent_pool(),
        namespace,
        name,
        json!({ "spec": spec, "status": { "count": 3 } }),
    );
    pool.metadata.owner_references = Some(vec![owner_ref(
        "containerservice.azure.com/v1api20231001",
        "ManagedCluster",
        cluster,
    )]);
    annotate_for_adoption(&mut pool);
    pool
}

/// Link an already-adopted `ManagedCluster` to its control plane, as the
/// ASO wrapper controller does once it takes ownership
pub fn mark_cluster_adopted(store: &MemoryStore, namespace: &str, name: &str) {
    let mut mc = store
        .peek(&ResourceKind::aks_managed_cluster(), namespace, name)
        .expect("managed cluster is seeded");
    mc.metadata.owner_references = Some(vec![owner_ref(
        "infrastructure.cluster.x-k8s.io/v1alpha1",
        "AzureASOManagedControlPlane",
        name,
    )]);
    store.insert(mc).expect("managed cluster is valid");
}
