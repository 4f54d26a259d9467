// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `mappers.rs`

use crate::config::ControllerConfig;
use crate::context::{Context, OpContext};
use crate::kinds::ResourceKind;
use crate::mappers::{
    azure_cluster_to_azure_machines, azure_managed_cluster_to_control_plane,
    azure_managed_cluster_to_machine_pools, azure_managed_control_plane_to_cluster,
    azure_managed_control_plane_to_machine_pools, machine_pool_to_control_plane,
    machine_pool_to_infrastructure, request, requests_by_cluster_name, Request,
};
use crate::resources::new_object;
use crate::store::MemoryStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use serde_json::{json, Value};
use std::sync::Arc;

const INFRA: &str = "infrastructure.cluster.x-k8s.io/v1beta1";

fn setup() -> (Arc<MemoryStore>, Context) {
    let store = Arc::new(MemoryStore::new());
    let ctx = Context::new(store.clone(), ControllerConfig::default());
    (store, ctx)
}

fn cluster_owner(name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Cluster".to_string(),
        name: name.to_string(),
        uid: format!("uid-cluster-{name}"),
        ..OwnerReference::default()
    }
}

fn owned(kind: &ResourceKind, name: &str, cluster: &str) -> DynamicObject {
    let mut obj = new_object(kind, "ns1", name, json!({ "spec": {} }));
    obj.metadata.owner_references = Some(vec![cluster_owner(cluster)]);
    obj
}

fn labelled(kind: &ResourceKind, namespace: &str, name: &str, cluster: &str, spec: Value) -> DynamicObject {
    let mut obj = new_object(kind, namespace, name, json!({ "spec": spec }));
    obj.metadata.labels = Some(
        [("cluster.x-k8s.io/cluster-name".to_string(), cluster.to_string())]
            .into_iter()
            .collect(),
    );
    obj
}

fn machine_pool(name: &str, cluster: &str, infra_kind: &str, infra_name: &str) -> DynamicObject {
    labelled(
        &ResourceKind::machine_pool(),
        "ns1",
        name,
        cluster,
        json!({
            "clusterName": cluster,
            "template": { "spec": {
                "clusterName": cluster,
                "bootstrap": {},
                "infrastructureRef": { "apiVersion": INFRA, "kind": infra_kind, "name": infra_name },
            }},
        }),
    )
}

fn seed_cluster(store: &MemoryStore, control_plane_kind: &str) {
    store
        .insert(new_object(
            &ResourceKind::cluster(),
            "ns1",
            "cluster-a",
            json!({ "spec": {
                "controlPlaneRef": { "apiVersion": INFRA, "kind": control_plane_kind, "name": "cp-a" },
                "infrastructureRef": { "apiVersion": INFRA, "kind": "AzureManagedCluster", "name": "amc-a" },
            }}),
        ))
        .unwrap();
}

fn deleting(mut obj: DynamicObject) -> DynamicObject {
    obj.metadata.deletion_timestamp = Some(serde_json::from_value(json!("2025-01-01T00:00:00Z")).unwrap());
    obj
}

fn names(requests: &[Request]) -> Vec<String> {
    let mut names: Vec<String> = requests.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}

#[test]
fn test_request_is_namespaced() {
    let r = request(&ResourceKind::azure_machine(), "ns1", "m-1");
    assert_eq!(r.name, "m-1");
    assert_eq!(r.namespace.as_deref(), Some("ns1"));

    let r = request(&ResourceKind::namespace(), "ignored", "ns1");
    assert_eq!(r.namespace, None);
}

#[tokio::test]
async fn test_requests_by_cluster_name() {
    let store = MemoryStore::new();
    let kind = ResourceKind::machine_pool();
    store.insert(labelled(&kind, "ns1", "a", "cluster-a", json!({}))).unwrap();
    store.insert(labelled(&kind, "ns1", "b", "cluster-a", json!({}))).unwrap();
    store.insert(labelled(&kind, "ns1", "c", "cluster-b", json!({}))).unwrap();
    store.insert(labelled(&kind, "ns2", "d", "cluster-a", json!({}))).unwrap();

    let requests = requests_by_cluster_name(&store, &OpContext::new(), &kind, "ns1", "cluster-a").await;
    assert_eq!(names(&requests), vec!["a", "b"]);
}

#[tokio::test]
async fn test_requests_by_cluster_name_list_failure_is_empty() {
    let store = MemoryStore::new();
    let ctx = OpContext::new();
    ctx.cancel();
    let requests =
        requests_by_cluster_name(&store, &ctx, &ResourceKind::machine_pool(), "ns1", "cluster-a").await;
    assert!(requests.is_empty());
}

#[test]
fn test_machine_pool_to_infrastructure() {
    let target = ResourceKind::azure_managed_machine_pool();
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");
    assert_eq!(names(&machine_pool_to_infrastructure(&pool, &target)), vec!["ammp-a"]);

    let other = machine_pool("mp-b", "cluster-a", "AzureMachinePool", "amp-b");
    assert!(machine_pool_to_infrastructure(&other, &target).is_empty());
}

#[tokio::test]
async fn test_azure_cluster_to_azure_machines() {
    let (store, ctx) = setup();
    store
        .insert(labelled(
            &ResourceKind::machine(),
            "ns1",
            "m-1",
            "cluster-a",
            json!({ "infrastructureRef": { "apiVersion": INFRA, "kind": "AzureMachine", "name": "am-1" } }),
        ))
        .unwrap();
    store
        .insert(labelled(
            &ResourceKind::machine(),
            "ns1",
            "m-2",
            "cluster-a",
            json!({ "infrastructureRef": { "apiVersion": INFRA, "kind": "DockerMachine", "name": "dm-2" } }),
        ))
        .unwrap();
    let azure_cluster = owned(&ResourceKind::azure_cluster(), "ac-a", "cluster-a");

    let requests = azure_cluster_to_azure_machines(&ctx, &azure_cluster).await;
    assert_eq!(names(&requests), vec!["am-1"]);

    assert!(azure_cluster_to_azure_machines(&ctx, &deleting(azure_cluster)).await.is_empty());

    let orphan = new_object(&ResourceKind::azure_cluster(), "ns1", "ac-b", json!({ "spec": {} }));
    assert!(azure_cluster_to_azure_machines(&ctx, &orphan).await.is_empty());
}

#[tokio::test]
async fn test_managed_objects_to_machine_pools() {
    let (store, ctx) = setup();
    store
        .insert(machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a"))
        .unwrap();
    store
        .insert(machine_pool("mp-b", "cluster-a", "AzureManagedMachinePool", "ammp-b"))
        .unwrap();
    store
        .insert(machine_pool("mp-c", "cluster-b", "AzureManagedMachinePool", "ammp-c"))
        .unwrap();

    let amc = owned(&ResourceKind::azure_managed_cluster(), "amc-a", "cluster-a");
    assert_eq!(
        names(&azure_managed_cluster_to_machine_pools(&ctx, &amc).await),
        vec!["ammp-a", "ammp-b"]
    );

    let amcp = owned(&ResourceKind::azure_managed_control_plane(), "cp-a", "cluster-a");
    assert_eq!(
        names(&azure_managed_control_plane_to_machine_pools(&ctx, &amcp).await),
        vec!["ammp-a", "ammp-b"]
    );
    assert!(azure_managed_control_plane_to_machine_pools(&ctx, &deleting(amcp))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_managed_cluster_and_control_plane_map_to_each_other() {
    let (store, ctx) = setup();
    seed_cluster(&store, "AzureManagedControlPlane");

    let amc = owned(&ResourceKind::azure_managed_cluster(), "amc-a", "cluster-a");
    let requests = azure_managed_cluster_to_control_plane(&ctx, &amc).await;
    assert_eq!(names(&requests), vec!["cp-a"]);
    assert_eq!(requests[0].namespace.as_deref(), Some("ns1"));

    let amcp = owned(&ResourceKind::azure_managed_control_plane(), "cp-a", "cluster-a");
    assert_eq!(
        names(&azure_managed_control_plane_to_cluster(&ctx, &amcp).await),
        vec!["amc-a"]
    );
}

#[tokio::test]
async fn test_missing_owner_cluster_maps_nothing() {
    let (_store, ctx) = setup();
    let amc = owned(&ResourceKind::azure_managed_cluster(), "amc-a", "cluster-a");
    assert!(azure_managed_cluster_to_control_plane(&ctx, &amc).await.is_empty());

    let no_owner = new_object(&ResourceKind::azure_managed_control_plane(), "ns1", "cp-a", json!({ "spec": {} }));
    assert!(azure_managed_control_plane_to_cluster(&ctx, &no_owner).await.is_empty());
}

fn seed_control_plane_and_pool(store: &MemoryStore, mode: &str) {
    store
        .insert(new_object(
            &ResourceKind::azure_managed_control_plane(),
            "ns1",
            "cp-a",
            json!({ "spec": {} }),
        ))
        .unwrap();
    store
        .insert(new_object(
            &ResourceKind::azure_managed_machine_pool(),
            "ns1",
            "ammp-a",
            json!({ "spec": { "mode": mode } }),
        ))
        .unwrap();
}

#[tokio::test]
async fn test_system_pool_maps_to_control_plane() {
    let (store, ctx) = setup();
    seed_cluster(&store, "AzureManagedControlPlane");
    seed_control_plane_and_pool(&store, "System");
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");

    assert_eq!(names(&machine_pool_to_control_plane(&ctx, &pool).await), vec!["cp-a"]);
}

#[tokio::test]
async fn test_user_pool_maps_nothing() {
    let (store, ctx) = setup();
    seed_cluster(&store, "AzureManagedControlPlane");
    seed_control_plane_and_pool(&store, "User");
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");

    assert!(machine_pool_to_control_plane(&ctx, &pool).await.is_empty());
}

#[tokio::test]
async fn test_unknown_pool_mode_maps_to_control_plane_anyway() {
    let (store, ctx) = setup();
    seed_cluster(&store, "AzureManagedControlPlane");
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");

    // control plane missing
    assert_eq!(names(&machine_pool_to_control_plane(&ctx, &pool).await), vec!["cp-a"]);

    // managed machine pool missing
    store
        .insert(new_object(
            &ResourceKind::azure_managed_control_plane(),
            "ns1",
            "cp-a",
            json!({ "spec": {} }),
        ))
        .unwrap();
    assert_eq!(names(&machine_pool_to_control_plane(&ctx, &pool).await), vec!["cp-a"]);
}

#[tokio::test]
async fn test_other_control_plane_kind_maps_nothing() {
    let (store, ctx) = setup();
    seed_cluster(&store, "KubeadmControlPlane");
    seed_control_plane_and_pool(&store, "System");
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");

    assert!(machine_pool_to_control_plane(&ctx, &pool).await.is_empty());
}

#[tokio::test]
async fn test_machine_pool_without_cluster_maps_nothing() {
    let (_store, ctx) = setup();
    let pool = machine_pool("mp-a", "cluster-a", "AzureManagedMachinePool", "ammp-a");
    assert!(machine_pool_to_control_plane(&ctx, &pool).await.is_empty());
}
