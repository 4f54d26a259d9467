// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch fan-out: turn an event on one object into reconcile requests for
//! related objects.
//!
//! Every mapper runs under [`Context::mapping_scope`], so a slow API server
//! cannot stall the watch. Mappers never fail: a lookup error is logged and
//! yields no requests, except where a missed reconcile would be worse than a
//! redundant one (see [`machine_pool_to_control_plane`]). Objects carrying a
//! deletion timestamp are never mapped.

use crate::constants::{INFRA_GROUP, KIND_AZURE_MANAGED_MACHINE_POOL, NODE_POOL_MODE_SYSTEM};
use crate::context::{Context, OpContext};
use crate::crd::{AzureManagedMachinePool, Cluster, MachinePool};
use crate::kinds::{parse_group_version, GroupKind, ResourceKind};
use crate::labels::CLUSTER_NAME_LABEL;
use crate::metrics;
use crate::ownership::{owner_cluster_name, owner_of};
use crate::resources::{from_dynamic, nested};
use crate::store::{LabelSelector, ObjectStore};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::DynamicObject;
use kube::runtime::reflector::ObjectRef;
use tracing::{debug, warn};

/// A reconcile request for a dynamically typed object.
pub type Request = ObjectRef<DynamicObject>;

/// Build a request for `kind` at `namespace/name`.
#[must_use]
pub fn request(kind: &ResourceKind, namespace: &str, name: &str) -> Request {
    let reference = ObjectRef::new_with(name, kind.api_resource());
    if kind.namespaced {
        reference.within(namespace)
    } else {
        reference
    }
}

fn is_deleting(obj: &DynamicObject) -> bool {
    obj.metadata.deletion_timestamp.is_some()
}

fn namespace_of(obj: &DynamicObject) -> &str {
    obj.metadata.namespace.as_deref().unwrap_or_default()
}

fn name_of(obj: &DynamicObject) -> &str {
    obj.metadata.name.as_deref().unwrap_or_default()
}

fn finish(mapper: &str, requests: Vec<Request>) -> Vec<Request> {
    metrics::record_mapped_requests(mapper, requests.len());
    requests
}

/// Group and kind of an object reference; `None` if its `apiVersion` is malformed.
fn reference_group_kind(reference: &ObjectReference) -> Option<GroupKind> {
    let gv = parse_group_version(reference.api_version.as_deref().unwrap_or_default()).ok()?;
    Some(GroupKind::new(
        gv.group,
        reference.kind.clone().unwrap_or_default(),
    ))
}

/// Namespace of a reference, falling back to the referencing object's.
fn reference_namespace<'a>(reference: &'a ObjectReference, fallback: &'a str) -> &'a str {
    reference
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(fallback)
}

/// Requests for every object of `kind` labelled with the cluster name.
///
/// A failed list is logged and yields no requests.
pub async fn requests_by_cluster_name(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    kind: &ResourceKind,
    cluster_namespace: &str,
    cluster_name: &str,
) -> Vec<Request> {
    let selector = LabelSelector::from([(CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string())]);
    match store.list(ctx, kind, Some(cluster_namespace), &selector).await {
        Ok(objects) => objects
            .iter()
            .map(|obj| request(kind, namespace_of(obj), name_of(obj)))
            .collect(),
        Err(e) => {
            warn!(
                kind = %kind,
                namespace = %cluster_namespace,
                cluster = %cluster_name,
                error = %e,
                "Failed to list objects by cluster name"
            );
            Vec::new()
        }
    }
}

/// The infrastructure object of a `MachinePool`, when it is of kind `target`.
#[must_use]
pub fn machine_pool_to_infrastructure(machine_pool: &DynamicObject, target: &ResourceKind) -> Vec<Request> {
    let Ok(pool) = from_dynamic::<MachinePool>(machine_pool) else {
        debug!(name = %name_of(machine_pool), "Object is not a MachinePool, skipping mapping");
        return Vec::new();
    };
    let reference = &pool.spec.template.spec.infrastructure_ref;
    if reference_group_kind(reference).as_ref() != Some(&target.group_kind()) {
        return Vec::new();
    }

    vec![request(
        target,
        namespace_of(machine_pool),
        reference.name.as_deref().unwrap_or_default(),
    )]
}

/// `AzureCluster` to the `AzureMachine`s of its cluster's machines.
pub async fn azure_cluster_to_azure_machines(ctx: &Context, azure_cluster: &DynamicObject) -> Vec<Request> {
    const MAPPER: &str = "azure_cluster_to_azure_machines";
    if is_deleting(azure_cluster) {
        debug!(name = %name_of(azure_cluster), "AzureCluster has a deletion timestamp, skipping mapping");
        return Vec::new();
    }
    let Some(cluster_name) = owner_cluster_name(&azure_cluster.metadata) else {
        debug!(name = %name_of(azure_cluster), "Unable to get the owner cluster");
        return Vec::new();
    };

    let op = ctx.mapping_scope();
    let selector = LabelSelector::from([(CLUSTER_NAME_LABEL.to_string(), cluster_name)]);
    let machines = match ctx
        .store
        .list(&op, &ResourceKind::machine(), Some(namespace_of(azure_cluster)), &selector)
        .await
    {
        Ok(machines) => machines,
        Err(e) => {
            warn!(name = %name_of(azure_cluster), error = %e, "Failed to list machines");
            return Vec::new();
        }
    };

    let target = ResourceKind::azure_machine();
    let requests = machines
        .iter()
        .filter_map(|machine| {
            let reference: ObjectReference =
                serde_json::from_value(nested(machine, &["spec", "infrastructureRef"])?.clone()).ok()?;
            (reference_group_kind(&reference)? == target.group_kind()).then(|| {
                request(
                    &target,
                    namespace_of(machine),
                    reference.name.as_deref().unwrap_or_default(),
                )
            })
        })
        .collect();
    finish(MAPPER, requests)
}

/// `AzureManagedMachinePool`s of the cluster owning `source`.
async fn owner_cluster_machine_pools(ctx: &Context, source: &DynamicObject, mapper: &str) -> Vec<Request> {
    if is_deleting(source) {
        debug!(name = %name_of(source), "Object has a deletion timestamp, skipping mapping");
        return Vec::new();
    }
    let Some(cluster_name) = owner_cluster_name(&source.metadata) else {
        debug!(name = %name_of(source), "Unable to get the owner cluster");
        return Vec::new();
    };

    let op = ctx.mapping_scope();
    let selector = LabelSelector::from([(CLUSTER_NAME_LABEL.to_string(), cluster_name)]);
    let pools = match ctx
        .store
        .list(&op, &ResourceKind::machine_pool(), Some(namespace_of(source)), &selector)
        .await
    {
        Ok(pools) => pools,
        Err(e) => {
            warn!(name = %name_of(source), error = %e, "Failed to list machine pools");
            return Vec::new();
        }
    };

    let target = ResourceKind::azure_managed_machine_pool();
    let requests = pools
        .iter()
        .flat_map(|pool| machine_pool_to_infrastructure(pool, &target))
        .collect();
    finish(mapper, requests)
}

/// `AzureManagedCluster` to the `AzureManagedMachinePool`s of its cluster.
pub async fn azure_managed_cluster_to_machine_pools(ctx: &Context, source: &DynamicObject) -> Vec<Request> {
    owner_cluster_machine_pools(ctx, source, "azure_managed_cluster_to_machine_pools").await
}

/// `AzureManagedControlPlane` to the `AzureManagedMachinePool`s of its cluster.
pub async fn azure_managed_control_plane_to_machine_pools(
    ctx: &Context,
    source: &DynamicObject,
) -> Vec<Request> {
    owner_cluster_machine_pools(ctx, source, "azure_managed_control_plane_to_machine_pools").await
}

/// The owning `Cluster` of `source`, or `None` (logged) when it cannot be read.
async fn owner_cluster(ctx: &Context, source: &DynamicObject) -> Option<Cluster> {
    let op = ctx.mapping_scope();
    let kind = ResourceKind::cluster();
    match owner_of(ctx.store.as_ref(), &op, source, &kind.group, &kind.kind).await {
        Ok(Some(cluster)) => match from_dynamic(&cluster) {
            Ok(cluster) => Some(cluster),
            Err(e) => {
                warn!(name = %name_of(source), error = %e, "Failed to decode the owning cluster");
                None
            }
        },
        Ok(None) => {
            debug!(name = %name_of(source), "Cluster has not set owner ref yet");
            None
        }
        Err(e) => {
            warn!(name = %name_of(source), error = %e, "Failed to get the owning cluster");
            None
        }
    }
}

/// `AzureManagedCluster` to the control plane its cluster references.
pub async fn azure_managed_cluster_to_control_plane(ctx: &Context, source: &DynamicObject) -> Vec<Request> {
    const MAPPER: &str = "azure_managed_cluster_to_control_plane";
    if is_deleting(source) {
        debug!(name = %name_of(source), "AzureManagedCluster has a deletion timestamp, skipping mapping");
        return Vec::new();
    }
    let Some(cluster) = owner_cluster(ctx, source).await else {
        return Vec::new();
    };

    let requests = cluster
        .spec
        .control_plane_ref
        .as_ref()
        .filter(|r| r.name.as_deref().is_some_and(|n| !n.is_empty()))
        .map(|r| {
            request(
                &ResourceKind::azure_managed_control_plane(),
                reference_namespace(r, namespace_of(source)),
                r.name.as_deref().unwrap_or_default(),
            )
        })
        .into_iter()
        .collect();
    finish(MAPPER, requests)
}

/// `AzureManagedControlPlane` to the infrastructure cluster its cluster references.
pub async fn azure_managed_control_plane_to_cluster(ctx: &Context, source: &DynamicObject) -> Vec<Request> {
    const MAPPER: &str = "azure_managed_control_plane_to_cluster";
    if is_deleting(source) {
        debug!(
            name = %name_of(source),
            "AzureManagedControlPlane has a deletion timestamp, skipping mapping"
        );
        return Vec::new();
    }
    let Some(cluster) = owner_cluster(ctx, source).await else {
        return Vec::new();
    };

    let requests = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .filter(|r| r.name.as_deref().is_some_and(|n| !n.is_empty()))
        .map(|r| {
            request(
                &ResourceKind::azure_managed_cluster(),
                reference_namespace(r, namespace_of(source)),
                r.name.as_deref().unwrap_or_default(),
            )
        })
        .into_iter()
        .collect();
    finish(MAPPER, requests)
}

/// `MachinePool` to the `AzureManagedControlPlane` of its cluster, for
/// system-mode pools only.
///
/// When the pool's mode cannot be determined (the control plane or the
/// infrastructure pool cannot be fetched, or the infrastructure reference is
/// malformed) the control plane is requested anyway.
pub async fn machine_pool_to_control_plane(ctx: &Context, machine_pool: &DynamicObject) -> Vec<Request> {
    const MAPPER: &str = "machine_pool_to_control_plane";
    if is_deleting(machine_pool) {
        debug!(name = %name_of(machine_pool), "MachinePool has a deletion timestamp, skipping mapping");
        return Vec::new();
    }
    let Ok(pool) = from_dynamic::<MachinePool>(machine_pool) else {
        debug!(name = %name_of(machine_pool), "Object is not a MachinePool, skipping mapping");
        return Vec::new();
    };
    let namespace = namespace_of(machine_pool);
    let op = ctx.mapping_scope();

    let cluster: Cluster = match ctx
        .store
        .get(&op, &ResourceKind::cluster(), namespace, &pool.spec.cluster_name)
        .await
        .and_then(|obj| from_dynamic(&obj))
    {
        Ok(cluster) => cluster,
        Err(e) => {
            warn!(name = %name_of(machine_pool), error = %e, "Failed to get the owning cluster");
            return Vec::new();
        }
    };

    let Some(control_plane_ref) = cluster
        .spec
        .control_plane_ref
        .as_ref()
        .filter(|r| r.name.as_deref().is_some_and(|n| !n.is_empty()))
    else {
        debug!(name = %name_of(machine_pool), "Control plane ref not found");
        return Vec::new();
    };
    let control_plane_kind = ResourceKind::azure_managed_control_plane();
    if reference_group_kind(control_plane_ref).as_ref() != Some(&control_plane_kind.group_kind()) {
        return Vec::new();
    }

    let control_plane_namespace = reference_namespace(control_plane_ref, namespace);
    let control_plane_name = control_plane_ref.name.as_deref().unwrap_or_default();
    let control_plane_request = vec![request(
        &control_plane_kind,
        control_plane_namespace,
        control_plane_name,
    )];

    if let Err(e) = ctx
        .store
        .get(&op, &control_plane_kind, control_plane_namespace, control_plane_name)
        .await
    {
        warn!(name = %control_plane_name, error = %e, "Failed to fetch the control plane, mapping anyway");
        return finish(MAPPER, control_plane_request);
    }

    let infra_ref = &pool.spec.template.spec.infrastructure_ref;
    let Ok(infra_gv) = parse_group_version(infra_ref.api_version.as_deref().unwrap_or_default())
    else {
        warn!(name = %name_of(machine_pool), "Failed to parse group version, mapping anyway");
        return finish(MAPPER, control_plane_request);
    };
    let kind_matches = infra_ref.kind.as_deref() == Some(KIND_AZURE_MANAGED_MACHINE_POOL);
    let group_matches = infra_gv.group == INFRA_GROUP;

    let infra_pool = match ctx
        .store
        .get(
            &op,
            &ResourceKind::azure_managed_machine_pool(),
            reference_namespace(infra_ref, namespace),
            infra_ref.name.as_deref().unwrap_or_default(),
        )
        .await
        .and_then(|obj| from_dynamic::<AzureManagedMachinePool>(&obj))
    {
        Ok(infra_pool) => infra_pool,
        Err(e) => {
            warn!(name = %name_of(machine_pool), error = %e, "Failed to fetch the managed machine pool, mapping anyway");
            return finish(MAPPER, control_plane_request);
        }
    };

    if group_matches && kind_matches && infra_pool.spec.mode == NODE_POOL_MODE_SYSTEM {
        finish(MAPPER, control_plane_request)
    } else {
        finish(MAPPER, Vec::new())
    }
}

#[cfg(test)]
#[path = "mappers_tests.rs"]
mod mappers_tests;
