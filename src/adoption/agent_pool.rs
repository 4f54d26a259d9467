// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adoption of an ASO `ManagedClustersAgentPool`.
//!
//! The agent pool must belong to a `ManagedCluster` that has itself been
//! adopted, so the owner chain ends at an `AzureASOManagedControlPlane`. The
//! pool is wrapped in an `AzureASOManagedMachinePool`, and a `MachinePool`
//! referencing that wrapper is created after it.

use super::{ensure_native, filter_for_template, AdoptionRequest};
use crate::constants::{INFRA_ALPHA_API_VERSION, KIND_ASO_MANAGED_MACHINE_POOL};
use crate::context::OpContext;
use crate::crd::{
    AzureASOManagedMachinePool, AzureASOManagedMachinePoolSpec, Bootstrap, MachinePool,
    MachinePoolSpec, MachineSpec, MachineTemplateSpec,
};
use crate::errors::Result;
use crate::labels::{CLUSTER_NAME_LABEL, REPLICAS_MANAGED_BY_AKS, REPLICAS_MANAGED_BY_ANNOTATION};
use crate::ownership::{owner_cluster_name, resolve_owner_chain};
use crate::resources::{nested, nested_bool, to_dynamic};
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use tracing::debug;

/// Cluster name for objects adopted under `control_plane`.
///
/// Uses the control plane's `cluster.x-k8s.io/cluster-name` label, then its
/// owning `Cluster`, then the control plane's own name.
#[must_use]
pub fn cluster_name_for(control_plane: &DynamicObject) -> String {
    control_plane
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(CLUSTER_NAME_LABEL))
        .filter(|name| !name.is_empty())
        .cloned()
        .or_else(|| owner_cluster_name(&control_plane.metadata))
        .unwrap_or_else(|| control_plane.metadata.name.clone().unwrap_or_default())
}

/// Desired replica count of an agent pool; `None` when unset or out of range.
fn replicas_of(agent_pool: &DynamicObject) -> Option<i32> {
    nested(agent_pool, &["spec", "count"])
        .and_then(serde_json::Value::as_i64)
        .and_then(|count| i32::try_from(count).ok())
}

/// Construct the native objects for an annotated agent pool.
///
/// Returns the objects this call created.
///
/// # Errors
///
/// Returns `OwnerNotFound` when the pool's `ManagedCluster` or that cluster's
/// `AzureASOManagedControlPlane` cannot be found through owner references,
/// or the store error from any fetch or create.
pub async fn adopt_agent_pool(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    request: &AdoptionRequest,
) -> Result<Vec<String>> {
    let namespace = request.namespace();
    let name = request.name();
    let mut created = Vec::new();

    let control_plane = resolve_owner_chain(store, ctx, &request.source, &request.owner_chain).await?;
    let cluster_name = cluster_name_for(&control_plane);
    debug!(
        namespace = %namespace,
        name = %name,
        cluster = %cluster_name,
        "Resolved cluster for agent pool"
    );

    let mut aso_pool = AzureASOManagedMachinePool::new(
        name,
        AzureASOManagedMachinePoolSpec {
            resources: vec![filter_for_template(&request.source)?],
        },
    );
    aso_pool.metadata.namespace = Some(namespace.to_string());
    aso_pool.metadata.labels = Some(BTreeMap::from([(
        CLUSTER_NAME_LABEL.to_string(),
        cluster_name.clone(),
    )]));
    ensure_native(store, ctx, &to_dynamic(&aso_pool)?, &mut created).await?;

    let mut machine_pool = MachinePool::new(
        name,
        MachinePoolSpec {
            cluster_name: cluster_name.clone(),
            replicas: replicas_of(&request.source),
            template: MachineTemplateSpec {
                spec: MachineSpec {
                    cluster_name,
                    bootstrap: Bootstrap {
                        config_ref: None,
                        data_secret_name: Some(String::new()),
                    },
                    infrastructure_ref: ObjectReference {
                        api_version: Some(INFRA_ALPHA_API_VERSION.to_string()),
                        kind: Some(KIND_ASO_MANAGED_MACHINE_POOL.to_string()),
                        name: Some(name.to_string()),
                        ..ObjectReference::default()
                    },
                    version: None,
                },
            },
        },
    );
    machine_pool.metadata.namespace = Some(namespace.to_string());
    if nested_bool(&request.source, &["spec", "enableAutoScaling"]).unwrap_or(false) {
        machine_pool.metadata.annotations = Some(BTreeMap::from([(
            REPLICAS_MANAGED_BY_ANNOTATION.to_string(),
            REPLICAS_MANAGED_BY_AKS.to_string(),
        )]));
    }
    ensure_native(store, ctx, &to_dynamic(&machine_pool)?, &mut created).await?;

    Ok(created)
}

#[cfg(test)]
#[path = "agent_pool_tests.rs"]
mod agent_pool_tests;
