// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adoption of an ASO `ManagedCluster`.
//!
//! Creates a Cluster API `Cluster` named after the AKS cluster, then the two
//! infrastructure wrappers it references, each owned by the `Cluster`:
//!
//! - `AzureASOManagedCluster` embedding the cluster's `ResourceGroup`
//! - `AzureASOManagedControlPlane` embedding the `ManagedCluster` itself

use super::{ensure_native, filter_for_template, AdoptionRequest};
use crate::constants::{INFRA_ALPHA_API_VERSION, KIND_ASO_MANAGED_CLUSTER, KIND_ASO_MANAGED_CONTROL_PLANE};
use crate::context::OpContext;
use crate::crd::{
    AzureASOManagedCluster, AzureASOManagedClusterSpec, AzureASOManagedControlPlane,
    AzureASOManagedControlPlaneSpec, Cluster, ClusterSpec,
};
use crate::errors::{ResolutionError, Result};
use crate::kinds::ResourceKind;
use crate::ownership::owner_reference_to;
use crate::resources::{nested_str, to_dynamic};
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::ObjectReference;
use tracing::debug;

fn wrapper_ref(kind: &str, name: &str) -> ObjectReference {
    ObjectReference {
        api_version: Some(INFRA_ALPHA_API_VERSION.to_string()),
        kind: Some(kind.to_string()),
        name: Some(name.to_string()),
        ..ObjectReference::default()
    }
}

/// Construct the native objects for an annotated `ManagedCluster`.
///
/// Returns the objects this call created.
///
/// # Errors
///
/// Returns [`ResolutionError::MissingField`] if the `ManagedCluster` names no
/// owning resource group, or the store error from any fetch or create.
pub async fn adopt_managed_cluster(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    request: &AdoptionRequest,
) -> Result<Vec<String>> {
    let namespace = request.namespace();
    let name = request.name();
    let mut created = Vec::new();

    let mut cluster = Cluster::new(
        name,
        ClusterSpec {
            infrastructure_ref: Some(wrapper_ref(KIND_ASO_MANAGED_CLUSTER, name)),
            control_plane_ref: Some(wrapper_ref(KIND_ASO_MANAGED_CONTROL_PLANE, name)),
            ..ClusterSpec::default()
        },
    );
    cluster.metadata.namespace = Some(namespace.to_string());
    let cluster = ensure_native(store, ctx, &to_dynamic(&cluster)?, &mut created).await?;
    let cluster_owner = owner_reference_to(&cluster)?;

    let resource_group_name = nested_str(&request.source, &["spec", "owner", "name"])
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ResolutionError::MissingField {
            kind: request.target.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            field: "spec.owner.name".to_string(),
        })?;
    debug!(namespace = %namespace, name = %resource_group_name, "Fetching owning resource group");
    let resource_group = store
        .get(ctx, &ResourceKind::resource_group(), namespace, resource_group_name)
        .await?;

    let mut aso_cluster = AzureASOManagedCluster::new(
        name,
        AzureASOManagedClusterSpec {
            resources: vec![filter_for_template(&resource_group)?],
        },
    );
    aso_cluster.metadata.namespace = Some(namespace.to_string());
    aso_cluster.metadata.owner_references = Some(vec![cluster_owner.clone()]);
    ensure_native(store, ctx, &to_dynamic(&aso_cluster)?, &mut created).await?;

    let mut aso_control_plane = AzureASOManagedControlPlane::new(
        name,
        AzureASOManagedControlPlaneSpec {
            resources: vec![filter_for_template(&request.source)?],
        },
    );
    aso_control_plane.metadata.namespace = Some(namespace.to_string());
    aso_control_plane.metadata.owner_references = Some(vec![cluster_owner]);
    ensure_native(store, ctx, &to_dynamic(&aso_control_plane)?, &mut created).await?;

    Ok(created)
}

#[cfg(test)]
#[path = "managed_cluster_tests.rs"]
mod managed_cluster_tests;
