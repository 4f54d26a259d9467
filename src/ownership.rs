// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership resolution over owner references.
//!
//! Owner references are compared by API group and kind, never by version, so
//! an object written against `v1beta1` still resolves once its owner is
//! served as `v1beta2`. A malformed `apiVersion` on one reference never
//! aborts a scan: that reference simply does not match.
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_adopt::context::OpContext;
//! use capz_adopt::kinds::{GroupKind, ResourceKind};
//! use capz_adopt::ownership::resolve_owner_chain;
//! use capz_adopt::store::{MemoryStore, ObjectStore};
//!
//! # async fn example(store: MemoryStore) -> capz_adopt::errors::Result<()> {
//! let ctx = OpContext::new();
//! let pool = store
//!     .get(&ctx, &ResourceKind::aks_agent_pool(), "ns1", "pool-a")
//!     .await?;
//!
//! // AgentPool -> ManagedCluster -> AzureASOManagedControlPlane
//! let control_plane = resolve_owner_chain(
//!     &store,
//!     &ctx,
//!     &pool,
//!     &[
//!         ResourceKind::aks_managed_cluster().group_kind(),
//!         ResourceKind::aso_managed_control_plane().group_kind(),
//!     ],
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::constants::{CAPI_GROUP, KIND_CLUSTER};
use crate::context::OpContext;
use crate::errors::{ResolutionError, Result, StoreError};
use crate::kinds::{parse_group_version, GroupKind, ResourceKind};
use crate::store::ObjectStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use tracing::debug;

/// Whether two owner references point at the same object.
///
/// True when API groups (not versions), kinds and names are equal. A
/// malformed `apiVersion` on either side yields `false`.
#[must_use]
pub fn refer_same_object(a: &OwnerReference, b: &OwnerReference) -> bool {
    let (Ok(a_gv), Ok(b_gv)) = (
        parse_group_version(&a.api_version),
        parse_group_version(&b.api_version),
    ) else {
        return false;
    };

    a_gv.group == b_gv.group && a.kind == b.kind && a.name == b.name
}

/// The first owner reference whose group and kind equal `hop`.
///
/// Kind comparison is case-sensitive. References with a malformed
/// `apiVersion` are skipped.
#[must_use]
pub fn find_owner_ref<'a>(refs: &'a [OwnerReference], hop: &GroupKind) -> Option<&'a OwnerReference> {
    refs.iter().find(|r| {
        r.kind == hop.kind
            && parse_group_version(&r.api_version).is_ok_and(|gv| gv.group == hop.group)
    })
}

/// Walk owner references from `start` through each `(group, kind)` hop and
/// return the final owner.
///
/// Each owner is fetched from the store in the namespace of the object that
/// references it. An empty `hops` slice returns `start` unchanged.
///
/// # Errors
///
/// Returns [`ResolutionError::OwnerNotFound`] naming the first hop with no
/// matching reference, or the store error from fetching an owner.
pub async fn resolve_owner_chain(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    start: &DynamicObject,
    hops: &[GroupKind],
) -> Result<DynamicObject> {
    let mut current = start.clone();

    for hop in hops {
        let namespace = current.metadata.namespace.clone().unwrap_or_default();
        let refs = current.metadata.owner_references.as_deref().unwrap_or_default();

        let Some(owner_ref) = find_owner_ref(refs, hop) else {
            return Err(ResolutionError::OwnerNotFound {
                hop: hop.clone(),
                kind: current
                    .types
                    .as_ref()
                    .map(|t| t.kind.clone())
                    .unwrap_or_default(),
                namespace,
                name: current.metadata.name.clone().unwrap_or_default(),
            }
            .into());
        };

        let kind = ResourceKind::from_api_version(&owner_ref.api_version, &owner_ref.kind)?;
        debug!(
            hop = %hop,
            namespace = %namespace,
            name = %owner_ref.name,
            "Following owner reference"
        );
        current = store.get(ctx, &kind, &namespace, &owner_ref.name).await?;
    }

    Ok(current)
}

/// Name of the Cluster API `Cluster` owning an object.
///
/// Scans owner references in order; the first `Cluster` reference in the
/// Cluster API group wins. A `Cluster` reference with a malformed
/// `apiVersion` ends the scan with `None`.
#[must_use]
pub fn owner_cluster_name(meta: &ObjectMeta) -> Option<String> {
    for r in meta.owner_references.as_deref().unwrap_or_default() {
        if r.kind != KIND_CLUSTER {
            continue;
        }
        let gv = parse_group_version(&r.api_version).ok()?;
        if gv.group == CAPI_GROUP {
            return Some(r.name.clone());
        }
    }
    None
}

/// Fetch the owner of `obj` whose group is `group` and kind is `kind`.
///
/// Returns `Ok(None)` when no such owner reference exists.
///
/// # Errors
///
/// Returns [`ResolutionError::MalformedApiVersion`] if a reference of the
/// requested kind carries a malformed `apiVersion`, or the store error from
/// fetching the owner (including `NotFound`).
pub async fn owner_of(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    obj: &DynamicObject,
    group: &str,
    kind: &str,
) -> Result<Option<DynamicObject>> {
    let namespace = obj.metadata.namespace.as_deref().unwrap_or_default();

    for r in obj.metadata.owner_references.as_deref().unwrap_or_default() {
        if r.kind != kind {
            continue;
        }
        let gv = parse_group_version(&r.api_version)?;
        if gv.group == group {
            let owner_kind = ResourceKind::new(&gv.group, &gv.version, kind);
            let owner = store.get(ctx, &owner_kind, namespace, &r.name).await?;
            return Ok(Some(owner));
        }
    }
    Ok(None)
}

/// Build an owner reference pointing at `owner`.
///
/// # Errors
///
/// Returns [`StoreError::InvalidObject`] if the owner has no type metadata
/// or no name.
pub fn owner_reference_to(owner: &DynamicObject) -> Result<OwnerReference, StoreError> {
    let types = owner
        .types
        .as_ref()
        .ok_or_else(|| StoreError::InvalidObject("owner has no apiVersion/kind".to_string()))?;
    let name = owner
        .metadata
        .name
        .clone()
        .ok_or_else(|| StoreError::InvalidObject("owner has no metadata.name".to_string()))?;

    Ok(OwnerReference {
        api_version: types.api_version.clone(),
        kind: types.kind.clone(),
        name,
        uid: owner.metadata.uid.clone().unwrap_or_default(),
        ..OwnerReference::default()
    })
}

/// Whether `obj` already lists an owner of the given group and kind.
#[must_use]
pub fn has_owner_of_kind(meta: &ObjectMeta, hop: &GroupKind) -> bool {
    find_owner_ref(meta.owner_references.as_deref().unwrap_or_default(), hop).is_some()
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
