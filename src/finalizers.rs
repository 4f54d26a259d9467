// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster identity finalizers.
//!
//! An `AzureClusterIdentity` is shared by many clusters, so each cluster that
//! uses it registers its own finalizer on the identity. The key is derived
//! from the cluster's namespace and name:
//!
//! ```text
//! <prefix>/<hex(sha224("<namespace>-<name>"))>
//! ```
//!
//! The hashed segment is always 56 characters, which keeps keys valid no
//! matter how long the namespace and name are. Older releases wrote the raw
//! `<prefix>/<namespace>-<name>` form; that deprecated key is only ever
//! removed, never written.
//!
//! The in-place helpers ([`ensure_finalizer`], [`remove_finalizer`]) report
//! whether they changed anything so callers persist only real changes.

use crate::context::OpContext;
use crate::crd::{AllowedNamespaces, AzureClusterIdentity};
use crate::errors::{Error, Result};
use crate::kinds::ResourceKind;
use crate::metrics;
use crate::resources::from_dynamic;
use crate::selector;
use crate::store::{get_optional, ObjectStore};
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use sha2::{Digest, Sha224};
use tracing::{debug, info, warn};

/// The hashed finalizer key a cluster registers on its identity.
#[must_use]
pub fn finalizer_key(prefix: &str, namespace: &str, name: &str) -> String {
    let digest = Sha224::digest(format!("{namespace}-{name}").as_bytes());
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}/{hash}")
}

/// The raw finalizer key written by older releases.
#[must_use]
pub fn deprecated_finalizer_key(prefix: &str, namespace: &str, name: &str) -> String {
    format!("{prefix}/{namespace}-{name}")
}

/// Remove the deprecated key and add the hashed key.
///
/// Returns `true` if the finalizer list changed.
pub fn ensure_finalizer(meta: &mut ObjectMeta, prefix: &str, namespace: &str, name: &str) -> bool {
    let deprecated = deprecated_finalizer_key(prefix, namespace, name);
    let key = finalizer_key(prefix, namespace, name);

    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
    let before = finalizers.len();
    finalizers.retain(|f| *f != deprecated);
    let mut changed = finalizers.len() != before;

    if !finalizers.contains(&key) {
        finalizers.push(key);
        changed = true;
    }
    changed
}

/// Remove the hashed key.
///
/// Returns `true` if the finalizer list changed.
pub fn remove_finalizer(meta: &mut ObjectMeta, prefix: &str, namespace: &str, name: &str) -> bool {
    let key = finalizer_key(prefix, namespace, name);
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };

    let before = finalizers.len();
    finalizers.retain(|f| *f != key);
    finalizers.len() != before
}

/// Whether a cluster in `namespace` may use an identity with these allowed namespaces.
///
/// - absent: no namespace is allowed
/// - empty (`{}`): every namespace is allowed
/// - `list`: the namespace is allowed when named
/// - `selector`: the namespace is allowed when its labels match; an empty
///   selector matches nothing
///
/// A namespace that cannot be read is not allowed.
pub async fn is_cluster_namespace_allowed(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    allowed: Option<&AllowedNamespaces>,
    namespace: &str,
) -> bool {
    let Some(allowed) = allowed else {
        return false;
    };
    if allowed.namespace_list.is_none() && allowed.selector.is_none() {
        return true;
    }
    if allowed
        .namespace_list
        .as_ref()
        .is_some_and(|list| list.iter().any(|ns| ns == namespace))
    {
        return true;
    }

    let Some(label_selector) = allowed.selector.as_ref() else {
        return false;
    };
    if selector::is_empty(label_selector) {
        return false;
    }

    match get_optional(store, ctx, &ResourceKind::namespace(), "", namespace).await {
        Ok(Some(ns)) => {
            let labels = ns.metadata.labels.unwrap_or_default();
            selector::matches(label_selector, &labels)
        }
        Ok(None) => false,
        Err(e) => {
            debug!(namespace = %namespace, error = %e, "Failed to read namespace for identity selector");
            false
        }
    }
}

async fn get_identity(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    object_namespace: &str,
    identity_ref: &ObjectReference,
) -> Result<DynamicObject> {
    let namespace = identity_ref
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(object_namespace);
    let name = identity_ref.name.as_deref().unwrap_or_default();

    Ok(store
        .get(ctx, &ResourceKind::azure_cluster_identity(), namespace, name)
        .await?)
}

/// Register `object`'s finalizer on the identity it references.
///
/// Fetches the identity (the reference's namespace defaults to the object's),
/// refuses namespaces the identity does not allow, then migrates the
/// deprecated key and adds the hashed key. The identity is patched only when
/// its finalizers changed. Returns whether a patch was issued.
///
/// # Errors
///
/// Returns [`Error::NamespaceNotAllowed`] if the identity does not allow the
/// object's namespace, or the store error from the fetch or patch.
pub async fn ensure_cluster_identity(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    object: &ObjectMeta,
    identity_ref: &ObjectReference,
    prefix: &str,
) -> Result<bool> {
    let namespace = object.namespace.as_deref().unwrap_or_default();
    let name = object.name.as_deref().unwrap_or_default();

    let baseline = get_identity(store, ctx, namespace, identity_ref).await?;
    let identity: AzureClusterIdentity = from_dynamic(&baseline)?;

    if !is_cluster_namespace_allowed(
        store,
        ctx,
        identity.spec.allowed_namespaces.as_ref(),
        namespace,
    )
    .await
    {
        warn!(
            identity = %identity.metadata.name.as_deref().unwrap_or_default(),
            namespace = %namespace,
            "Cluster namespace is not allowed by identity"
        );
        return Err(Error::NamespaceNotAllowed {
            identity: identity.metadata.name.clone().unwrap_or_default(),
            namespace: namespace.to_string(),
        });
    }

    let mut desired = baseline.clone();
    if !ensure_finalizer(&mut desired.metadata, prefix, namespace, name) {
        return Ok(false);
    }

    store.patch(ctx, &desired, &baseline).await?;
    metrics::record_finalizer_patch("added");
    info!(
        identity = %desired.metadata.name.as_deref().unwrap_or_default(),
        namespace = %namespace,
        name = %name,
        "Registered cluster finalizer on identity"
    );
    Ok(true)
}

/// Remove `object`'s finalizer from the identity it references.
///
/// Returns whether a patch was issued.
///
/// # Errors
///
/// Returns the store error from the fetch or patch.
pub async fn remove_cluster_identity_finalizer(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    object: &ObjectMeta,
    identity_ref: &ObjectReference,
    prefix: &str,
) -> Result<bool> {
    let namespace = object.namespace.as_deref().unwrap_or_default();
    let name = object.name.as_deref().unwrap_or_default();

    let baseline = get_identity(store, ctx, namespace, identity_ref).await?;
    let mut desired = baseline.clone();
    if !remove_finalizer(&mut desired.metadata, prefix, namespace, name) {
        return Ok(false);
    }

    store.patch(ctx, &desired, &baseline).await?;
    metrics::record_finalizer_patch("removed");
    info!(
        identity = %desired.metadata.name.as_deref().unwrap_or_default(),
        namespace = %namespace,
        name = %name,
        "Removed cluster finalizer from identity"
    );
    Ok(true)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
