// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generated secret reconciliation.
//!
//! A generated secret is created when absent and kept fresh afterwards, but
//! only while it carries the owner-marker label `<clusterName>: owned`. A
//! secret without that label was provided by the user and is never written.
//!
//! Freshness has two parts, checked independently:
//!
//! - the secret lists the expected owner reference (compared by group, kind
//!   and name, never by version)
//! - the secret's data is byte-for-byte equal to the desired data
//!
//! When either part is stale, one patch brings both up to date. The secret is
//! never deleted and no other metadata is touched.

use crate::context::OpContext;
use crate::errors::Result;
use crate::kinds::ResourceKind;
use crate::labels::RESOURCE_LIFECYCLE_OWNED;
use crate::metrics;
use crate::ownership::refer_same_object;
use crate::resources::{from_dynamic, to_dynamic};
use crate::store::{create_idempotent, get_optional, ObjectStore};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use std::fmt;
use tracing::{debug, info};

/// What one call to [`reconcile_secret`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretOutcome {
    /// The secret did not exist and was created (or appeared concurrently)
    Created,
    /// The existing secret lacks the owner marker and was left alone
    SkippedUnowned,
    /// The existing secret already had the owner reference and data
    Unchanged,
    /// The existing secret was patched with the owner reference and/or data
    Patched,
}

impl SecretOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SkippedUnowned => "skipped_unowned",
            Self::Unchanged => "unchanged",
            Self::Patched => "patched",
        }
    }
}

impl fmt::Display for SecretOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create or refresh the generated secret `desired`.
///
/// `owner_marker_key` is the label key (the cluster name) whose value must be
/// `owned` before an existing secret may be written.
///
/// # Errors
///
/// Returns the store error from the get, create or patch. A create that
/// fails with `AlreadyExists` is treated as success.
pub async fn reconcile_secret(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    owner: &OwnerReference,
    desired: &Secret,
    owner_marker_key: &str,
) -> Result<SecretOutcome> {
    let namespace = desired.metadata.namespace.clone().unwrap_or_default();
    let name = desired.metadata.name.clone().unwrap_or_default();

    let outcome = match get_optional(store, ctx, &ResourceKind::secret(), &namespace, &name).await?
    {
        None => {
            let created = create_idempotent(store, ctx, &to_dynamic(desired)?).await?;
            if created {
                info!(namespace = %namespace, name = %name, "Created generated secret");
            }
            SecretOutcome::Created
        }
        Some(baseline) => {
            refresh_owned_secret(store, ctx, owner, desired, owner_marker_key, baseline).await?
        }
    };

    metrics::record_secret_write(outcome.as_str());
    Ok(outcome)
}

async fn refresh_owned_secret(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    owner: &OwnerReference,
    desired: &Secret,
    owner_marker_key: &str,
    baseline: DynamicObject,
) -> Result<SecretOutcome> {
    let existing: Secret = from_dynamic(&baseline)?;
    let namespace = existing.metadata.namespace.as_deref().unwrap_or_default();
    let name = existing.metadata.name.as_deref().unwrap_or_default();

    let owned = existing
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(owner_marker_key))
        .is_some_and(|value| value == RESOURCE_LIFECYCLE_OWNED);
    if !owned {
        debug!(
            namespace = %namespace,
            name = %name,
            "Secret is user provided, leaving it untouched"
        );
        return Ok(SecretOutcome::SkippedUnowned);
    }

    let has_owner = existing
        .metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| refer_same_object(r, owner));
    let has_data = existing.data.clone().unwrap_or_default()
        == desired.data.clone().unwrap_or_default();

    if has_owner && has_data {
        return Ok(SecretOutcome::Unchanged);
    }

    let mut updated = baseline.clone();
    if !has_owner {
        updated
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(owner.clone());
    }
    if !has_data {
        updated.data["data"] = serde_json::to_value(&desired.data)?;
    }

    store.patch(ctx, &updated, &baseline).await?;
    info!(
        namespace = %namespace,
        name = %name,
        owner_added = !has_owner,
        data_replaced = !has_data,
        "Patched generated secret"
    );
    Ok(SecretOutcome::Patched)
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod secret_tests;
