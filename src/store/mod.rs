// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction.
//!
//! Every read and write the toolkit performs goes through [`ObjectStore`], so
//! the ownership resolver, secret reconciler and adoption orchestrator can be
//! driven by the Kubernetes API ([`KubeStore`]) in production and by an
//! in-memory map ([`MemoryStore`]) in tests.
//!
//! Stores never cache and never retry. Retrying is the work queue's job.
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_adopt::context::OpContext;
//! use capz_adopt::kinds::ResourceKind;
//! use capz_adopt::store::{get_optional, MemoryStore};
//!
//! # async fn example() -> Result<(), capz_adopt::errors::StoreError> {
//! let store = MemoryStore::new();
//! let ctx = OpContext::new();
//! let secret = get_optional(&store, &ctx, &ResourceKind::secret(), "ns1", "cfg").await?;
//! assert!(secret.is_none());
//! # Ok(())
//! # }
//! ```

pub mod kubernetes;
pub mod memory;

pub use self::kubernetes::KubeStore;
pub use self::memory::{CallCounts, MemoryStore};

use crate::context::OpContext;
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Label selector used by [`ObjectStore::list`]: every pair must match exactly.
pub type LabelSelector = BTreeMap<String, String>;

/// Typed access to namespaced and cluster-scoped resources.
///
/// All calls are bound to an [`OpContext`]; a cancelled or expired context
/// yields [`StoreError::Cancelled`] or [`StoreError::TimedOut`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object.
    ///
    /// `namespace` is ignored for cluster-scoped kinds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object does not exist.
    async fn get(
        &self,
        ctx: &OpContext,
        kind: &ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError>;

    /// List objects whose labels contain every pair in `selector`.
    ///
    /// `namespace = None` lists across all namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    async fn list(
        &self,
        ctx: &OpContext,
        kind: &ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create an object. The kind is taken from the object's type metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if an object with the same name exists.
    async fn create(&self, ctx: &OpContext, obj: &DynamicObject)
        -> Result<DynamicObject, StoreError>;

    /// Persist the difference between `baseline` (as read) and `obj` (as desired).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the object changed since `baseline`
    /// was read, or [`StoreError::NotFound`] if it no longer exists.
    async fn patch(
        &self,
        ctx: &OpContext,
        obj: &DynamicObject,
        baseline: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;
}

/// Fetch an object, mapping `NotFound` to `None`.
///
/// # Errors
///
/// Returns every store error other than `NotFound`.
pub async fn get_optional(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    kind: &ResourceKind,
    namespace: &str,
    name: &str,
) -> Result<Option<DynamicObject>, StoreError> {
    match store.get(ctx, kind, namespace, name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create an object, treating `AlreadyExists` as success.
///
/// Returns `true` if this call created the object.
///
/// # Errors
///
/// Returns every store error other than `AlreadyExists`.
pub async fn create_idempotent(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    obj: &DynamicObject,
) -> Result<bool, StoreError> {
    match store.create(ctx, obj).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_already_exists() => {
            debug!(
                namespace = ?obj.metadata.namespace,
                name = ?obj.metadata.name,
                "Object already exists, treating create as success"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Compute an RFC 7386 JSON merge patch that turns `baseline` into `desired`.
///
/// Keys missing from `desired` become `null`; nested objects are diffed
/// recursively; arrays and scalars are replaced whole.
#[must_use]
pub fn merge_patch(baseline: &Value, desired: &Value) -> Value {
    match (baseline, desired) {
        (Value::Object(base), Value::Object(want)) => {
            let mut patch = Map::new();
            for (key, want_value) in want {
                match base.get(key) {
                    Some(base_value) if base_value == want_value => {}
                    Some(base_value @ Value::Object(_)) if want_value.is_object() => {
                        patch.insert(key.clone(), merge_patch(base_value, want_value));
                    }
                    _ => {
                        patch.insert(key.clone(), want_value.clone());
                    }
                }
            }
            for key in base.keys() {
                if !want.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => desired.clone(),
    }
}

/// Apply an RFC 7386 JSON merge patch to `target` in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                apply_merge_patch(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

/// Whether a merge patch changes nothing.
#[must_use]
pub fn is_empty_patch(patch: &Value) -> bool {
    patch.as_object().is_some_and(Map::is_empty)
}

/// Describe the kind of an object handed to `create` or `patch`.
pub(crate) fn kind_of(obj: &DynamicObject) -> Result<ResourceKind, StoreError> {
    ResourceKind::of(obj).map_err(|e| StoreError::InvalidObject(e.to_string()))
}

/// Name of an object handed to `create` or `patch`.
pub(crate) fn name_of(obj: &DynamicObject) -> Result<&str, StoreError> {
    obj.metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::InvalidObject("object has no metadata.name".to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
