// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversions between typed and dynamic objects, and create-or-get helpers.
//!
//! The store speaks [`DynamicObject`] so that one implementation covers every
//! kind. Code that builds native resources works with the typed structs in
//! [`crate::crd`] and converts at the boundary with [`to_dynamic`] and
//! [`from_dynamic`].
//!
//! # Example
//!
//! ```rust
//! use capz_adopt::kinds::ResourceKind;
//! use capz_adopt::resources::new_object;
//! use serde_json::json;
//!
//! let pool = new_object(
//!     &ResourceKind::aks_agent_pool(),
//!     "ns1",
//!     "pool-a",
//!     json!({ "spec": { "count": 3 } }),
//! );
//! assert_eq!(pool.metadata.name.as_deref(), Some("pool-a"));
//! assert_eq!(pool.data["spec"]["count"], 3);
//! ```

use crate::context::OpContext;
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use crate::metrics;
use crate::store::ObjectStore;
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// Build a dynamic object of `kind` with the given payload.
///
/// `data` holds every top-level field other than `apiVersion`, `kind` and
/// `metadata` (typically `spec`). `namespace` is ignored for cluster-scoped kinds.
#[must_use]
pub fn new_object(kind: &ResourceKind, namespace: &str, name: &str, data: Value) -> DynamicObject {
    let obj = DynamicObject::new(name, &kind.api_resource()).data(data);
    if kind.namespaced {
        obj.within(namespace)
    } else {
        obj
    }
}

/// Convert a typed resource into a dynamic object.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the value does not serialize to
/// a Kubernetes object.
pub fn to_dynamic<K: Serialize>(resource: &K) -> Result<DynamicObject, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(resource)?)?)
}

/// Convert a dynamic object into a typed resource.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the payload does not match `K`.
pub fn from_dynamic<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Read a string at `path` inside the object's payload.
#[must_use]
pub fn nested_str<'a>(obj: &'a DynamicObject, path: &[&str]) -> Option<&'a str> {
    nested(obj, path).and_then(Value::as_str)
}

/// Read a bool at `path` inside the object's payload.
#[must_use]
pub fn nested_bool(obj: &DynamicObject, path: &[&str]) -> Option<bool> {
    nested(obj, path).and_then(Value::as_bool)
}

/// Read any value at `path` inside the object's payload.
#[must_use]
pub fn nested<'a>(obj: &'a DynamicObject, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(&obj.data, |value, key| value.get(*key))
}

/// Create `obj`, or fetch the existing object when it already exists.
///
/// Returns the stored object and whether this call created it. Callers that
/// need server-assigned fields (such as `uid` for owner references) use this
/// instead of a bare idempotent create.
///
/// # Errors
///
/// Returns any store error other than `AlreadyExists` from the create, or
/// the error from the follow-up get.
pub async fn create_or_get(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    obj: &DynamicObject,
) -> Result<(DynamicObject, bool), StoreError> {
    let kind = ResourceKind::of(obj).map_err(|e| StoreError::InvalidObject(e.to_string()))?;
    let namespace = obj.metadata.namespace.clone().unwrap_or_default();
    let name = obj.metadata.name.clone().unwrap_or_default();

    match store.create(ctx, obj).await {
        Ok(created) => {
            info!(kind = %kind, namespace = %namespace, name = %name, "Created resource");
            metrics::record_resource_created(&kind.kind);
            Ok((created, true))
        }
        Err(e) if e.is_already_exists() => {
            debug!(
                kind = %kind,
                namespace = %namespace,
                name = %name,
                "Resource already exists, fetching it"
            );
            let existing = store.get(ctx, &kind, &namespace, &name).await?;
            Ok((existing, false))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
