// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API through `kube`.
//!
//! Every call builds an `Api<DynamicObject>` for the requested kind, so one
//! store serves core, Cluster API, Azure infrastructure and ASO resources
//! alike. HTTP failures are mapped onto [`StoreError`]:
//!
//! - 404 becomes [`StoreError::NotFound`]
//! - 409 with reason `AlreadyExists` becomes [`StoreError::AlreadyExists`]
//! - any other 409 becomes [`StoreError::Conflict`]
//! - everything else stays [`StoreError::Api`]

use super::{is_empty_patch, kind_of, merge_patch, name_of, LabelSelector, ObjectStore};
use crate::constants::FIELD_MANAGER;
use crate::context::OpContext;
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use async_trait::async_trait;
use kube::api::{DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::{json, Value};
use tracing::debug;

/// Kubernetes-backed object store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a `kube` client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: &ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = kind.api_resource();
        match namespace {
            Some(ns) if kind.namespaced => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }
}

/// Translate a `kube` error for one object into a [`StoreError`].
pub(crate) fn map_kube_error(
    err: kube::Error,
    kind: &ResourceKind,
    namespace: &str,
    name: &str,
) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: kind.kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: kind.kind.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: kind.kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: ae.message,
        },
        other => StoreError::Api(other),
    }
}

/// Render an equality selector as `k1=v1,k2=v2`.
pub(crate) fn selector_string(selector: &LabelSelector) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        ctx: &OpContext,
        kind: &ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(kind, Some(namespace));
        debug!(kind = %kind, namespace = %namespace, name = %name, "Getting object");
        ctx.run(async {
            api.get(name)
                .await
                .map_err(|e| map_kube_error(e, kind, namespace, name))
        })
        .await
    }

    async fn list(
        &self,
        ctx: &OpContext,
        kind: &ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let api = self.api(kind, namespace);
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector_string(selector));
        }
        debug!(kind = %kind, namespace = ?namespace, selector = ?params.label_selector, "Listing objects");
        ctx.run(async {
            let list = api.list(&params).await.map_err(|e| {
                map_kube_error(e, kind, namespace.unwrap_or_default(), "")
            })?;
            Ok(list.items)
        })
        .await
    }

    async fn create(
        &self,
        ctx: &OpContext,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let kind = kind_of(obj)?;
        let name = name_of(obj)?;
        let namespace = obj.metadata.namespace.clone().unwrap_or_default();
        let api = self.api(&kind, Some(&namespace));
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };

        debug!(kind = %kind, namespace = %namespace, name = %name, "Creating object");
        ctx.run(async {
            api.create(&params, obj)
                .await
                .map_err(|e| map_kube_error(e, &kind, &namespace, name))
        })
        .await
    }

    async fn patch(
        &self,
        ctx: &OpContext,
        obj: &DynamicObject,
        baseline: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let kind = kind_of(obj)?;
        let name = name_of(obj)?;
        let namespace = obj.metadata.namespace.clone().unwrap_or_default();
        let api = self.api(&kind, Some(&namespace));

        let mut diff = merge_patch(&serde_json::to_value(baseline)?, &serde_json::to_value(obj)?);
        if is_empty_patch(&diff) {
            debug!(kind = %kind, namespace = %namespace, name = %name, "Patch is empty, skipping");
            return ctx
                .run(async {
                    api.get(name)
                        .await
                        .map_err(|e| map_kube_error(e, &kind, &namespace, name))
                })
                .await;
        }
        with_resource_version(&mut diff, baseline.metadata.resource_version.as_deref());

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };

        debug!(kind = %kind, namespace = %namespace, name = %name, "Patching object");
        ctx.run(async {
            api.patch(name, &params, &Patch::Merge(&diff))
                .await
                .map_err(|e| map_kube_error(e, &kind, &namespace, name))
        })
        .await
    }
}

/// Pin a merge patch to the `resourceVersion` it was computed against, so the
/// API server rejects it with 409 if the object changed in between.
fn with_resource_version(patch: &mut Value, resource_version: Option<&str>) {
    let (Some(rv), Value::Object(map)) = (resource_version, patch) else {
        return;
    };
    let metadata = map.entry("metadata").or_insert_with(|| json!({}));
    if let Value::Object(meta) = metadata {
        meta.insert("resourceVersion".to_string(), json!(rv));
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
