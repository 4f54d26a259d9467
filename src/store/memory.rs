// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] used by tests and dry runs.
//!
//! Behaves like the API server where the toolkit depends on it: duplicate
//! creates fail with `AlreadyExists`, patches are merge patches checked
//! against `resourceVersion`, list selectors match labels exactly, and a
//! cancelled context aborts the call. Each operation is counted so tests can
//! assert that a no-op reconcile issued no writes.

use super::{apply_merge_patch, kind_of, merge_patch, name_of, LabelSelector, ObjectStore};
use crate::context::OpContext;
use crate::errors::StoreError;
use crate::kinds::ResourceKind;
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Objects are keyed by group, kind, namespace and name. The version is not
/// part of the key: the same object is reachable through every served version.
type ObjectKey = (String, String, String, String);

/// Snapshot of how many calls each store operation has received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `get` calls
    pub gets: usize,
    /// `list` calls
    pub lists: usize,
    /// `create` calls, including those that failed with `AlreadyExists`
    pub creates: usize,
    /// `patch` calls
    pub patches: usize,
}

impl CallCounts {
    /// Total number of write calls (`create` + `patch`).
    #[must_use]
    pub fn writes(&self) -> usize {
        self.creates + self.patches
    }
}

/// A thread-safe map of dynamic objects.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<ObjectKey, DynamicObject>>,
    resource_version: AtomicU64,
    gets: AtomicUsize,
    lists: AtomicUsize,
    creates: AtomicUsize,
    patches: AtomicUsize,
}

fn key_for(kind: &ResourceKind, namespace: &str, name: &str) -> ObjectKey {
    let namespace = if kind.namespaced { namespace } else { "" };
    (
        kind.group.clone(),
        kind.kind.clone(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn labels_match(obj: &DynamicObject, selector: &LabelSelector) -> bool {
    let labels = obj.metadata.labels.as_ref();
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<ObjectKey, DynamicObject>> {
        // A poisoned lock only means another test thread panicked mid-write;
        // the map itself is still usable.
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Seed an object without counting a call. Existing objects are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidObject`] if the object has no type
    /// metadata or no name.
    pub fn insert(&self, mut obj: DynamicObject) -> Result<(), StoreError> {
        let kind = kind_of(&obj)?;
        let name = name_of(&obj)?.to_string();
        let namespace = obj.metadata.namespace.clone().unwrap_or_default();

        obj.metadata.resource_version = Some(self.next_resource_version());
        if obj.metadata.uid.is_none() {
            obj.metadata.uid = Some(format!("uid-{}-{name}", kind.kind.to_lowercase()));
        }

        self.objects()
            .insert(key_for(&kind, &namespace, &name), obj);
        Ok(())
    }

    /// Read an object without counting a call.
    #[must_use]
    pub fn peek(&self, kind: &ResourceKind, namespace: &str, name: &str) -> Option<DynamicObject> {
        self.objects()
            .get(&key_for(kind, namespace, name))
            .cloned()
    }

    /// Number of stored objects of `kind`, across namespaces.
    #[must_use]
    pub fn count(&self, kind: &ResourceKind) -> usize {
        self.objects()
            .keys()
            .filter(|(group, k, _, _)| *group == kind.group && *k == kind.kind)
            .count()
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            gets: self.gets.load(Ordering::SeqCst),
            lists: self.lists.load(Ordering::SeqCst),
            creates: self.creates.load(Ordering::SeqCst),
            patches: self.patches.load(Ordering::SeqCst),
        }
    }

    /// Reset every call counter to zero.
    pub fn reset_calls(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.lists.store(0, Ordering::SeqCst);
        self.creates.store(0, Ordering::SeqCst);
        self.patches.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        ctx: &OpContext,
        kind: &ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        ctx.run(async {
            self.peek(kind, namespace, name)
                .ok_or_else(|| StoreError::NotFound {
                    kind: kind.kind.clone(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
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
        self.lists.fetch_add(1, Ordering::SeqCst);
        ctx.run(async {
            Ok(self
                .objects()
                .iter()
                .filter(|((group, k, ns, _), _)| {
                    *group == kind.group
                        && *k == kind.kind
                        && namespace.is_none_or(|want| !kind.namespaced || ns == want)
                })
                .map(|(_, obj)| obj)
                .filter(|obj| labels_match(obj, selector))
                .cloned()
                .collect())
        })
        .await
    }

    async fn create(
        &self,
        ctx: &OpContext,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        ctx.run(async {
            let kind = kind_of(obj)?;
            let name = name_of(obj)?.to_string();
            let namespace = obj.metadata.namespace.clone().unwrap_or_default();
            let key = key_for(&kind, &namespace, &name);

            let mut objects = self.objects();
            if objects.contains_key(&key) {
                return Err(StoreError::AlreadyExists {
                    kind: kind.kind,
                    namespace,
                    name,
                });
            }

            let mut created = obj.clone();
            created.metadata.resource_version = Some(self.next_resource_version());
            created.metadata.uid = Some(format!("uid-{}-{name}", kind.kind.to_lowercase()));
            objects.insert(key, created.clone());
            Ok(created)
        })
        .await
    }

    async fn patch(
        &self,
        ctx: &OpContext,
        obj: &DynamicObject,
        baseline: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        ctx.run(async {
            let kind = kind_of(obj)?;
            let name = name_of(obj)?.to_string();
            let namespace = obj.metadata.namespace.clone().unwrap_or_default();
            let key = key_for(&kind, &namespace, &name);

            let mut objects = self.objects();
            let Some(current) = objects.get(&key) else {
                return Err(StoreError::NotFound {
                    kind: kind.kind,
                    namespace,
                    name,
                });
            };

            if baseline.metadata.resource_version.is_some()
                && baseline.metadata.resource_version != current.metadata.resource_version
            {
                return Err(StoreError::Conflict {
                    kind: kind.kind,
                    namespace,
                    name,
                    reason: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                });
            }

            let diff = merge_patch(&serde_json::to_value(baseline)?, &serde_json::to_value(obj)?);
            let mut merged = serde_json::to_value(current)?;
            apply_merge_patch(&mut merged, &diff);

            let mut patched: DynamicObject = serde_json::from_value(merged)?;
            patched.metadata.resource_version = Some(self.next_resource_version());
            objects.insert(key, patched.clone());
            Ok(patched)
        })
        .await
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
