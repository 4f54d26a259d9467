// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Annotation helpers and event predicates for Cluster API objects.

use crate::crd::Cluster;
use crate::labels::BLOCK_MOVE_ANNOTATION;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Mark an object so `clusterctl move` waits for it.
///
/// Returns `true` if the annotation was added; an existing annotation is left
/// as is, whatever its value.
pub fn add_block_move_annotation(meta: &mut ObjectMeta) -> bool {
    let annotations = meta.annotations.get_or_insert_with(Default::default);
    if annotations.contains_key(BLOCK_MOVE_ANNOTATION) {
        return false;
    }
    annotations.insert(BLOCK_MOVE_ANNOTATION.to_string(), "true".to_string());
    true
}

/// Drop the block-move annotation. Returns `true` if it was present.
pub fn remove_block_move_annotation(meta: &mut ObjectMeta) -> bool {
    meta.annotations
        .as_mut()
        .is_some_and(|annotations| annotations.remove(BLOCK_MOVE_ANNOTATION).is_some())
}

/// Whether an update toggled `spec.paused` on a `Cluster`.
///
/// An absent value counts as not paused.
#[must_use]
pub fn cluster_pause_changed(old: &Cluster, new: &Cluster) -> bool {
    old.spec.paused.unwrap_or(false) != new.spec.paused.unwrap_or(false)
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
