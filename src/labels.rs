// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys shared by the adoption controllers and helpers.
//!
//! Most of these keys are owned by Cluster API or the Azure provider; the
//! toolkit must use them verbatim to interoperate with those controllers.

// ============================================================================
// Cluster API Labels
// ============================================================================

/// Label carrying the name of the Cluster API `Cluster` an object belongs to
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

// ============================================================================
// Resource Lifecycle
// ============================================================================

/// Value of the owner-marker label (`<clusterName>: owned`) on generated secrets
pub const RESOURCE_LIFECYCLE_OWNED: &str = "owned";

// ============================================================================
// Annotations
// ============================================================================

/// Annotation requesting adoption of an ASO resource into Cluster API
pub const ADOPT_ANNOTATION: &str = "sigs.k8s.io/cluster-api-provider-azure-adopt";

/// Value of [`ADOPT_ANNOTATION`] that requests adoption
pub const ADOPT_ANNOTATION_VALUE: &str = "true";

/// Annotation marking a `MachinePool`'s replica count as owned by an external autoscaler
pub const REPLICAS_MANAGED_BY_ANNOTATION: &str = "cluster.x-k8s.io/replicas-managed-by";

/// Value of [`REPLICAS_MANAGED_BY_ANNOTATION`] when AKS owns the replica count
pub const REPLICAS_MANAGED_BY_AKS: &str = "aks";

/// clusterctl annotation preventing `clusterctl move` from moving an object
pub const BLOCK_MOVE_ANNOTATION: &str = "clusterctl.cluster.x-k8s.io/block-move";
