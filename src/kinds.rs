// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API version parsing and resource kind descriptors.
//!
//! Every owner-reference comparison in the toolkit goes through
//! [`parse_group_version`], a pure function with no side effects, so that
//! malformed input from a misbehaving co-installed resource can be tested in
//! isolation and never panics.

use crate::constants::{
    ASO_CONTAINER_SERVICE_GROUP, ASO_CONTAINER_SERVICE_VERSION, ASO_RESOURCES_GROUP,
    ASO_RESOURCES_VERSION, CAPI_GROUP, CAPI_VERSION, INFRA_ALPHA_VERSION, INFRA_GROUP,
    INFRA_VERSION, KIND_ASO_AGENT_POOL, KIND_ASO_AKS_CLUSTER, KIND_ASO_MANAGED_CLUSTER,
    KIND_ASO_MANAGED_CONTROL_PLANE, KIND_ASO_MANAGED_MACHINE_POOL, KIND_ASO_RESOURCE_GROUP,
    KIND_AZURE_CLUSTER, KIND_AZURE_CLUSTER_IDENTITY, KIND_AZURE_MACHINE,
    KIND_AZURE_MACHINE_POOL, KIND_AZURE_MANAGED_CLUSTER, KIND_AZURE_MANAGED_CONTROL_PLANE,
    KIND_AZURE_MANAGED_MACHINE_POOL, KIND_CLUSTER, KIND_MACHINE, KIND_MACHINE_POOL,
    KIND_NAMESPACE, KIND_SECRET,
};
use crate::errors::ResolutionError;
use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use std::fmt;

/// A parsed `apiVersion` string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupVersion {
    /// API group; empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
}

/// Parse an `apiVersion` string such as `cluster.x-k8s.io/v1beta1` or `v1`.
///
/// Follows the API machinery rules: an empty string is the empty group
/// version, a string without `/` is a version in the core group, a string with
/// exactly one `/` is `group/version`, anything else is malformed.
///
/// # Errors
///
/// Returns [`ResolutionError::MalformedApiVersion`] when the string contains
/// more than one `/`.
///
/// # Example
///
/// ```rust
/// use capz_adopt::kinds::parse_group_version;
///
/// let gv = parse_group_version("cluster.x-k8s.io/v1beta1").unwrap();
/// assert_eq!(gv.group, "cluster.x-k8s.io");
/// assert_eq!(gv.version, "v1beta1");
///
/// assert!(parse_group_version("a/b/c").is_err());
/// ```
pub fn parse_group_version(api_version: &str) -> Result<GroupVersion, ResolutionError> {
    if api_version.is_empty() || api_version == "/" {
        return Ok(GroupVersion::default());
    }

    match api_version.matches('/').count() {
        0 => Ok(GroupVersion {
            group: String::new(),
            version: api_version.to_string(),
        }),
        1 => {
            let (group, version) = api_version
                .split_once('/')
                .ok_or_else(|| ResolutionError::MalformedApiVersion(api_version.to_string()))?;
            Ok(GroupVersion {
                group: group.to_string(),
                version: version.to_string(),
            })
        }
        _ => Err(ResolutionError::MalformedApiVersion(
            api_version.to_string(),
        )),
    }
}

/// An (API group, kind) pair identifying one hop of an owner chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKind {
    /// API group; empty for the core group
    pub group: String,
    /// Kind, compared case-sensitively
    pub kind: String,
}

impl GroupKind {
    /// Build a group/kind pair.
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Plural and scope of every kind the toolkit touches.
///
/// `(group, kind, plural, namespaced)`
const KNOWN_KINDS: &[(&str, &str, &str, bool)] = &[
    ("", KIND_SECRET, "secrets", true),
    ("", KIND_NAMESPACE, "namespaces", false),
    (CAPI_GROUP, KIND_CLUSTER, "clusters", true),
    (CAPI_GROUP, KIND_MACHINE, "machines", true),
    (CAPI_GROUP, KIND_MACHINE_POOL, "machinepools", true),
    (INFRA_GROUP, KIND_AZURE_CLUSTER, "azureclusters", true),
    (INFRA_GROUP, KIND_AZURE_MACHINE, "azuremachines", true),
    (INFRA_GROUP, KIND_AZURE_MACHINE_POOL, "azuremachinepools", true),
    (INFRA_GROUP, KIND_AZURE_MANAGED_CLUSTER, "azuremanagedclusters", true),
    (
        INFRA_GROUP,
        KIND_AZURE_MANAGED_CONTROL_PLANE,
        "azuremanagedcontrolplanes",
        true,
    ),
    (
        INFRA_GROUP,
        KIND_AZURE_MANAGED_MACHINE_POOL,
        "azuremanagedmachinepools",
        true,
    ),
    (
        INFRA_GROUP,
        KIND_AZURE_CLUSTER_IDENTITY,
        "azureclusteridentities",
        true,
    ),
    (INFRA_GROUP, KIND_ASO_MANAGED_CLUSTER, "azureasomanagedclusters", true),
    (
        INFRA_GROUP,
        KIND_ASO_MANAGED_CONTROL_PLANE,
        "azureasomanagedcontrolplanes",
        true,
    ),
    (
        INFRA_GROUP,
        KIND_ASO_MANAGED_MACHINE_POOL,
        "azureasomanagedmachinepools",
        true,
    ),
    (ASO_CONTAINER_SERVICE_GROUP, KIND_ASO_AKS_CLUSTER, "managedclusters", true),
    (
        ASO_CONTAINER_SERVICE_GROUP,
        KIND_ASO_AGENT_POOL,
        "managedclustersagentpools",
        true,
    ),
    (ASO_RESOURCES_GROUP, KIND_ASO_RESOURCE_GROUP, "resourcegroups", true),
];

/// Fallback pluralization for kinds missing from the table.
fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    let vowel_before_y = ["ay", "ey", "oy", "uy"].iter().any(|s| lower.ends_with(s));
    if lower.ends_with('y') && !vowel_before_y {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if lower.ends_with('s') || lower.ends_with('x') {
        format!("{lower}es")
    } else {
        format!("{lower}s")
    }
}

/// Everything a store needs to address a collection of objects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// API group; empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind
    pub kind: String,
    /// Plural resource name used in URLs
    pub plural: String,
    /// Whether objects of this kind live in a namespace
    pub namespaced: bool,
}

impl ResourceKind {
    /// Describe a kind, looking up its plural and scope.
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        let (plural, namespaced) = KNOWN_KINDS
            .iter()
            .find(|(g, k, _, _)| *g == group && *k == kind)
            .map_or_else(
                || (pluralize_kind(kind), true),
                |(_, _, plural, namespaced)| ((*plural).to_string(), *namespaced),
            );

        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural,
            namespaced,
        }
    }

    /// Describe the kind named by an `apiVersion` and `kind` pair.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MalformedApiVersion`] if `api_version` cannot be parsed.
    pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self, ResolutionError> {
        let gv = parse_group_version(api_version)?;
        Ok(Self::new(&gv.group, &gv.version, kind))
    }

    /// Describe the kind of a dynamic object from its type metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MissingField`] when the object carries no
    /// type metadata, or [`ResolutionError::MalformedApiVersion`] when its
    /// `apiVersion` cannot be parsed.
    pub fn of(obj: &DynamicObject) -> Result<Self, ResolutionError> {
        let types = obj.types.as_ref().ok_or_else(|| ResolutionError::MissingField {
            kind: "<unknown>".to_string(),
            namespace: obj.metadata.namespace.clone().unwrap_or_default(),
            name: obj.metadata.name.clone().unwrap_or_default(),
            field: "apiVersion".to_string(),
        })?;
        Self::from_api_version(&types.api_version, &types.kind)
    }

    /// `group/version`, or just `version` for the core group.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The (group, kind) pair of this kind.
    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.group, &self.kind)
    }

    /// The kube `ApiResource` used to build dynamic API handles.
    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
        };
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }

    /// Core `Secret`.
    #[must_use]
    pub fn secret() -> Self {
        Self::new("", "v1", KIND_SECRET)
    }

    /// Core `Namespace` (cluster scoped).
    #[must_use]
    pub fn namespace() -> Self {
        Self::new("", "v1", KIND_NAMESPACE)
    }

    /// Cluster API `Cluster`.
    #[must_use]
    pub fn cluster() -> Self {
        Self::new(CAPI_GROUP, CAPI_VERSION, KIND_CLUSTER)
    }

    /// Cluster API `Machine`.
    #[must_use]
    pub fn machine() -> Self {
        Self::new(CAPI_GROUP, CAPI_VERSION, KIND_MACHINE)
    }

    /// Cluster API `MachinePool`.
    #[must_use]
    pub fn machine_pool() -> Self {
        Self::new(CAPI_GROUP, CAPI_VERSION, KIND_MACHINE_POOL)
    }

    /// `AzureCluster`.
    #[must_use]
    pub fn azure_cluster() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_CLUSTER)
    }

    /// `AzureMachine`.
    #[must_use]
    pub fn azure_machine() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_MACHINE)
    }

    /// `AzureMachinePool`.
    #[must_use]
    pub fn azure_machine_pool() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_MACHINE_POOL)
    }

    /// `AzureManagedCluster`.
    #[must_use]
    pub fn azure_managed_cluster() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_MANAGED_CLUSTER)
    }

    /// `AzureManagedControlPlane`.
    #[must_use]
    pub fn azure_managed_control_plane() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_MANAGED_CONTROL_PLANE)
    }

    /// `AzureManagedMachinePool`.
    #[must_use]
    pub fn azure_managed_machine_pool() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_MANAGED_MACHINE_POOL)
    }

    /// `AzureClusterIdentity`.
    #[must_use]
    pub fn azure_cluster_identity() -> Self {
        Self::new(INFRA_GROUP, INFRA_VERSION, KIND_AZURE_CLUSTER_IDENTITY)
    }

    /// `AzureASOManagedCluster`.
    #[must_use]
    pub fn aso_managed_cluster() -> Self {
        Self::new(INFRA_GROUP, INFRA_ALPHA_VERSION, KIND_ASO_MANAGED_CLUSTER)
    }

    /// `AzureASOManagedControlPlane`.
    #[must_use]
    pub fn aso_managed_control_plane() -> Self {
        Self::new(INFRA_GROUP, INFRA_ALPHA_VERSION, KIND_ASO_MANAGED_CONTROL_PLANE)
    }

    /// `AzureASOManagedMachinePool`.
    #[must_use]
    pub fn aso_managed_machine_pool() -> Self {
        Self::new(INFRA_GROUP, INFRA_ALPHA_VERSION, KIND_ASO_MANAGED_MACHINE_POOL)
    }

    /// ASO `ManagedCluster` (an AKS cluster).
    #[must_use]
    pub fn aks_managed_cluster() -> Self {
        Self::new(
            ASO_CONTAINER_SERVICE_GROUP,
            ASO_CONTAINER_SERVICE_VERSION,
            KIND_ASO_AKS_CLUSTER,
        )
    }

    /// ASO `ManagedClustersAgentPool` (an AKS node pool).
    #[must_use]
    pub fn aks_agent_pool() -> Self {
        Self::new(
            ASO_CONTAINER_SERVICE_GROUP,
            ASO_CONTAINER_SERVICE_VERSION,
            KIND_ASO_AGENT_POOL,
        )
    }

    /// ASO `ResourceGroup`.
    #[must_use]
    pub fn resource_group() -> Self {
        Self::new(ASO_RESOURCES_GROUP, ASO_RESOURCES_VERSION, KIND_ASO_RESOURCE_GROUP)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
#[path = "kinds_tests.rs"]
mod kinds_tests;
