// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed views of the Cluster API and Azure provider resources.
//!
//! These types are owned by other controllers; this crate never installs
//! their CRDs. They exist to build native resources during adoption and to
//! read the handful of fields the toolkit needs. Every field the toolkit does
//! not care about is ignored on read, so the structs stay compatible with
//! newer versions of the upstream schemas.
//!
//! # Resource Types
//!
//! ## Cluster API
//!
//! - [`Cluster`] - the root of a workload cluster
//! - [`MachinePool`] - a group of machines scaled together
//!
//! ## ASO-backed infrastructure
//!
//! - [`AzureASOManagedCluster`] - wraps the ASO `ResourceGroup`
//! - [`AzureASOManagedControlPlane`] - wraps the ASO `ManagedCluster`
//! - [`AzureASOManagedMachinePool`] - wraps an ASO `ManagedClustersAgentPool`
//!
//! ## Azure infrastructure
//!
//! - [`AzureCluster`] - self-managed cluster infrastructure
//! - [`AzureManagedControlPlane`] - AKS control plane
//! - [`AzureManagedMachinePool`] - AKS node pool
//! - [`AzureClusterIdentity`] - credentials shared across clusters
//!
//! # Example
//!
//! ```rust
//! use capz_adopt::crd::{Cluster, ClusterSpec};
//! use k8s_openapi::api::core::v1::ObjectReference;
//!
//! let cluster = Cluster::new(
//!     "cluster-a",
//!     ClusterSpec {
//!         infrastructure_ref: Some(ObjectReference {
//!             api_version: Some("infrastructure.cluster.x-k8s.io/v1alpha1".to_string()),
//!             kind: Some("AzureASOManagedCluster".to_string()),
//!             name: Some("cluster-a".to_string()),
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     },
//! );
//! assert_eq!(cluster.spec.paused, None);
//! ```

use k8s_openapi::api::core::v1::{ObjectReference, SecretReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Cluster API
// ============================================================================

/// Desired state of a Cluster API `Cluster`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Whether reconciliation of the cluster and its objects is paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// The control plane provider object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<ObjectReference>,

    /// The infrastructure provider object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}

/// Desired state of a Cluster API `MachinePool`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "MachinePool",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolSpec {
    /// Name of the owning `Cluster`.
    #[serde(default)]
    pub cluster_name: String,

    /// Desired number of machines. Absent when replicas are managed externally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Template for the pool's machines.
    #[serde(default)]
    pub template: MachineTemplateSpec,
}

/// Template of the machines in a pool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    /// Machine specification.
    #[serde(default)]
    pub spec: MachineSpec,
}

/// The parts of a machine specification the toolkit sets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Name of the owning `Cluster`.
    #[serde(default)]
    pub cluster_name: String,

    /// Bootstrap configuration.
    #[serde(default)]
    pub bootstrap: Bootstrap,

    /// The infrastructure object backing the machines.
    #[serde(default)]
    pub infrastructure_ref: ObjectReference,

    /// Kubernetes version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Bootstrap data source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    /// Reference to a bootstrap provider object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,

    /// Name of a secret holding bootstrap data. Empty for AKS-managed nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

// ============================================================================
// ASO-backed infrastructure (v1alpha1)
// ============================================================================

/// Desired state of an `AzureASOManagedCluster`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "AzureASOManagedCluster",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureASOManagedClusterSpec {
    /// ASO resources managed through this object, each a complete ASO
    /// object (`apiVersion`, `kind`, `metadata.name`, `spec`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Value>,
}

/// Desired state of an `AzureASOManagedControlPlane`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "AzureASOManagedControlPlane",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureASOManagedControlPlaneSpec {
    /// ASO resources managed through this object, each a complete ASO
    /// object (`apiVersion`, `kind`, `metadata.name`, `spec`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Value>,
}

/// Desired state of an `AzureASOManagedMachinePool`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "AzureASOManagedMachinePool",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureASOManagedMachinePoolSpec {
    /// ASO resources managed through this object, each a complete ASO
    /// object (`apiVersion`, `kind`, `metadata.name`, `spec`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Value>,
}

// ============================================================================
// Azure infrastructure (v1beta1)
// ============================================================================

/// Desired state of an `AzureCluster`, restricted to what the cloud provider
/// configuration and identity handling read.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureCluster",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterSpec {
    /// Resource group holding the cluster's resources.
    #[serde(default)]
    pub resource_group: String,

    /// Subscription the cluster lives in.
    #[serde(default, rename = "subscriptionID")]
    pub subscription_id: String,

    /// Azure region.
    #[serde(default)]
    pub location: String,

    /// Azure cloud name (`AzurePublicCloud` when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_environment: Option<String>,

    /// Edge zone placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_location: Option<ExtendedLocationSpec>,

    /// Identity used to talk to Azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<ObjectReference>,

    /// Network layout.
    #[serde(default)]
    pub network_spec: NetworkSpec,

    /// Rate-limit and back-off overrides for the cloud provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider_config_overrides: Option<CloudProviderConfigOverrides>,
}

/// Edge zone placement of a cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtendedLocationSpec {
    /// Edge zone name.
    #[serde(default)]
    pub name: String,
    /// Location type (`EdgeZone`).
    #[serde(default, rename = "type")]
    pub location_type: String,
}

/// Network layout of an `AzureCluster`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Virtual network.
    #[serde(default)]
    pub vnet: VnetSpec,

    /// Subnets, in declaration order.
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,

    /// Outbound load balancer for nodes.
    #[serde(default, rename = "nodeOutboundLB", skip_serializing_if = "Option::is_none")]
    pub node_outbound_lb: Option<NamedResource>,
}

/// Virtual network reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetSpec {
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Resource group of the network (the cluster's when empty).
    #[serde(default)]
    pub resource_group: String,
}

/// A subnet of the cluster network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Subnet name.
    #[serde(default)]
    pub name: String,
    /// `control-plane`, `node`, `bastion` or `cluster`.
    #[serde(default)]
    pub role: String,
    /// Network security group attached to the subnet.
    #[serde(default)]
    pub security_group: NamedResource,
    /// Route table attached to the subnet.
    #[serde(default)]
    pub route_table: NamedResource,
}

/// Any Azure resource referenced only by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NamedResource {
    /// Resource name.
    #[serde(default)]
    pub name: String,
}

/// Cloud provider overrides set on a cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderConfigOverrides {
    /// Per-client rate limits.
    #[serde(default)]
    pub rate_limits: Vec<RateLimitSpec>,
    /// Back-off policy.
    #[serde(default)]
    pub back_offs: BackOffSpec,
}

/// One named rate limit override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitSpec {
    /// Client name (`defaultRateLimit`, `routeRateLimit`, ...).
    pub name: String,
    /// Limits for that client.
    #[serde(default)]
    pub config: RateLimitSettings,
}

/// Rate limit values as written on the cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSettings {
    /// Enable rate limiting.
    #[serde(default)]
    pub cloud_provider_rate_limit: bool,
    /// Read queries per second.
    #[serde(default, rename = "cloudProviderRateLimitQPS", skip_serializing_if = "Option::is_none")]
    pub cloud_provider_rate_limit_qps: Option<Quantity>,
    /// Read bucket size.
    #[serde(default)]
    pub cloud_provider_rate_limit_bucket: i32,
    /// Write queries per second.
    #[serde(default, rename = "cloudProviderRateLimitQPSWrite", skip_serializing_if = "Option::is_none")]
    pub cloud_provider_rate_limit_qps_write: Option<Quantity>,
    /// Write bucket size.
    #[serde(default)]
    pub cloud_provider_rate_limit_bucket_write: i32,
}

/// Back-off values as written on the cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackOffSpec {
    /// Enable back-off.
    #[serde(default)]
    pub cloud_provider_backoff: bool,
    /// Retry count.
    #[serde(default)]
    pub cloud_provider_backoff_retries: i32,
    /// Exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider_backoff_exponent: Option<Quantity>,
    /// Initial duration in seconds.
    #[serde(default)]
    pub cloud_provider_backoff_duration: i32,
    /// Jitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider_backoff_jitter: Option<Quantity>,
}

/// A resource quantity, written either as a number or as a string such as `"1.5"` or `"500m"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Quantity {
    /// Plain JSON number
    Number(f64),
    /// Kubernetes quantity string
    Text(String),
}

impl Quantity {
    /// Approximate value as a float; `None` when the string is not a quantity.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_quantity(s.trim()),
        }
    }
}

fn parse_quantity(s: &str) -> Option<f64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
    ];

    if let Ok(value) = s.parse::<f64>() {
        return Some(value);
    }
    SUFFIXES.iter().find_map(|(suffix, factor)| {
        s.strip_suffix(suffix)
            .and_then(|number| number.parse::<f64>().ok())
            .map(|number| number * factor)
    })
}

/// Desired state of an `AzureManagedControlPlane`, restricted to what scope
/// resolution reads.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedControlPlane",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneSpec {
    /// Resource group of the AKS cluster.
    #[serde(default)]
    pub resource_group_name: String,

    /// Subscription of the AKS cluster.
    #[serde(default, rename = "subscriptionID")]
    pub subscription_id: String,

    /// Azure region.
    #[serde(default)]
    pub location: String,

    /// Azure cloud name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_environment: Option<String>,

    /// Identity used to talk to Azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<ObjectReference>,

    /// Virtual network of the AKS cluster.
    #[serde(default)]
    pub virtual_network: ManagedControlPlaneVirtualNetwork,
}

/// Virtual network of an AKS cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedControlPlaneVirtualNetwork {
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Resource group of the network.
    #[serde(default)]
    pub resource_group: String,
    /// Node subnet.
    #[serde(default)]
    pub subnet: NamedResource,
}

/// Desired state of an `AzureManagedMachinePool`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedMachinePool",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedMachinePoolSpec {
    /// `System` or `User`.
    #[serde(default)]
    pub mode: String,
}

/// Desired state of an `AzureClusterIdentity`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterIdentity",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterIdentitySpec {
    /// Identity type (`ServicePrincipal`, `UserAssignedMSI`, `WorkloadIdentity`, ...).
    #[serde(default, rename = "type")]
    pub identity_type: String,

    /// Client (application) id.
    #[serde(default, rename = "clientID")]
    pub client_id: String,

    /// Secret holding the client secret under the `clientSecret` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretReference>,

    /// Tenant id.
    #[serde(default, rename = "tenantID")]
    pub tenant_id: String,

    /// Namespaces whose clusters may use this identity. Absent means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_namespaces: Option<AllowedNamespaces>,
}

/// Namespaces allowed to use an identity. An empty value allows every namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AllowedNamespaces {
    /// Explicit namespace names.
    #[serde(default, rename = "list", skip_serializing_if = "Option::is_none")]
    pub namespace_list: Option<Vec<String>>,

    /// Namespaces selected by label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
