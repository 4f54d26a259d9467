// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the capz-adopt controllers.
//!
//! API groups, versions and kinds of every resource the toolkit reads or
//! writes, plus timing constants. Constants are organized by category for
//! easy maintenance.

// ============================================================================
// Cluster API Constants
// ============================================================================

/// API group of core Cluster API resources (`Cluster`, `Machine`, `MachinePool`)
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";

/// Served version of core Cluster API resources
pub const CAPI_VERSION: &str = "v1beta1";

/// Kind name for `Cluster`
pub const KIND_CLUSTER: &str = "Cluster";

/// Kind name for `Machine`
pub const KIND_MACHINE: &str = "Machine";

/// Kind name for `MachinePool`
pub const KIND_MACHINE_POOL: &str = "MachinePool";

// ============================================================================
// Azure Infrastructure Provider Constants
// ============================================================================

/// API group of the Azure infrastructure provider
pub const INFRA_GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// Stable version of the Azure infrastructure provider resources
pub const INFRA_VERSION: &str = "v1beta1";

/// Version of the ASO-backed (`AzureASOManaged*`) infrastructure resources
pub const INFRA_ALPHA_VERSION: &str = "v1alpha1";

/// Fully qualified API version of the ASO-backed infrastructure resources
pub const INFRA_ALPHA_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1alpha1";

/// Kind name for `AzureCluster`
pub const KIND_AZURE_CLUSTER: &str = "AzureCluster";

/// Kind name for `AzureMachine`
pub const KIND_AZURE_MACHINE: &str = "AzureMachine";

/// Kind name for `AzureMachinePool`
pub const KIND_AZURE_MACHINE_POOL: &str = "AzureMachinePool";

/// Kind name for `AzureManagedCluster`
pub const KIND_AZURE_MANAGED_CLUSTER: &str = "AzureManagedCluster";

/// Kind name for `AzureManagedControlPlane`
pub const KIND_AZURE_MANAGED_CONTROL_PLANE: &str = "AzureManagedControlPlane";

/// Kind name for `AzureManagedMachinePool`
pub const KIND_AZURE_MANAGED_MACHINE_POOL: &str = "AzureManagedMachinePool";

/// Kind name for `AzureClusterIdentity`
pub const KIND_AZURE_CLUSTER_IDENTITY: &str = "AzureClusterIdentity";

/// Kind name for `AzureASOManagedCluster`
pub const KIND_ASO_MANAGED_CLUSTER: &str = "AzureASOManagedCluster";

/// Kind name for `AzureASOManagedControlPlane`
pub const KIND_ASO_MANAGED_CONTROL_PLANE: &str = "AzureASOManagedControlPlane";

/// Kind name for `AzureASOManagedMachinePool`
pub const KIND_ASO_MANAGED_MACHINE_POOL: &str = "AzureASOManagedMachinePool";

/// `spec.mode` value of an AKS system node pool
pub const NODE_POOL_MODE_SYSTEM: &str = "System";

/// Subnet role of subnets hosting worker nodes
pub const SUBNET_ROLE_NODE: &str = "node";

/// Subnet role of a subnet shared by control plane and worker nodes
pub const SUBNET_ROLE_CLUSTER: &str = "cluster";

/// Azure cloud used when a cluster names none
pub const DEFAULT_AZURE_ENVIRONMENT: &str = "AzurePublicCloud";

/// Name AKS gives the outbound load balancer of a managed cluster
pub const MANAGED_OUTBOUND_LB_NAME: &str = "kubernetes";

/// Key holding the client secret in a service principal credentials secret
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

// ============================================================================
// Cloud Provider Config Constants
// ============================================================================

/// VM type written to generated cloud provider configs
pub const CLOUD_PROVIDER_VM_TYPE: &str = "vmss";

/// Load balancer SKU written to generated cloud provider configs
pub const CLOUD_PROVIDER_LB_SKU: &str = "Standard";

/// Maximum number of load balancer rules written to generated cloud provider configs
pub const CLOUD_PROVIDER_MAX_LB_RULES: i32 = 250;

/// Suffix of the generated cloud provider config secret name
pub const CLOUD_PROVIDER_SECRET_SUFFIX: &str = "azure-json";

/// Secret key of the control plane cloud provider config
pub const CONTROL_PLANE_CONFIG_KEY: &str = "control-plane-azure.json";

/// Secret key of the worker node cloud provider config
pub const WORKER_NODE_CONFIG_KEY: &str = "worker-node-azure.json";

/// Legacy secret key, a copy of the control plane config
pub const LEGACY_CONFIG_KEY: &str = "azure.json";

// ============================================================================
// Azure Service Operator (ASO) Constants
// ============================================================================

/// API group of ASO AKS resources
pub const ASO_CONTAINER_SERVICE_GROUP: &str = "containerservice.azure.com";

/// Served version of ASO AKS resources
pub const ASO_CONTAINER_SERVICE_VERSION: &str = "v1api20231001";

/// Kind name for the ASO `ManagedCluster`
pub const KIND_ASO_AKS_CLUSTER: &str = "ManagedCluster";

/// Kind name for the ASO `ManagedClustersAgentPool`
pub const KIND_ASO_AGENT_POOL: &str = "ManagedClustersAgentPool";

/// API group of ASO resource groups
pub const ASO_RESOURCES_GROUP: &str = "resources.azure.com";

/// Served version of ASO resource groups
pub const ASO_RESOURCES_VERSION: &str = "v1api20200601";

/// Kind name for the ASO `ResourceGroup`
pub const KIND_ASO_RESOURCE_GROUP: &str = "ResourceGroup";

// ============================================================================
// Core Kubernetes Constants
// ============================================================================

/// Kind name for `Secret`
pub const KIND_SECRET: &str = "Secret";

/// Kind name for `Namespace`
pub const KIND_NAMESPACE: &str = "Namespace";

// ============================================================================
// Finalizer Constants
// ============================================================================

/// Maximum length of the name segment of a finalizer (the part after `/`)
pub const MAX_FINALIZER_LEN: usize = 63;

/// Maximum length of a finalizer prefix (a DNS subdomain)
pub const MAX_FINALIZER_PREFIX_LEN: usize = 253;

/// Length of a hex-encoded SHA-224 digest
pub const FINALIZER_HASH_LEN: usize = 56;

/// Default prefix for cluster identity finalizers
pub const DEFAULT_FINALIZER_PREFIX: &str = "azurecluster.infrastructure.cluster.x-k8s.io";

// ============================================================================
// Timing Constants
// ============================================================================

/// Timeout for a single watch-mapping fan-out (seconds)
pub const DEFAULT_MAPPING_TIMEOUT_SECS: u64 = 10;

/// Timeout for a single object store call issued by a reconcile (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Requeue interval after a successful adoption reconcile (seconds)
pub const DEFAULT_REQUEUE_SUCCESS_SECS: u64 = 300;

/// Requeue interval after a failed adoption reconcile (seconds)
pub const DEFAULT_REQUEUE_ERROR_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address of the metrics endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Field manager name used for writes
pub const FIELD_MANAGER: &str = "capz-adopt";
