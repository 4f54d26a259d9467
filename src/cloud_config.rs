// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud provider configuration secrets.
//!
//! The Azure cloud provider running inside a workload cluster reads an
//! `azure.json` file. [`cloud_provider_secret`] renders that file for the
//! control plane and for worker nodes from a [`ClusterScoper`] and packs both
//! into a secret named `<name>-azure-json`, labelled `<clusterName>: owned` so
//! the [secret reconciler](crate::secret) keeps it fresh.
//!
//! Field names and omission rules match the cloud provider's own config
//! struct: zero-valued optional fields are left out of the JSON.

use crate::constants::{
    CLOUD_PROVIDER_LB_SKU, CLOUD_PROVIDER_MAX_LB_RULES, CLOUD_PROVIDER_SECRET_SUFFIX,
    CLOUD_PROVIDER_VM_TYPE, CONTROL_PLANE_CONFIG_KEY, LEGACY_CONFIG_KEY, SUBNET_ROLE_CLUSTER,
    SUBNET_ROLE_NODE, WORKER_NODE_CONFIG_KEY,
};
use crate::crd::{BackOffSpec, RateLimitSettings, SubnetSpec};
use crate::errors::{CloudConfigError, Result};
use crate::labels::RESOURCE_LIFECYCLE_OWNED;
use crate::scope::ClusterScoper;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_f32(value: &f32) -> bool {
    *value == 0.0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

/// Identity the cluster's VMs use to talk to Azure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmIdentity {
    /// Service principal credentials from the cluster identity
    #[default]
    None,
    /// The VM's system-assigned managed identity
    SystemAssigned,
    /// A user-assigned managed identity
    UserAssigned,
}

/// Rate limit settings of one Azure client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default, skip_serializing_if = "is_false")]
    pub cloud_provider_rate_limit: bool,
    /// Read queries per second
    #[serde(default, rename = "cloudProviderRateLimitQPS", skip_serializing_if = "is_zero_f32")]
    pub cloud_provider_rate_limit_qps: f32,
    /// Read bucket size
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub cloud_provider_rate_limit_bucket: i32,
    /// Write queries per second
    #[serde(
        default,
        rename = "cloudProviderRateLimitQPSWrite",
        skip_serializing_if = "is_zero_f32"
    )]
    pub cloud_provider_rate_limit_qps_write: f32,
    /// Write bucket size
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub cloud_provider_rate_limit_bucket_write: i32,
}

impl From<&RateLimitSettings> for RateLimitConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn from(source: &RateLimitSettings) -> Self {
        Self {
            cloud_provider_rate_limit: source.cloud_provider_rate_limit,
            cloud_provider_rate_limit_qps: source
                .cloud_provider_rate_limit_qps
                .as_ref()
                .and_then(|q| q.as_f64())
                .unwrap_or_default() as f32,
            cloud_provider_rate_limit_bucket: source.cloud_provider_rate_limit_bucket,
            cloud_provider_rate_limit_qps_write: source
                .cloud_provider_rate_limit_qps_write
                .as_ref()
                .and_then(|q| q.as_f64())
                .unwrap_or_default() as f32,
            cloud_provider_rate_limit_bucket_write: source.cloud_provider_rate_limit_bucket_write,
        }
    }
}

/// Default and per-client rate limits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderRateLimitConfig {
    /// Limits applied to every client without its own entry
    #[serde(flatten)]
    pub default: RateLimitConfig,
    /// Route client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_rate_limit: Option<RateLimitConfig>,
    /// Subnets client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets_rate_limit: Option<RateLimitConfig>,
    /// Network interface client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_rate_limit: Option<RateLimitConfig>,
    /// Route table client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table_rate_limit: Option<RateLimitConfig>,
    /// Load balancer client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_rate_limit: Option<RateLimitConfig>,
    /// Public IP client
    #[serde(
        default,
        rename = "publicIPAddressRateLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_ip_address_rate_limit: Option<RateLimitConfig>,
    /// Security group client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_rate_limit: Option<RateLimitConfig>,
    /// Virtual machine client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_rate_limit: Option<RateLimitConfig>,
    /// Storage account client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_rate_limit: Option<RateLimitConfig>,
    /// Disk client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_rate_limit: Option<RateLimitConfig>,
    /// Snapshot client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_rate_limit: Option<RateLimitConfig>,
    /// Scale set client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_scale_set_rate_limit: Option<RateLimitConfig>,
    /// VM sizes client
    #[serde(
        default,
        rename = "virtualMachineSizesRateLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub virtual_machine_size_rate_limit: Option<RateLimitConfig>,
    /// Availability set client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_set_rate_limit: Option<RateLimitConfig>,
}

impl CloudProviderRateLimitConfig {
    /// Slot for a named rate limit override; `None` for unknown names.
    fn slot(&mut self, name: &str) -> Option<&mut Option<RateLimitConfig>> {
        let slot = match name {
            "routeRateLimit" => &mut self.route_rate_limit,
            "subnetsRateLimit" => &mut self.subnets_rate_limit,
            "interfaceRateLimit" => &mut self.interface_rate_limit,
            "routeTableRateLimit" => &mut self.route_table_rate_limit,
            "loadBalancerRateLimit" => &mut self.load_balancer_rate_limit,
            "publicIPAddressRateLimit" => &mut self.public_ip_address_rate_limit,
            "securityGroupRateLimit" => &mut self.security_group_rate_limit,
            "virtualMachineRateLimit" => &mut self.virtual_machine_rate_limit,
            "storageAccountRateLimit" => &mut self.storage_account_rate_limit,
            "diskRateLimit" => &mut self.disk_rate_limit,
            "snapshotRateLimit" => &mut self.snapshot_rate_limit,
            "virtualMachineScaleSetRateLimit" => &mut self.virtual_machine_scale_set_rate_limit,
            "virtualMachineSizesRateLimit" => &mut self.virtual_machine_size_rate_limit,
            "availabilitySetRateLimit" => &mut self.availability_set_rate_limit,
            _ => return None,
        };
        Some(slot)
    }
}

/// Name of the rate limit override that sets the default limits.
pub const DEFAULT_RATE_LIMIT: &str = "defaultRateLimit";

/// Retry policy for Azure API calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackOffConfig {
    /// Enable back-off
    #[serde(default, skip_serializing_if = "is_false")]
    pub cloud_provider_backoff: bool,
    /// Retry count
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub cloud_provider_backoff_retries: i32,
    /// Exponential growth factor
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub cloud_provider_backoff_exponent: f64,
    /// Initial delay in seconds
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub cloud_provider_backoff_duration: i32,
    /// Jitter factor
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub cloud_provider_backoff_jitter: f64,
}

impl From<&BackOffSpec> for BackOffConfig {
    fn from(source: &BackOffSpec) -> Self {
        Self {
            cloud_provider_backoff: source.cloud_provider_backoff,
            cloud_provider_backoff_retries: source.cloud_provider_backoff_retries,
            cloud_provider_backoff_exponent: source
                .cloud_provider_backoff_exponent
                .as_ref()
                .and_then(|q| q.as_f64())
                .unwrap_or_default(),
            cloud_provider_backoff_duration: source.cloud_provider_backoff_duration,
            cloud_provider_backoff_jitter: source
                .cloud_provider_backoff_jitter
                .as_ref()
                .and_then(|q| q.as_f64())
                .unwrap_or_default(),
        }
    }
}

/// The `azure.json` consumed by the Azure cloud provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderConfig {
    /// Azure cloud name
    pub cloud: String,
    /// Azure AD tenant
    pub tenant_id: String,
    /// Subscription id
    pub subscription_id: String,
    /// Service principal client id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aad_client_id: String,
    /// Service principal secret
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aad_client_secret: String,
    /// Resource group of the cluster
    pub resource_group: String,
    /// Network security group of the node subnet
    pub security_group_name: String,
    /// Resource group of the security group
    pub security_group_resource_group: String,
    /// Azure region
    pub location: String,
    /// Extended location type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extended_location_type: String,
    /// Extended location name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extended_location_name: String,
    /// `vmss` or `standard`
    pub vm_type: String,
    /// Virtual network name
    pub vnet_name: String,
    /// Resource group of the virtual network
    pub vnet_resource_group: String,
    /// Node subnet name
    pub subnet_name: String,
    /// Route table of the node subnet
    pub route_table_name: String,
    /// Load balancer SKU
    pub load_balancer_sku: String,
    /// Outbound load balancer of the nodes
    pub load_balancer_name: String,
    /// Maximum rules per load balancer
    pub maximum_load_balancer_rule_count: i32,
    /// Authenticate with a managed identity
    pub use_managed_identity_extension: bool,
    /// Read instance metadata from IMDS
    pub use_instance_metadata: bool,
    /// Allow VMSS Flex nodes
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_vmss_flex_nodes: bool,
    /// Resource id of a user-assigned identity
    #[serde(
        default,
        rename = "userAssignedIdentityID",
        skip_serializing_if = "String::is_empty"
    )]
    pub user_assigned_identity_id: String,
    /// Rate limits
    #[serde(flatten)]
    pub rate_limits: CloudProviderRateLimitConfig,
    /// Back-off policy
    #[serde(flatten)]
    pub back_off: BackOffConfig,
}

impl CloudProviderConfig {
    /// Base configuration for a scope, with overrides applied.
    #[must_use]
    pub fn for_scope(scope: &dyn ClusterScoper) -> Self {
        let subnet = node_subnet(scope);
        let vnet = scope.vnet();

        let mut config = Self {
            cloud: scope.cloud_environment().to_string(),
            tenant_id: scope.tenant_id().to_string(),
            subscription_id: scope.subscription_id().to_string(),
            aad_client_id: scope.client_id().to_string(),
            aad_client_secret: scope.client_secret().to_string(),
            resource_group: scope.resource_group().to_string(),
            security_group_name: subnet.security_group.name,
            security_group_resource_group: vnet.resource_group.clone(),
            location: scope.location().to_string(),
            extended_location_type: scope.extended_location_type().to_string(),
            extended_location_name: scope.extended_location_name().to_string(),
            vm_type: CLOUD_PROVIDER_VM_TYPE.to_string(),
            vnet_name: vnet.name.clone(),
            vnet_resource_group: vnet.resource_group.clone(),
            subnet_name: subnet.name,
            route_table_name: subnet.route_table.name,
            load_balancer_sku: CLOUD_PROVIDER_LB_SKU.to_string(),
            load_balancer_name: scope.outbound_lb_name(SUBNET_ROLE_NODE),
            maximum_load_balancer_rule_count: CLOUD_PROVIDER_MAX_LB_RULES,
            use_managed_identity_extension: false,
            use_instance_metadata: true,
            ..Self::default()
        };
        config.apply_overrides(scope);
        config
    }

    fn apply_overrides(&mut self, scope: &dyn ClusterScoper) {
        let Some(overrides) = scope.cloud_provider_config_overrides() else {
            return;
        };

        for rate_limit in &overrides.rate_limits {
            let limits = RateLimitConfig::from(&rate_limit.config);
            if rate_limit.name == DEFAULT_RATE_LIMIT {
                self.rate_limits.default = limits;
            } else if let Some(slot) = self.rate_limits.slot(&rate_limit.name) {
                *slot = Some(limits);
            }
        }
        self.back_off = BackOffConfig::from(&overrides.back_offs);
    }

    /// Switch to managed identity authentication.
    fn use_managed_identity(&mut self, user_identity_id: Option<&str>) {
        self.aad_client_id.clear();
        self.aad_client_secret.clear();
        self.use_managed_identity_extension = true;
        if let Some(id) = user_identity_id {
            self.user_assigned_identity_id = id.to_string();
        }
    }

    /// Serialize with four-space indentation.
    fn to_json(&self, role: &'static str) -> Result<Vec<u8>, CloudConfigError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .map_err(|source| CloudConfigError::Marshal { role, source })?;
        Ok(buffer)
    }
}

/// The first subnet with role `node` or `cluster`, or an empty subnet.
fn node_subnet(scope: &dyn ClusterScoper) -> SubnetSpec {
    scope
        .subnets()
        .iter()
        .find(|s| s.role == SUBNET_ROLE_NODE || s.role == SUBNET_ROLE_CLUSTER)
        .cloned()
        .unwrap_or_default()
}

/// Control plane and worker node configurations for a scope and identity.
///
/// # Errors
///
/// Returns [`CloudConfigError::EmptyUserIdentity`] for a user-assigned
/// identity without an id.
pub fn cloud_provider_configs(
    scope: &dyn ClusterScoper,
    identity: VmIdentity,
    user_identity_id: &str,
    machine_pools_enabled: bool,
) -> Result<(CloudProviderConfig, CloudProviderConfig), CloudConfigError> {
    let mut control_plane = CloudProviderConfig::for_scope(scope);
    let mut worker = CloudProviderConfig::for_scope(scope);

    match identity {
        VmIdentity::None => {}
        VmIdentity::SystemAssigned => {
            control_plane.use_managed_identity(None);
            worker.use_managed_identity(None);
        }
        VmIdentity::UserAssigned => {
            if user_identity_id.is_empty() {
                return Err(CloudConfigError::EmptyUserIdentity);
            }
            control_plane.use_managed_identity(Some(user_identity_id));
            worker.use_managed_identity(Some(user_identity_id));
        }
    }

    if machine_pools_enabled {
        for config in [&mut control_plane, &mut worker] {
            if config.vm_type == CLOUD_PROVIDER_VM_TYPE {
                config.enable_vmss_flex_nodes = true;
            }
        }
    }

    Ok((control_plane, worker))
}

/// Build the cloud provider config secret `<name>-azure-json` in `namespace`.
///
/// `machine_pools_enabled` is the state of the Cluster API `MachinePool`
/// feature gate; when set, VMSS Flex nodes are enabled.
///
/// # Errors
///
/// Returns [`CloudConfigError::EmptyUserIdentity`] for a user-assigned
/// identity without an id, or [`CloudConfigError::Marshal`] if a
/// configuration cannot be serialized.
pub fn cloud_provider_secret(
    scope: &dyn ClusterScoper,
    namespace: &str,
    name: &str,
    owner: &OwnerReference,
    identity: VmIdentity,
    user_identity_id: &str,
    machine_pools_enabled: bool,
) -> Result<Secret> {
    let (control_plane, worker) =
        cloud_provider_configs(scope, identity, user_identity_id, machine_pools_enabled)?;

    let control_plane_data = control_plane.to_json("control plane")?;
    let worker_data = worker.to_json("worker node")?;

    Ok(Secret {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(format!("{name}-{CLOUD_PROVIDER_SECRET_SUFFIX}")),
            labels: Some(BTreeMap::from([(
                scope.cluster_name().to_string(),
                RESOURCE_LIFECYCLE_OWNED.to_string(),
            )])),
            owner_references: Some(vec![owner.clone()]),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([
            (
                CONTROL_PLANE_CONFIG_KEY.to_string(),
                ByteString(control_plane_data.clone()),
            ),
            (WORKER_NODE_CONFIG_KEY.to_string(), ByteString(worker_data)),
            (LEGACY_CONFIG_KEY.to_string(), ByteString(control_plane_data)),
        ])),
        ..Secret::default()
    })
}

#[cfg(test)]
#[path = "cloud_config_tests.rs"]
mod cloud_config_tests;
