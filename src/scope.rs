// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster scope resolution.
//!
//! A Cluster API `Cluster` points at its infrastructure through
//! `spec.infrastructureRef`. The kind of that reference decides which object
//! carries the Azure settings of the cluster:
//!
//! | Infrastructure kind   | Object read                                     |
//! |-----------------------|-------------------------------------------------|
//! | `AzureCluster`        | the `AzureCluster` named by `infrastructureRef` |
//! | `AzureManagedCluster` | the `AzureManagedControlPlane` named by `controlPlaneRef` |
//!
//! The dispatch is the [`SCOPE_KINDS`] table; adding a scope kind means adding
//! a row and a constructor, never another string comparison.

use crate::constants::{
    CLIENT_SECRET_KEY, DEFAULT_AZURE_ENVIRONMENT, KIND_AZURE_CLUSTER, KIND_AZURE_MANAGED_CLUSTER,
    MANAGED_OUTBOUND_LB_NAME, SUBNET_ROLE_NODE,
};
use crate::context::OpContext;
use crate::crd::{
    AzureCluster, AzureClusterIdentity, AzureManagedControlPlane, Cluster,
    CloudProviderConfigOverrides, NamedResource, SubnetSpec, VnetSpec,
};
use crate::errors::{ResolutionError, Result};
use crate::kinds::ResourceKind;
use crate::resources::from_dynamic;
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use std::fmt;
use tracing::debug;

/// Read-only view of a cluster's Azure settings.
///
/// Implemented by [`ClusterScope`]; the cloud provider configuration builder
/// depends only on this trait.
pub trait ClusterScoper: Send + Sync {
    /// Name of the Cluster API `Cluster`.
    fn cluster_name(&self) -> &str;
    /// Azure cloud name.
    fn cloud_environment(&self) -> &str;
    /// Azure AD tenant.
    fn tenant_id(&self) -> &str;
    /// Service principal client id; empty when none is configured.
    fn client_id(&self) -> &str;
    /// Service principal secret; empty when none is configured.
    fn client_secret(&self) -> &str;
    /// Subscription id.
    fn subscription_id(&self) -> &str;
    /// Resource group of the cluster.
    fn resource_group(&self) -> &str;
    /// Azure region.
    fn location(&self) -> &str;
    /// Extended location name; empty when the cluster is not in an edge zone.
    fn extended_location_name(&self) -> &str;
    /// Extended location type; empty when the cluster is not in an edge zone.
    fn extended_location_type(&self) -> &str;
    /// Virtual network of the cluster.
    fn vnet(&self) -> &VnetSpec;
    /// Subnets of the cluster, in declaration order.
    fn subnets(&self) -> &[SubnetSpec];
    /// Name of the outbound load balancer used by machines of `role`.
    fn outbound_lb_name(&self, role: &str) -> String;
    /// Cloud provider overrides, if the cluster sets any.
    fn cloud_provider_config_overrides(&self) -> Option<&CloudProviderConfigOverrides>;
}

/// Which infrastructure object a cluster scope is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Self-managed cluster backed by an `AzureCluster`
    AzureCluster,
    /// AKS cluster backed by an `AzureManagedControlPlane`
    AzureManagedCluster,
}

/// Infrastructure kind string to scope kind.
pub const SCOPE_KINDS: &[(&str, ScopeKind)] = &[
    (KIND_AZURE_CLUSTER, ScopeKind::AzureCluster),
    (KIND_AZURE_MANAGED_CLUSTER, ScopeKind::AzureManagedCluster),
];

impl ScopeKind {
    /// Look up the scope kind of an infrastructure kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedKind`] for kinds missing from [`SCOPE_KINDS`].
    pub fn from_infrastructure_kind(kind: &str) -> Result<Self, ResolutionError> {
        SCOPE_KINDS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, scope)| *scope)
            .ok_or_else(|| ResolutionError::UnsupportedKind(kind.to_string()))
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AzureCluster => f.write_str(KIND_AZURE_CLUSTER),
            Self::AzureManagedCluster => f.write_str(KIND_AZURE_MANAGED_CLUSTER),
        }
    }
}

/// Credentials read from an `AzureClusterIdentity`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Azure AD tenant
    pub tenant_id: String,
    /// Client id
    pub client_id: String,
    /// Client secret, if the identity references one
    pub client_secret: String,
}

/// Resolved Azure settings of one cluster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterScope {
    /// Which infrastructure object the settings came from
    pub kind: Option<ScopeKind>,
    /// Cluster API `Cluster` name
    pub cluster_name: String,
    /// Namespace of the cluster
    pub namespace: String,
    /// Azure cloud name
    pub cloud_environment: String,
    /// Credentials of the referenced identity
    pub credentials: Credentials,
    /// Subscription id
    pub subscription_id: String,
    /// Resource group
    pub resource_group: String,
    /// Azure region
    pub location: String,
    /// Extended location (name, type)
    pub extended_location: Option<(String, String)>,
    /// Virtual network
    pub vnet: VnetSpec,
    /// Subnets
    pub subnets: Vec<SubnetSpec>,
    /// Outbound load balancer of worker nodes
    pub node_outbound_lb: Option<String>,
    /// Cloud provider overrides
    pub overrides: Option<CloudProviderConfigOverrides>,
}

impl ClusterScope {
    /// Build a scope from an `AzureCluster`.
    #[must_use]
    pub fn from_azure_cluster(
        cluster_name: &str,
        azure_cluster: &AzureCluster,
        credentials: Credentials,
    ) -> Self {
        let spec = &azure_cluster.spec;
        let mut vnet = spec.network_spec.vnet.clone();
        if vnet.resource_group.is_empty() {
            vnet.resource_group.clone_from(&spec.resource_group);
        }

        Self {
            kind: Some(ScopeKind::AzureCluster),
            cluster_name: cluster_name.to_string(),
            namespace: azure_cluster.metadata.namespace.clone().unwrap_or_default(),
            cloud_environment: environment_or_default(spec.azure_environment.as_deref()),
            credentials,
            subscription_id: spec.subscription_id.clone(),
            resource_group: spec.resource_group.clone(),
            location: spec.location.clone(),
            extended_location: spec
                .extended_location
                .as_ref()
                .map(|e| (e.name.clone(), e.location_type.clone())),
            vnet,
            subnets: spec.network_spec.subnets.clone(),
            node_outbound_lb: spec
                .network_spec
                .node_outbound_lb
                .as_ref()
                .map(|lb| lb.name.clone()),
            overrides: spec.cloud_provider_config_overrides.clone(),
        }
    }

    /// Build a scope from an `AzureManagedControlPlane`.
    ///
    /// AKS exposes a single node subnet and always names its outbound load
    /// balancer `kubernetes`.
    #[must_use]
    pub fn from_managed_control_plane(
        cluster_name: &str,
        control_plane: &AzureManagedControlPlane,
        credentials: Credentials,
    ) -> Self {
        let spec = &control_plane.spec;
        let network = &spec.virtual_network;
        let resource_group = if network.resource_group.is_empty() {
            spec.resource_group_name.clone()
        } else {
            network.resource_group.clone()
        };

        Self {
            kind: Some(ScopeKind::AzureManagedCluster),
            cluster_name: cluster_name.to_string(),
            namespace: control_plane.metadata.namespace.clone().unwrap_or_default(),
            cloud_environment: environment_or_default(spec.azure_environment.as_deref()),
            credentials,
            subscription_id: spec.subscription_id.clone(),
            resource_group: spec.resource_group_name.clone(),
            location: spec.location.clone(),
            extended_location: None,
            vnet: VnetSpec {
                name: network.name.clone(),
                resource_group,
            },
            subnets: vec![SubnetSpec {
                name: network.subnet.name.clone(),
                role: SUBNET_ROLE_NODE.to_string(),
                security_group: NamedResource::default(),
                route_table: NamedResource::default(),
            }],
            node_outbound_lb: Some(MANAGED_OUTBOUND_LB_NAME.to_string()),
            overrides: None,
        }
    }
}

fn environment_or_default(environment: Option<&str>) -> String {
    environment
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_AZURE_ENVIRONMENT)
        .to_string()
}

impl ClusterScoper for ClusterScope {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    fn cloud_environment(&self) -> &str {
        &self.cloud_environment
    }

    fn tenant_id(&self) -> &str {
        &self.credentials.tenant_id
    }

    fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    fn client_secret(&self) -> &str {
        &self.credentials.client_secret
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn resource_group(&self) -> &str {
        &self.resource_group
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn extended_location_name(&self) -> &str {
        self.extended_location.as_ref().map_or("", |(name, _)| name)
    }

    fn extended_location_type(&self) -> &str {
        self.extended_location
            .as_ref()
            .map_or("", |(_, location_type)| location_type)
    }

    fn vnet(&self) -> &VnetSpec {
        &self.vnet
    }

    fn subnets(&self) -> &[SubnetSpec] {
        &self.subnets
    }

    fn outbound_lb_name(&self, role: &str) -> String {
        match self.kind {
            Some(ScopeKind::AzureManagedCluster) => MANAGED_OUTBOUND_LB_NAME.to_string(),
            _ if role == SUBNET_ROLE_NODE => self.node_outbound_lb.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn cloud_provider_config_overrides(&self) -> Option<&CloudProviderConfigOverrides> {
        self.overrides.as_ref()
    }
}

fn ref_name(reference: Option<&ObjectReference>) -> &str {
    reference.and_then(|r| r.name.as_deref()).unwrap_or_default()
}

/// Read the credentials of the identity `identity_ref` points at.
///
/// A missing reference yields empty credentials. The reference's namespace
/// defaults to `namespace`.
///
/// # Errors
///
/// Returns the store error from fetching the identity or its secret.
pub async fn load_credentials(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    namespace: &str,
    identity_ref: Option<&ObjectReference>,
) -> Result<Credentials> {
    let Some(identity_ref) = identity_ref else {
        return Ok(Credentials::default());
    };
    let identity_namespace = identity_ref
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(namespace);

    let identity: AzureClusterIdentity = from_dynamic(
        &store
            .get(
                ctx,
                &ResourceKind::azure_cluster_identity(),
                identity_namespace,
                ref_name(Some(identity_ref)),
            )
            .await?,
    )?;

    let client_secret = match identity.spec.client_secret.as_ref() {
        Some(secret_ref) => {
            let secret_namespace = secret_ref
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(identity_namespace);
            let secret: Secret = from_dynamic(
                &store
                    .get(
                        ctx,
                        &ResourceKind::secret(),
                        secret_namespace,
                        secret_ref.name.as_deref().unwrap_or_default(),
                    )
                    .await?,
            )?;
            secret
                .data
                .as_ref()
                .and_then(|data| data.get(CLIENT_SECRET_KEY))
                .map(|value| String::from_utf8_lossy(&value.0).into_owned())
                .unwrap_or_default()
        }
        None => String::new(),
    };

    Ok(Credentials {
        tenant_id: identity.spec.tenant_id,
        client_id: identity.spec.client_id,
        client_secret,
    })
}

/// Resolve the cluster scope of `cluster`.
///
/// # Errors
///
/// Returns [`ResolutionError::UnsupportedKind`] when the infrastructure kind
/// has no scope constructor, or the store error from fetching the
/// infrastructure object or its identity.
pub async fn resolve_cluster_scope(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    cluster: &Cluster,
) -> Result<ClusterScope> {
    let cluster_name = cluster.metadata.name.clone().unwrap_or_default();
    let cluster_namespace = cluster.metadata.namespace.clone().unwrap_or_default();
    let infra_ref = cluster.spec.infrastructure_ref.as_ref();
    let infra_kind = infra_ref.and_then(|r| r.kind.as_deref()).unwrap_or_default();
    let infra_namespace = infra_ref
        .and_then(|r| r.namespace.as_deref())
        .filter(|ns| !ns.is_empty())
        .unwrap_or(&cluster_namespace);

    match ScopeKind::from_infrastructure_kind(infra_kind)? {
        ScopeKind::AzureCluster => {
            let name = ref_name(infra_ref);
            debug!(namespace = %infra_namespace, name = %name, "Resolving AzureCluster scope");
            let azure_cluster: AzureCluster = from_dynamic(
                &store
                    .get(ctx, &ResourceKind::azure_cluster(), infra_namespace, name)
                    .await?,
            )?;
            let credentials = load_credentials(
                store,
                ctx,
                infra_namespace,
                azure_cluster.spec.identity_ref.as_ref(),
            )
            .await?;
            Ok(ClusterScope::from_azure_cluster(
                &cluster_name,
                &azure_cluster,
                credentials,
            ))
        }
        ScopeKind::AzureManagedCluster => {
            let name = ref_name(cluster.spec.control_plane_ref.as_ref());
            debug!(
                namespace = %infra_namespace,
                name = %name,
                "Resolving AzureManagedControlPlane scope"
            );
            let control_plane: AzureManagedControlPlane = from_dynamic(
                &store
                    .get(
                        ctx,
                        &ResourceKind::azure_managed_control_plane(),
                        infra_namespace,
                        name,
                    )
                    .await?,
            )?;
            let credentials = load_credentials(
                store,
                ctx,
                infra_namespace,
                control_plane.spec.identity_ref.as_ref(),
            )
            .await?;
            Ok(ClusterScope::from_managed_control_plane(
                &cluster_name,
                &control_plane,
                credentials,
            ))
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod scope_tests;
