// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adoption of ASO-managed AKS resources into Cluster API.
//!
//! A user opts a foreign resource in by annotating it with
//! `sigs.k8s.io/cluster-api-provider-azure-adopt: "true"`. Each reconcile
//! classifies the resource into an [`AdoptionState`]; only
//! [`AdoptionState::PendingAdoption`] does any work.
//!
//! | Source                     | Native objects created, in order                                  |
//! |----------------------------|-------------------------------------------------------------------|
//! | ASO `ManagedCluster`       | `Cluster`, `AzureASOManagedCluster`, `AzureASOManagedControlPlane` |
//! | ASO `ManagedClustersAgentPool` | `AzureASOManagedMachinePool`, `MachinePool`                   |
//!
//! Every create tolerates `AlreadyExists`, so an interrupted adoption simply
//! resumes on the next reconcile.
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_adopt::adoption::{adopt, AdoptionTarget};
//! use capz_adopt::context::OpContext;
//! use capz_adopt::kinds::ResourceKind;
//! use capz_adopt::store::{MemoryStore, ObjectStore};
//!
//! # async fn example(store: MemoryStore) -> capz_adopt::errors::Result<()> {
//! let ctx = OpContext::new();
//! let pool = store
//!     .get(&ctx, &ResourceKind::aks_agent_pool(), "ns1", "pool-a")
//!     .await?;
//! let outcome = adopt(&store, &ctx, &pool, AdoptionTarget::AgentPool).await?;
//! println!("created {:?}", outcome.created);
//! # Ok(())
//! # }
//! ```

pub mod agent_pool;
pub mod managed_cluster;

use crate::constants::{KIND_ASO_AGENT_POOL, KIND_ASO_AKS_CLUSTER};
use crate::context::OpContext;
use crate::errors::{ResolutionError, Result, StoreError};
use crate::kinds::{GroupKind, ResourceKind};
use crate::labels::{ADOPT_ANNOTATION, ADOPT_ANNOTATION_VALUE};
use crate::ownership::has_owner_of_kind;
use crate::resources::create_or_get;
use crate::store::ObjectStore;
use kube::api::DynamicObject;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, info};

/// Where a foreign resource stands in the adoption lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdoptionState {
    /// No adoption annotation, or a value other than `"true"`
    NotRequested,
    /// The resource already has an owner of the expected native kind
    AlreadyAdopted,
    /// Requested and not yet owned; native objects must be constructed
    PendingAdoption,
}

impl AdoptionState {
    /// Metric and log label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRequested => "not_requested",
            Self::AlreadyAdopted => "already_adopted",
            Self::PendingAdoption => "pending_adoption",
        }
    }
}

impl fmt::Display for AdoptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native objects the adoption flows construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeKind {
    /// Cluster API `Cluster`
    Cluster,
    /// Cluster API `MachinePool`
    MachinePool,
    /// `AzureASOManagedCluster` wrapping the resource group
    ManagedCluster,
    /// `AzureASOManagedControlPlane` wrapping the AKS cluster
    ManagedControlPlane,
    /// `AzureASOManagedMachinePool` wrapping the agent pool
    ManagedMachinePool,
}

impl NativeKind {
    /// Store address of this kind.
    #[must_use]
    pub fn resource_kind(self) -> ResourceKind {
        match self {
            Self::Cluster => ResourceKind::cluster(),
            Self::MachinePool => ResourceKind::machine_pool(),
            Self::ManagedCluster => ResourceKind::aso_managed_cluster(),
            Self::ManagedControlPlane => ResourceKind::aso_managed_control_plane(),
            Self::ManagedMachinePool => ResourceKind::aso_managed_machine_pool(),
        }
    }
}

/// Foreign resource types that can be adopted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdoptionTarget {
    /// ASO `ManagedCluster`
    ManagedCluster,
    /// ASO `ManagedClustersAgentPool`
    AgentPool,
}

/// Source kind to adoption target.
pub const ADOPTION_TARGETS: &[(&str, AdoptionTarget)] = &[
    (KIND_ASO_AKS_CLUSTER, AdoptionTarget::ManagedCluster),
    (KIND_ASO_AGENT_POOL, AdoptionTarget::AgentPool),
];

impl AdoptionTarget {
    /// Look up the target for a source kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedKind`] for kinds missing from [`ADOPTION_TARGETS`].
    pub fn from_source_kind(kind: &str) -> Result<Self, ResolutionError> {
        ADOPTION_TARGETS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, target)| *target)
            .ok_or_else(|| ResolutionError::UnsupportedKind(kind.to_string()))
    }

    /// Store address of the source kind.
    #[must_use]
    pub fn source_kind(self) -> ResourceKind {
        match self {
            Self::ManagedCluster => ResourceKind::aks_managed_cluster(),
            Self::AgentPool => ResourceKind::aks_agent_pool(),
        }
    }

    /// The owner kind whose presence marks the source as adopted.
    #[must_use]
    pub fn adopted_by(self) -> GroupKind {
        match self {
            Self::ManagedCluster => ResourceKind::aso_managed_control_plane().group_kind(),
            Self::AgentPool => ResourceKind::aso_managed_machine_pool().group_kind(),
        }
    }

    /// Owner hops resolved before construction.
    #[must_use]
    pub fn owner_chain(self) -> Vec<GroupKind> {
        match self {
            Self::ManagedCluster => Vec::new(),
            Self::AgentPool => vec![
                ResourceKind::aks_managed_cluster().group_kind(),
                ResourceKind::aso_managed_control_plane().group_kind(),
            ],
        }
    }

    /// Native objects created, in creation order.
    #[must_use]
    pub fn creates(self) -> &'static [NativeKind] {
        match self {
            Self::ManagedCluster => &[
                NativeKind::Cluster,
                NativeKind::ManagedCluster,
                NativeKind::ManagedControlPlane,
            ],
            Self::AgentPool => &[NativeKind::ManagedMachinePool, NativeKind::MachinePool],
        }
    }
}

impl fmt::Display for AdoptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagedCluster => f.write_str(KIND_ASO_AKS_CLUSTER),
            Self::AgentPool => f.write_str(KIND_ASO_AGENT_POOL),
        }
    }
}

/// One adoption attempt, derived from the source object on each reconcile.
#[derive(Clone, Debug)]
pub struct AdoptionRequest {
    /// The foreign resource
    pub source: DynamicObject,
    /// Which flow adopts it
    pub target: AdoptionTarget,
    /// Owner hops resolved before construction
    pub owner_chain: Vec<GroupKind>,
}

impl AdoptionRequest {
    /// Build the request for `source`.
    #[must_use]
    pub fn new(source: DynamicObject, target: AdoptionTarget) -> Self {
        Self {
            owner_chain: target.owner_chain(),
            source,
            target,
        }
    }

    pub(crate) fn namespace(&self) -> &str {
        self.source.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub(crate) fn name(&self) -> &str {
        self.source.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Result of one [`adopt`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdoptionOutcome {
    /// State the source was in when the call started
    pub state: AdoptionState,
    /// Native objects this call created, as `Kind/name`
    pub created: Vec<String>,
}

/// Classify `source` for `target`.
#[must_use]
pub fn adoption_state(source: &DynamicObject, target: AdoptionTarget) -> AdoptionState {
    let requested = source
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ADOPT_ANNOTATION))
        .is_some_and(|v| v == ADOPT_ANNOTATION_VALUE);
    if !requested {
        return AdoptionState::NotRequested;
    }
    if has_owner_of_kind(&source.metadata, &target.adopted_by()) {
        return AdoptionState::AlreadyAdopted;
    }
    AdoptionState::PendingAdoption
}

/// Strip an object down to `apiVersion`, `kind`, `metadata.name` and `spec`.
///
/// Status, resource version, managed fields, labels and every other field
/// are dropped so the copy can be embedded as a template.
///
/// # Errors
///
/// Returns [`StoreError::InvalidObject`] if the object has no type metadata.
pub fn filter_for_template(obj: &DynamicObject) -> Result<Value, StoreError> {
    let types = obj.types.as_ref().ok_or_else(|| {
        StoreError::InvalidObject(format!(
            "{} has no apiVersion/kind",
            obj.metadata.name.as_deref().unwrap_or_default()
        ))
    })?;

    let mut filtered = Map::new();
    filtered.insert("apiVersion".to_string(), json!(types.api_version));
    filtered.insert("kind".to_string(), json!(types.kind));
    filtered.insert(
        "metadata".to_string(),
        json!({ "name": obj.metadata.name.clone().unwrap_or_default() }),
    );
    if let Some(spec) = obj.data.get("spec") {
        filtered.insert("spec".to_string(), spec.clone());
    }
    Ok(Value::Object(filtered))
}

/// Create `obj` unless it exists; record it in `created` when this call created it.
///
/// Returns the stored object, which carries the server-assigned `uid`.
pub(crate) async fn ensure_native(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    obj: &DynamicObject,
    created: &mut Vec<String>,
) -> Result<DynamicObject> {
    let (stored, was_created) = create_or_get(store, ctx, obj).await?;
    if was_created {
        let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default();
        created.push(format!(
            "{kind}/{}",
            obj.metadata.name.as_deref().unwrap_or_default()
        ));
    }
    Ok(stored)
}

/// Run one adoption attempt for `source`.
///
/// Sources that are not requested or already adopted are left alone. For a
/// pending adoption the native objects are created in dependency order.
///
/// # Errors
///
/// Returns the resolution or store error that aborted the attempt. Objects
/// created before the failure stay in place and are skipped on retry.
pub async fn adopt(
    store: &dyn ObjectStore,
    ctx: &OpContext,
    source: &DynamicObject,
    target: AdoptionTarget,
) -> Result<AdoptionOutcome> {
    let state = adoption_state(source, target);
    let namespace = source.metadata.namespace.as_deref().unwrap_or_default();
    let name = source.metadata.name.as_deref().unwrap_or_default();

    if state != AdoptionState::PendingAdoption {
        debug!(
            target = %target,
            namespace = %namespace,
            name = %name,
            state = %state,
            "Nothing to adopt"
        );
        return Ok(AdoptionOutcome {
            state,
            created: Vec::new(),
        });
    }

    let request = AdoptionRequest::new(source.clone(), target);
    let created = match target {
        AdoptionTarget::ManagedCluster => managed_cluster::adopt_managed_cluster(store, ctx, &request).await?,
        AdoptionTarget::AgentPool => agent_pool::adopt_agent_pool(store, ctx, &request).await?,
    };

    info!(
        target = %target,
        namespace = %namespace,
        name = %name,
        created = created.len(),
        "Adoption pass complete"
    );
    Ok(AdoptionOutcome { state, created })
}
