// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # capz-adopt - Ownership, adoption and secret reconciliation for Cluster API on Azure
//!
//! capz-adopt is the shared toolkit behind a set of Kubernetes controllers
//! that manage Azure infrastructure through Cluster API. It answers "which
//! object owns this one", keeps generated secrets in step with their owners,
//! guards shared identities with finalizers, and adopts AKS resources created
//! through Azure Service Operator (ASO) into Cluster API management.
//!
//! ## Overview
//!
//! - Owner-reference traversal across API groups and versions
//! - Finalizers on shared `AzureClusterIdentity` objects, with name migration
//! - Create-or-patch of generated secrets that never touches foreign secrets
//! - Adoption of annotated ASO `ManagedCluster` and `ManagedClustersAgentPool` objects
//! - Cloud provider configuration (`azure.json`) for workload clusters
//! - Watch fan-out mappers between infrastructure kinds
//!
//! ## Modules
//!
//! - [`store`] - object store trait with Kubernetes and in-memory backends
//! - [`ownership`] - owner-chain resolution and owner helpers
//! - [`finalizers`] - cluster identity finalizers
//! - [`secret`] - generated secret reconciliation
//! - [`adoption`] - ASO adoption orchestrator
//! - [`controllers`] - reconcile entry points for the adoption controllers
//! - [`cloud_config`] - cloud provider configuration secrets
//! - [`scope`] - cluster scope dispatch by infrastructure kind
//! - [`mappers`] - watch mapping functions
//!
//! ## Example
//!
//! ```rust,no_run
//! use capz_adopt::context::OpContext;
//! use capz_adopt::kinds::{GroupKind, ResourceKind};
//! use capz_adopt::ownership::resolve_owner_chain;
//! use capz_adopt::store::{MemoryStore, ObjectStore};
//!
//! # async fn example(store: MemoryStore) -> capz_adopt::errors::Result<()> {
//! let ctx = OpContext::new();
//! let pool = store
//!     .get(&ctx, &ResourceKind::aks_agent_pool(), "ns1", "pool-a")
//!     .await?;
//! let control_plane = resolve_owner_chain(
//!     &store,
//!     &ctx,
//!     &pool,
//!     &[
//!         GroupKind::new("containerservice.azure.com", "ManagedCluster"),
//!         GroupKind::new("infrastructure.cluster.x-k8s.io", "AzureASOManagedControlPlane"),
//!     ],
//! )
//! .await?;
//! println!("adopted under {:?}", control_plane.metadata.name);
//! # Ok(())
//! # }
//! ```

pub mod adoption;
pub mod annotations;
pub mod cloud_config;
pub mod config;
pub mod constants;
pub mod context;
pub mod controllers;
pub mod crd;
pub mod errors;
pub mod finalizers;
pub mod kinds;
pub mod labels;
pub mod mappers;
pub mod metrics;
pub mod ownership;
pub mod resources;
pub mod scope;
pub mod secret;
pub mod selector;
pub mod store;
