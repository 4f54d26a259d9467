// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the ownership, adoption and secret reconciliation toolkit.
//!
//! The taxonomy mirrors how a level-triggered controller treats failures:
//!
//! - [`StoreError::NotFound`] - the object is absent; usually "nothing to do yet"
//! - [`StoreError::AlreadyExists`] - treated as success by every idempotent create
//! - [`ResolutionError::OwnerNotFound`] - a required owner link is missing; retryable
//! - [`ResolutionError::MalformedApiVersion`] - bad input from a co-installed resource
//! - [`StoreError::Cancelled`] / [`StoreError::TimedOut`] - the caller's context ended
//! - [`StoreError::Api`] - any other API failure; retried by the work queue
//!
//! Nothing here is fatal to the process. Every failure is returned to the
//! caller, which decides when to requeue.

use crate::kinds::GroupKind;
use thiserror::Error;

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist (HTTP 404)
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace that was searched (empty for cluster-scoped kinds)
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// An object with the same name already exists (HTTP 409, reason `AlreadyExists`)
    ///
    /// Idempotent creates treat this as success.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Kind of the existing object
        kind: String,
        /// Namespace of the existing object
        namespace: String,
        /// Name of the existing object
        name: String,
    },

    /// A write lost an optimistic concurrency race (HTTP 409, reason `Conflict`)
    #[error("conflict writing {kind} {namespace}/{name}: {reason}")]
    Conflict {
        /// Kind of the object being written
        kind: String,
        /// Namespace of the object being written
        namespace: String,
        /// Name of the object being written
        name: String,
        /// Message returned by the API server
        reason: String,
    },

    /// The operation context was cancelled before the call completed
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context's deadline passed before the call completed
    #[error("operation timed out after {timeout_ms}ms")]
    TimedOut {
        /// The timeout budget that was exceeded, in milliseconds
        timeout_ms: u64,
    },

    /// The object handed to the store cannot be written (missing name, unknown kind)
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Converting between typed and dynamic representations failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other Kubernetes API failure
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`StoreError::AlreadyExists`].
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` when the caller's context ended the call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut { .. })
    }
}

/// Errors raised while resolving owners, kinds or scopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No owner reference matched the requested hop
    #[error("{kind} {namespace}/{name} has no owner of kind {hop}")]
    OwnerNotFound {
        /// The (group, kind) that was searched for
        hop: GroupKind,
        /// Kind of the object whose owners were scanned
        kind: String,
        /// Namespace of the object whose owners were scanned
        namespace: String,
        /// Name of the object whose owners were scanned
        name: String,
    },

    /// An `apiVersion` string could not be parsed into group and version
    #[error("unexpected GroupVersion string: {0}")]
    MalformedApiVersion(String),

    /// The infrastructure kind has no registered scope constructor
    #[error("unsupported infrastructure type {0:?}, should be AzureCluster or AzureManagedCluster")]
    UnsupportedKind(String),

    /// A field needed to continue resolution is absent
    #[error("{kind} {namespace}/{name} is missing required field {field}")]
    MissingField {
        /// Kind of the incomplete object
        kind: String,
        /// Namespace of the incomplete object
        namespace: String,
        /// Name of the incomplete object
        name: String,
        /// JSON path of the missing field
        field: String,
    },
}

/// Errors raised while building the cloud provider configuration secret.
#[derive(Error, Debug)]
pub enum CloudConfigError {
    /// A user-assigned identity was requested without an identity id
    #[error("expected a non-empty userIdentityID")]
    EmptyUserIdentity,

    /// Serializing one of the configurations failed
    #[error("failed {role} json marshal: {source}")]
    Marshal {
        /// Which configuration failed (`control plane` or `worker node`)
        role: &'static str,
        /// Underlying serializer error
        source: serde_json::Error,
    },
}

/// Top-level error for toolkit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Object store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Owner, kind or scope resolution failure
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Cloud provider configuration failure
    #[error(transparent)]
    CloudConfig(#[from] CloudConfigError),

    /// The cluster's namespace is not in the identity's allowed namespaces
    #[error("AzureClusterIdentity {identity} list of allowed namespaces doesn't include current cluster namespace {namespace}")]
    NamespaceNotAllowed {
        /// Name of the `AzureClusterIdentity`
        identity: String,
        /// Namespace that was refused
        namespace: String,
    },

    /// Converting between typed and dynamic representations failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` when the root cause is a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }

    /// Returns `true` when requeueing may let the operation succeed later.
    ///
    /// Only errors caused by the object's own content (a user identity that
    /// will never be filled in by retrying) are not retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::CloudConfig(CloudConfigError::EmptyUserIdentity)
                | Self::Resolution(ResolutionError::UnsupportedKind(_))
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
