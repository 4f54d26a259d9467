// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile entry points for the adoption controllers.
//!
//! Each watched foreign kind gets a reconcile function with the signature
//! `kube::runtime::Controller::run` expects, plus a shared error policy.
//! Successful passes requeue after the configured success interval so a
//! partially adopted resource is revisited even without watch events.

use crate::adoption::{adopt, AdoptionState, AdoptionTarget};
use crate::context::Context;
use crate::errors::{Error, Result};
use crate::metrics;
use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run one adoption pass for `source` and decide when to look at it again.
///
/// # Errors
///
/// Returns the error that aborted the adoption pass.
pub async fn reconcile_adoption(
    source: Arc<DynamicObject>,
    ctx: Arc<Context>,
    target: AdoptionTarget,
) -> Result<Action> {
    let start = Instant::now();
    let namespace = source.metadata.namespace.as_deref().unwrap_or_default();
    let name = source.metadata.name.as_deref().unwrap_or_default();
    debug!(
        target = %target,
        namespace = %namespace,
        name = %name,
        "Reconcile wrapper called"
    );

    let op = ctx.reconcile_scope();
    let result = adopt(ctx.store.as_ref(), &op, &source, target).await;
    let duration = start.elapsed();
    let resource_type = target.to_string();

    match result {
        Ok(outcome) => {
            metrics::record_reconciliation_success(&resource_type, duration);
            if outcome.state == AdoptionState::PendingAdoption {
                info!(
                    target = %target,
                    namespace = %namespace,
                    name = %name,
                    created = ?outcome.created,
                    "Successfully reconciled adoption"
                );
            }
            Ok(Action::requeue(ctx.config.requeue_success()))
        }
        Err(e) => {
            metrics::record_reconciliation_error(&resource_type, duration);
            error!(
                target = %target,
                namespace = %namespace,
                name = %name,
                error = %e,
                "Failed to reconcile adoption"
            );
            Err(e)
        }
    }
}

/// Reconcile an ASO `ManagedCluster`.
///
/// # Errors
///
/// See [`reconcile_adoption`].
pub async fn reconcile_managed_cluster(source: Arc<DynamicObject>, ctx: Arc<Context>) -> Result<Action> {
    reconcile_adoption(source, ctx, AdoptionTarget::ManagedCluster).await
}

/// Reconcile an ASO `ManagedClustersAgentPool`.
///
/// # Errors
///
/// See [`reconcile_adoption`].
pub async fn reconcile_agent_pool(source: Arc<DynamicObject>, ctx: Arc<Context>) -> Result<Action> {
    reconcile_adoption(source, ctx, AdoptionTarget::AgentPool).await
}

/// What to do after a failed reconcile.
///
/// Retryable errors requeue after the configured error interval. Errors that
/// depend only on the object's own content wait for the object to change.
#[must_use]
pub fn error_action(source: &DynamicObject, err: &Error, ctx: &Context) -> Action {
    let kind = source
        .types
        .as_ref()
        .map(|t| t.kind.as_str())
        .unwrap_or_default();

    if err.is_retryable() {
        metrics::record_reconciliation_requeue(kind);
        Action::requeue(ctx.config.requeue_error())
    } else {
        warn!(
            kind = %kind,
            namespace = ?source.metadata.namespace,
            name = ?source.metadata.name,
            error = %err,
            "Not retrying until the resource changes"
        );
        Action::await_change()
    }
}

#[cfg(test)]
#[path = "controllers_tests.rs"]
mod controllers_tests;
