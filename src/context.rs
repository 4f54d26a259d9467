// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operation contexts and the shared controller context.
//!
//! Every object store call is bound to an [`OpContext`]: a cancellation token
//! plus an optional deadline. Cancelling the context, or letting its deadline
//! pass, aborts the in-flight call and surfaces [`StoreError::Cancelled`] or
//! [`StoreError::TimedOut`] rather than a misleading `NotFound`.
//!
//! Contexts form a tree. A child created with [`OpContext::with_timeout`]
//! is cancelled together with its parent and never outlives the parent's
//! deadline.

use crate::config::ControllerConfig;
use crate::errors::StoreError;
use crate::store::ObjectStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline scope for object store calls.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl OpContext {
    /// A root context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A root context driven by an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            timeout: None,
        }
    }

    /// A child context that times out after `timeout`, or at the parent's
    /// deadline if that comes first.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let (deadline, timeout) = match self.deadline {
            Some(parent) if parent <= candidate => (parent, self.timeout.unwrap_or(timeout)),
            _ => (candidate, timeout),
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            timeout: Some(timeout),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The instant after which calls fail with [`StoreError::TimedOut`].
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Cancelled`] if the context is (or becomes)
    /// cancelled, [`StoreError::TimedOut`] if the deadline passes, and
    /// otherwise whatever `fut` returns.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.token.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let timeout_ms = self
            .timeout
            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| StoreError::TimedOut { timeout_ms })?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(StoreError::Cancelled),
            result = bounded => result,
        }
    }
}

/// Shared context passed to every controller.
#[derive(Clone)]
pub struct Context {
    /// Object store used for all reads and writes
    pub store: Arc<dyn ObjectStore>,

    /// Controller configuration
    pub config: Arc<ControllerConfig>,

    /// Root cancellation token, cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl Context {
    /// Build a shared context.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// A fresh operation context for one reconcile, bounded by the configured
    /// operation timeout and cancelled on shutdown.
    #[must_use]
    pub fn reconcile_scope(&self) -> OpContext {
        OpContext::from_token(self.shutdown.child_token())
            .with_timeout(self.config.operation_timeout())
    }

    /// A fresh operation context for one watch-mapping fan-out, bounded by
    /// the short mapping timeout.
    #[must_use]
    pub fn mapping_scope(&self) -> OpContext {
        OpContext::from_token(self.shutdown.child_token())
            .with_timeout(self.config.mapping_timeout())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
