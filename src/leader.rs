// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader election over a `coordination.k8s.io` Lease.
//!
//! Only one replica runs the controllers. [`acquire`] blocks until this
//! replica holds the lease; [`Leadership::lost`] resolves when it is gone, at
//! which point the process exits and the next replica takes over.

use crate::config::OperatorConfig;
use crate::constants::{DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS};
use crate::metrics::{record_leader_elected, record_leader_lost};
use anyhow::{Context, Result};
use kube::Client;
use kube_lease_manager::LeaseManagerBuilder;
use tokio::sync::watch;
use tracing::{info, warn};

/// A held lease.
pub struct Leadership {
    identity: String,
    state: watch::Receiver<bool>,
}

impl Leadership {
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Resolves once the lease is no longer held by this replica.
    pub async fn lost(&mut self) {
        loop {
            if !*self.state.borrow_and_update() {
                break;
            }
            if self.state.changed().await.is_err() {
                warn!("Lease manager stopped");
                break;
            }
        }
        record_leader_lost(&self.identity);
    }
}

/// Blocks until the lease named in `config` is held by this replica.
///
/// # Errors
///
/// Returns an error if the lease manager cannot be built or stops before
/// leadership is obtained.
pub async fn acquire(client: Client, config: &OperatorConfig) -> Result<Leadership> {
    let identity = config.identity();
    let namespace = config.lease_namespace().to_string();
    info!(
        lease = %config.lease_name,
        namespace = %namespace,
        identity = %identity,
        "Waiting for leadership"
    );

    let manager = LeaseManagerBuilder::new(client, &config.lease_name)
        .with_namespace(&namespace)
        .with_identity(&identity)
        .with_duration(DEFAULT_LEASE_DURATION_SECS)
        .with_grace(DEFAULT_LEASE_GRACE_SECS)
        .build()
        .await
        .context("failed to build lease manager")?;

    // The task keeps renewing the lease for as long as the receiver lives.
    let (mut state, _task) = manager.watch().await;
    while !*state.borrow_and_update() {
        state
            .changed()
            .await
            .context("lease manager stopped before leadership was acquired")?;
    }

    info!(identity = %identity, "Acquired leadership");
    record_leader_elected(&identity);
    Ok(Leadership { identity, state })
}
