// src/lib.rs

//! `exprun` is a run-execution engine for experiment launchers.
//!
//! One *run* is a single execution of an experiment instance/repetition
//! combination. The engine compiles live configuration into an immutable
//! [`manifest::RunManifest`], claims the run through filesystem markers (the
//! only coordination medium; there is no server and no shared memory), then
//! supervises the child process: soft timeout, lazily captured stderr, and an
//! atomically published status record.
//!
//! Argument parsing, configuration-file loading and any scheduling backend
//! that decides *when* to launch live in the embedding application.

pub mod config;
pub mod coord;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod manifest;
pub mod paths;

use tracing::info;

use crate::errors::Result;
use crate::manifest::{RunManifest, StatusRecord};

/// High-level entry point: take a compiled manifest through the whole run
/// lifecycle.
///
/// This wires together:
/// - directory creation
/// - lock acquisition (`Ok(None)` when another launcher already claimed
///   the run, which is a normal outcome, not an error)
/// - the submitted marker
/// - process supervision through to the status marker
pub async fn launch(manifest: &RunManifest) -> Result<Option<StatusRecord>> {
    coord::ensure_directories(manifest)?;

    if !coord::acquire_lock(manifest)? {
        info!(
            experiment = %manifest.experiment,
            instance = %manifest.instance,
            "run already claimed, skipping"
        );
        return Ok(None);
    }
    coord::mark_submitted(manifest)?;

    let record = exec::execute(manifest).await?;
    Ok(Some(record))
}
