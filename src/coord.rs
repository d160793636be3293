// src/coord.rs

//! Filesystem coordination for runs: directories, the lock marker and the
//! submitted marker.
//!
//! The filesystem is the only coordination medium between launchers. The lock
//! marker is a try-once, ownerless mutex: one atomic exclusive create decides
//! which of any number of concurrent launchers gets the run. A lock that is
//! already present may belong to a live launcher or to a crashed one; this
//! module deliberately does not tell the two apart.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::manifest::RunManifest;

/// Idempotently create the aux and output directory hierarchy for a run.
pub fn ensure_directories(manifest: &RunManifest) -> Result<()> {
    for dir in [
        manifest.config.base_dir.join("aux"),
        manifest.config.base_dir.join("output"),
        manifest.aux_subdir(),
        manifest.output_subdir(),
    ] {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating run directory {}", dir.display()))?;
    }
    Ok(())
}

/// Try to claim the run by creating its `lock` marker.
///
/// The check-and-create is a single `O_CREAT | O_EXCL` open; a separate
/// existence probe followed by a create would race against other launchers.
/// `Ok(false)` means someone else holds (or held) the lock and is a normal
/// outcome, not an error. Past a successful acquisition, concurrent access to
/// the run's files is treated as a bug and fails hard.
pub fn acquire_lock(manifest: &RunManifest) -> Result<bool> {
    let lock_path = manifest.aux_file_path("lock");
    match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
        Ok(_) => {
            debug!(path = %lock_path.display(), "acquired run lock");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!(
                experiment = %manifest.experiment,
                instance = %manifest.instance,
                "lock marker already exists; run is claimed or a launcher crashed"
            );
            Ok(false)
        }
        Err(e) => {
            Err(e).with_context(|| format!("creating lock marker {}", lock_path.display()))
        }
    }
}

/// Publish the `run` marker, signalling that the run has been submitted.
///
/// Caller contract: at most once, and only after `acquire_lock` returned
/// true for the same run.
pub fn mark_submitted(manifest: &RunManifest) -> Result<()> {
    write_marker_atomic(&manifest.aux_file_path("run"), b"")
}

/// Write a marker file so that observers never see a partial one: write to a
/// uniquely named sibling temp file, then rename into place. The pid in the
/// temp name keeps concurrent writers from clobbering each other's staging
/// files.
pub(crate) fn write_marker_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("marker path {} has no file name", dest.display()))?;
    let tmp = dest.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    fs::write(&tmp, contents)
        .with_context(|| format!("writing staging file {}", tmp.display()))?;
    fs::rename(&tmp, dest)
        .with_context(|| format!("renaming {} into place", dest.display()))?;
    Ok(())
}
