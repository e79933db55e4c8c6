//! Preparing the output location before an export

use crate::{ExportError, Result};
use alphacomp_core::Destination;
use std::fs;
use std::path::Path;

/// Removes a previous output file and makes sure the parent directory exists.
///
/// A file that cannot be removed only produces a warning; the encoder reports
/// the problem later if it still matters. A parent path that is not a
/// directory after creation is an error.
#[tracing::instrument(level = "debug", skip_all, fields(path = %destination.path().display()))]
pub fn prepare_destination(destination: &Destination) -> Result<()> {
    let path = destination.path();
    let exists = path.symlink_metadata().is_ok();

    tracing::debug!(exists, "checking output path");

    if exists {
        if let Err(err) = fs::remove_file(path) {
            tracing::warn!(error = %err, "failed to remove existing output file");
        }
    }

    let dir = destination.parent_dir().unwrap_or_else(|| Path::new("."));

    tracing::debug!(dir = %dir.display(), "creating output directory");

    if let Err(err) = fs::create_dir_all(dir) {
        tracing::debug!(error = %err, "create_dir_all failed");
    }

    if !dir.is_dir() {
        tracing::error!(dir = %dir.display(), "output directory could not be created or is a file");
        return Err(ExportError::Filesystem {
            path: dir.to_path_buf(),
            reason: "parent path is not a directory".into(),
        });
    }

    Ok(())
}
