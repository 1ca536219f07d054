//! Local artifact staging.
//!
//! A [`Bundle`] writes the rendered artifacts into a scoped temporary
//! directory and packs them into one gzip tar archive for transfer. The
//! directory is removed when the bundle drops, whatever the deployment
//! outcome.

use crate::error::DeployResult;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use weave_render::ArtifactSet;

/// File name of the packed archive, locally and on the target.
pub const ARCHIVE_NAME: &str = "weave-artifacts.tar.gz";

/// A staged artifact archive in a scoped temporary directory.
pub struct Bundle {
    dir: TempDir,
    archive_path: PathBuf,
}

impl Bundle {
    /// Write the artifacts to a temporary directory and pack them.
    pub fn stage(artifacts: &ArtifactSet) -> DeployResult<Self> {
        let dir = TempDir::new()?;

        for artifact in &artifacts.files {
            std::fs::write(dir.path().join(&artifact.name), &artifact.content)?;
        }

        let archive_path = dir.path().join(ARCHIVE_NAME);
        let encoder = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for artifact in &artifacts.files {
            builder.append_path_with_name(dir.path().join(&artifact.name), &artifact.name)?;
        }
        builder.into_inner()?.finish()?;

        debug!(files = artifacts.files.len(), path = %archive_path.display(), "bundle staged");
        Ok(Self { dir, archive_path })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn staging_dir(&self) -> &Path {
        self.dir.path()
    }
}
