//! Filesystem artifact store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::application::ports::{ArtifactRef, ArtifactStore, StoreError};
use crate::domain::capture::Artifact;

/// Writes takes into one output directory and deletes them on revoke
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        // Only the final component is honoured
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "recording".into());
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn publish(&self, artifact: &Artifact, filename: &str) -> Result<ArtifactRef, StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.path_for(filename);
        fs::write(&path, artifact.data())
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), size = %artifact.human_readable_size(), "take saved");
        Ok(ArtifactRef::new(path.to_string_lossy()))
    }

    async fn revoke(&self, reference: &ArtifactRef) {
        match fs::remove_file(reference.uri()).await {
            Ok(()) => debug!(path = %reference, "take removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %reference, error = %e, "failed to remove take"),
        }
    }
}
