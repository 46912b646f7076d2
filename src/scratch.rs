use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::warn;
use uuid::Uuid;

use crate::error::PipelineError;

/// Request-scoped scratch directory. Each request owns exactly one handle;
/// handles are never shared or reused across requests.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub async fn acquire(root: &Path) -> Result<Self, PipelineError> {
        let path = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await.map_err(|error| {
            PipelineError::internal(format!("Could not prepare scratch storage: {error}"))
        })?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The extractor decides the final on-disk name by its own rules, so the
    /// exact expected file is checked first and the first entry carrying the
    /// expected extension second.
    pub async fn locate(&self, expected_name: &str, fallback_ext: &str) -> Option<PathBuf> {
        let expected = self.path.join(expected_name);
        if tokio::fs::metadata(&expected)
            .await
            .is_ok_and(|metadata| metadata.is_file())
        {
            return Some(expected);
        }

        let mut entries = tokio::fs::read_dir(&self.path).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let extension_matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(fallback_ext));

            if extension_matches
                && entry
                    .metadata()
                    .await
                    .is_ok_and(|metadata| metadata.is_file())
            {
                return Some(path);
            }
        }

        None
    }

    /// Idempotent and infallible: a missing directory is fine, anything else
    /// is logged and swallowed.
    pub async fn release(&self) {
        if let Err(error) = tokio::fs::remove_dir_all(&self.path).await
            && error.kind() != ErrorKind::NotFound
        {
            warn!("could not release scratch directory {:?}: {error}", self.path);
        }
    }
}

/// Startup sweep. Scratch directories are strictly request-scoped, so
/// anything still under the root was orphaned by a previous process.
pub async fn sweep_scratch_root(root: &Path) {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                warn!("could not open scratch root for sweeping: {error}");
            }
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let removal = match entry.metadata().await {
            Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(error) => {
                warn!("could not stat scratch entry {:?}: {error}", path);
                continue;
            }
        };

        if let Err(error) = removal
            && error.kind() != ErrorKind::NotFound
        {
            warn!("could not remove orphaned scratch entry {:?}: {error}", path);
        }
    }
}
