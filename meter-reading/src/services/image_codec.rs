//! Image artifact handling
//!
//! Uploads are first written to a staging file that is deleted when the
//! `StagedImage` is dropped, whatever path the request takes. Only after a
//! successful recognition is the staged file moved into the artifacts
//! directory as `<measure_uuid>.<ext>`.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::ArtifactRef;
use crate::validators::ImagePayload;
use meter_common::config::RootFolderLayout;

/// Artifact handling failures
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Staging failed: {0}")]
    Stage(#[source] std::io::Error),

    #[error("Persisting artifact failed: {0}")]
    Persist(#[source] std::io::Error),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Reading artifact failed: {0}")]
    Read(#[source] std::io::Error),
}

/// A decoded upload on disk; the file is removed on drop
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
    mime_type: String,
    size: usize,
}

impl StagedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Read the staged bytes back
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// Stages, persists and serves image artifacts under the root folder
#[derive(Debug, Clone)]
pub struct ImageCodec {
    artifacts_dir: PathBuf,
    staging_dir: PathBuf,
}

impl ImageCodec {
    /// Directories must already exist (`RootFolderLayout::ensure_directories`)
    pub fn new(layout: &RootFolderLayout) -> Self {
        Self {
            artifacts_dir: layout.artifacts_dir(),
            staging_dir: layout.staging_dir(),
        }
    }

    /// Write decoded bytes to a fresh staging file
    pub async fn stage(&self, payload: ImagePayload) -> Result<StagedImage, CodecError> {
        let staging_dir = self.staging_dir.clone();
        let suffix = format!(".{}", extension_for(&payload.mime_type));

        let (file, payload) = run_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(&suffix)
                .tempfile_in(&staging_dir)?;
            file.write_all(&payload.bytes)?;
            file.flush()?;
            Ok((file, payload))
        })
        .await
        .map_err(CodecError::Stage)?;

        debug!(path = %file.path().display(), bytes = payload.bytes.len(), "Image staged");

        Ok(StagedImage {
            file,
            mime_type: payload.mime_type,
            size: payload.bytes.len(),
        })
    }

    /// Move a staged image into the artifacts directory under `id`
    pub async fn persist(&self, staged: StagedImage, id: Uuid) -> Result<ArtifactRef, CodecError> {
        let file_name = format!("{}.{}", id, extension_for(&staged.mime_type));
        let target = self.artifacts_dir.join(&file_name);
        let StagedImage { file, mime_type, .. } = staged;

        // On error the temp file comes back inside PersistError and is dropped (deleted)
        run_blocking(move || file.persist(&target).map(|_| ()).map_err(|e| e.error))
            .await
            .map_err(CodecError::Persist)?;

        Ok(ArtifactRef {
            file_name,
            mime_type,
        })
    }

    /// Remove a persisted artifact that ended up with no record
    pub async fn discard(&self, artifact: &ArtifactRef) {
        let path = self.artifacts_dir.join(&artifact.file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to discard artifact {}: {}", path.display(), e);
        }
    }

    /// Load a persisted artifact by file name
    ///
    /// Only `<uuid>.<known ext>` names resolve, so no path outside the
    /// artifacts directory is reachable.
    pub async fn open(&self, file_name: &str) -> Result<(Vec<u8>, &'static str), CodecError> {
        let mime_type = parse_artifact_name(file_name)
            .ok_or_else(|| CodecError::NotFound(file_name.to_string()))?;

        let path = self.artifacts_dir.join(file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, mime_type)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CodecError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(CodecError::Read(e)),
        }
    }
}

/// Run blocking file work off the async worker threads
async fn run_blocking<T, F>(work: F) -> std::io::Result<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

/// File extension for a normalized MIME type
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// `<uuid>.<ext>` → MIME type
fn parse_artifact_name(file_name: &str) -> Option<&'static str> {
    let (stem, extension) = file_name.split_once('.')?;
    Uuid::parse_str(stem).ok()?;
    mime_for_extension(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn codec() -> (TempDir, ImageCodec, RootFolderLayout) {
        let dir = TempDir::new().unwrap();
        let layout = RootFolderLayout::new(dir.path().to_path_buf());
        layout.ensure_directories().unwrap();
        (dir, ImageCodec::new(&layout), layout)
    }

    fn payload() -> ImagePayload {
        ImagePayload {
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3],
        }
    }

    fn staging_entries(layout: &RootFolderLayout) -> usize {
        std::fs::read_dir(layout.staging_dir()).unwrap().count()
    }

    #[tokio::test]
    async fn test_stage_writes_bytes_and_drop_removes() {
        let (_dir, codec, layout) = codec();
        let staged = codec.stage(payload()).await.unwrap();

        assert_eq!(staged.mime_type(), "image/jpeg");
        assert_eq!(staged.size(), 7);
        assert_eq!(staged.read().await.unwrap(), payload().bytes);
        assert!(staged.path().to_string_lossy().ends_with(".jpg"));

        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
        assert_eq!(staging_entries(&layout), 0);
    }

    #[tokio::test]
    async fn test_persist_moves_into_artifacts() {
        let (_dir, codec, layout) = codec();
        let id = Uuid::new_v4();
        let staged = codec.stage(payload()).await.unwrap();
        let artifact = codec.persist(staged, id).await.unwrap();

        assert_eq!(artifact.file_name, format!("{}.jpg", id));
        assert_eq!(artifact.mime_type, "image/jpeg");
        assert_eq!(staging_entries(&layout), 0);

        let (bytes, mime) = codec.open(&artifact.file_name).await.unwrap();
        assert_eq!(bytes, payload().bytes);
        assert_eq!(mime, "image/jpeg");
    }

    #[tokio::test]
    async fn test_discard_removes_artifact() {
        let (_dir, codec, _layout) = codec();
        let staged = codec.stage(payload()).await.unwrap();
        let artifact = codec.persist(staged, Uuid::new_v4()).await.unwrap();

        codec.discard(&artifact).await;
        assert!(matches!(
            codec.open(&artifact.file_name).await,
            Err(CodecError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_persist_releases_staged_file() {
        let (_dir, codec, layout) = codec();
        std::fs::remove_dir(layout.artifacts_dir()).unwrap();

        let staged = codec.stage(payload()).await.unwrap();
        assert_eq!(staging_entries(&layout), 1);

        let result = codec.persist(staged, Uuid::new_v4()).await;
        assert!(matches!(result, Err(CodecError::Persist(_))));
        assert_eq!(staging_entries(&layout), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_foreign_names() {
        let (_dir, codec, _layout) = codec();
        let exe = format!("{}.exe", Uuid::new_v4());
        for name in ["../secret.png", "notes.txt", "abc.png", exe.as_str()] {
            assert!(matches!(codec.open(name).await, Err(CodecError::NotFound(_))));
        }
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/heic"), "heic");
        assert_eq!(mime_for_extension("gif"), Some("image/gif"));
        assert_eq!(mime_for_extension("bmp"), None);
    }
}
