//! Upload persistence. Accepted files land in one flat directory under
//! collision-free names; the client's file name rides along in the handle.

use crate::error::IngestError;
use crate::types::FileHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ACCEPTED_EXTENSIONS: &[&str] = &["mid", "midi"];

const ACCEPTED_MIME_TYPES: &[&str] = &[
    "audio/midi",
    "audio/mid",
    "audio/x-midi",
    "application/x-midi",
    "application/octet-stream",
];

#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
    seq: AtomicU64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| IngestError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::info!(upload.dir = %dir.display(), "Upload store ready");
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check name and declared content type before any bytes are written.
    pub fn validate(&self, original_name: &str, content_type: Option<&str>) -> Result<(), IngestError> {
        let ext = extension(original_name);
        if !ext
            .as_deref()
            .is_some_and(|e| ACCEPTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            return Err(IngestError::rejected(
                original_name,
                "only .mid and .midi files are accepted",
            ));
        }

        if let Some(content_type) = content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !ACCEPTED_MIME_TYPES.contains(&essence.as_str()) {
                return Err(IngestError::rejected(
                    original_name,
                    format!("unsupported content type {content_type}"),
                ));
            }
        }

        Ok(())
    }

    /// Write `bytes` as `{field}-{unix_millis}-{seq}{ext}`.
    pub async fn store(
        &self,
        original_name: &str,
        field: &str,
        bytes: &[u8],
    ) -> Result<FileHandle, IngestError> {
        let path = self.dir.join(self.stored_name(original_name, field));

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| IngestError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(
            upload.file = %original_name,
            upload.path = %path.display(),
            upload.size = bytes.len(),
            "Stored upload"
        );

        Ok(FileHandle::new(original_name, path, bytes.len() as u64))
    }

    fn stored_name(&self, original_name: &str, field: &str) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let ext = extension(original_name)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        format!("{field}-{millis}-{seq}{ext}")
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
}
