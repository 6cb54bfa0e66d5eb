use crate::error::SignerError;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

/// Read-only access to the hand videos, one `{id}.mp4` per hand
#[derive(Debug, Clone)]
pub struct VideoStorage {
    base_path: Arc<PathBuf>,
}

impl VideoStorage {
    pub fn new(path: String) -> Self {
        Self {
            base_path: Arc::new(PathBuf::from(path)),
        }
    }

    /// Path of a hand's video, or `None` when the id could escape the
    /// storage directory.
    pub fn video_path(&self, hand_id: &str) -> Option<PathBuf> {
        if !is_valid_id(hand_id) {
            return None;
        }
        Some(self.base_path.join(format!("{}.mp4", hand_id)))
    }

    /// Size of the video in bytes, `None` when it does not exist.
    pub async fn size(&self, hand_id: &str) -> Option<u64> {
        let path = self.video_path(hand_id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => {
                debug!("no video at {}", path.display());
                None
            }
        }
    }

    pub async fn read(&self, hand_id: &str) -> Result<Bytes, SignerError> {
        let path = self
            .video_path(hand_id)
            .ok_or_else(|| SignerError::RequestError(format!("Invalid hand id: {}", hand_id)))?;

        let data = tokio::fs::read(&path).await.map_err(|e| {
            error!("Failed to read file {}: {}", path.display(), e);
            SignerError::StorageError(format!("Failed to read file: {}", e))
        })?;
        Ok(Bytes::from(data))
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage(name: &str) -> (VideoStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("signer-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        (VideoStorage::new(dir.display().to_string()), dir)
    }

    #[test]
    fn rejects_ids_escaping_the_directory() {
        let storage = VideoStorage::new("/srv/videos".to_string());
        assert!(storage.video_path("../etc/passwd").is_none());
        assert!(storage.video_path("a/b").is_none());
        assert!(storage.video_path("").is_none());
        assert_eq!(
            storage.video_path("hand_42-b").unwrap(),
            PathBuf::from("/srv/videos/hand_42-b.mp4")
        );
    }

    #[tokio::test]
    async fn size_and_read() {
        let (storage, dir) = temp_storage("read");
        std::fs::write(dir.join("h1.mp4"), b"not really mp4").unwrap();

        assert_eq!(storage.size("h1").await, Some(14));
        assert_eq!(storage.size("missing").await, None);
        assert_eq!(storage.read("h1").await.unwrap(), Bytes::from_static(b"not really mp4"));
        assert!(matches!(
            storage.read("missing").await,
            Err(SignerError::StorageError(_))
        ));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
