//! JSON file storage for timelines.
//!
//! One pretty-printed file per recording, `recording-{id}.json`, inside a
//! single directory. Writes go to a temporary file first and are renamed into
//! place so a crash never leaves a half-written recording behind.

use crate::collaborators::StorageCollaborator;
use crate::error::StorageError;
use crate::timeline::{RecordingId, Timeline};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

const FILE_PREFIX: &str = "recording-";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    directory: PathBuf,
}

impl JsonFileStorage {
    /// Opens (and creates if needed) the storage directory.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        debug!("📁 Recording storage at {}", directory.display());
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, id: RecordingId) -> PathBuf {
        self.directory.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", id.0))
    }

    fn id_from_path(path: &Path) -> Option<RecordingId> {
        let name = path.file_name()?.to_str()?;
        let digits = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        digits.parse().ok().map(RecordingId)
    }

    pub async fn try_save(&self, timeline: &Timeline) -> Result<(), StorageError> {
        let path = self.path_for(timeline.id);
        let temp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(timeline)?;
        let written = match tokio::fs::write(&temp, json).await {
            Ok(()) => tokio::fs::rename(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("⚠️ Could not remove {}: {}", temp.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn try_load(&self, id: RecordingId) -> Result<Timeline, StorageError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        Self::decode(&path, &bytes, Some(id))
    }

    fn decode(path: &Path, bytes: &[u8], expected: Option<RecordingId>) -> Result<Timeline, StorageError> {
        let timeline: Timeline = serde_json::from_slice(bytes).map_err(|e| StorageError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(expected) = expected {
            if timeline.id != expected {
                return Err(StorageError::Malformed {
                    path: path.to_path_buf(),
                    reason: format!("file name says {expected} but content says {}", timeline.id),
                });
            }
        }
        if !timeline.is_well_ordered() {
            return Err(StorageError::Malformed {
                path: path.to_path_buf(),
                reason: "frame timestamps decrease".to_string(),
            });
        }
        Ok(timeline)
    }

    /// Ids of every stored recording file, ascending.
    pub async fn list_ids(&self) -> Result<Vec<RecordingId>, StorageError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = Self::id_from_path(&entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn try_load_all(&self) -> Result<Vec<Timeline>, StorageError> {
        let mut timelines = Vec::new();
        for id in self.list_ids().await? {
            match self.try_load(id).await {
                Ok(timeline) => timelines.push(timeline),
                Err(e) => warn!("⚠️ Skipping unreadable recording {}: {}", id, e),
            }
        }
        Ok(timelines)
    }

    pub async fn try_delete(&self, id: RecordingId) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Combined size of all recording files in bytes.
    pub async fn total_size_bytes(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        for id in self.list_ids().await? {
            if let Ok(metadata) = tokio::fs::metadata(self.path_for(id)).await {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StorageCollaborator for JsonFileStorage {
    async fn save(&self, timeline: &Timeline) -> bool {
        match self.try_save(timeline).await {
            Ok(()) => {
                debug!(recording_id = timeline.id.0, "💾 Recording saved");
                true
            }
            Err(e) => {
                error!(recording_id = timeline.id.0, "❌ Failed to save recording: {}", e);
                false
            }
        }
    }

    async fn load(&self, id: RecordingId) -> Option<Timeline> {
        match self.try_load(id).await {
            Ok(timeline) => Some(timeline),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                warn!(recording_id = id.0, "⚠️ Failed to load recording: {}", e);
                None
            }
        }
    }

    async fn load_all(&self) -> Vec<Timeline> {
        self.try_load_all().await.unwrap_or_else(|e| {
            error!("❌ Failed to scan recording directory: {}", e);
            Vec::new()
        })
    }

    async fn delete(&self, id: RecordingId) -> bool {
        self.try_delete(id).await.unwrap_or_else(|e| {
            error!(recording_id = id.0, "❌ Failed to delete recording: {}", e);
            false
        })
    }

    async fn exists(&self, id: RecordingId) -> bool {
        tokio::fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Frame;
    use crate::types::{ActorId, ActorSnapshot, Location, MovementFlags, Orientation, Position, Vitals};

    fn sample(id: u32) -> Timeline {
        let snapshot = ActorSnapshot {
            location: Location::new("world", Position::new(1.5, 64.0, -3.0), Orientation::new(90.0, 10.0)),
            flags: MovementFlags::default(),
            vitals: Vitals::default(),
        };
        let mut timeline = Timeline::new(RecordingId(id), ActorId::new(), "Steve", "Broke 5 diamond in a row", 1_000);
        timeline.push_frame(Frame::from_snapshot(1_000, &snapshot, vec![]));
        timeline.finish(2_000, "timed out");
        timeline
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("recordings")).await.unwrap();
        let timeline = sample(7);

        assert!(storage.save(&timeline).await);
        assert!(storage.exists(RecordingId(7)).await);
        assert!(storage.path_for(RecordingId(7)).ends_with("recording-7.json"));
        assert_eq!(storage.load(RecordingId(7)).await, Some(timeline));
        assert!(storage.total_size_bytes().await.unwrap() > 0);

        assert!(storage.delete(RecordingId(7)).await);
        assert!(!storage.delete(RecordingId(7)).await);
        assert_eq!(storage.load(RecordingId(7)).await, None);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();
        let target = storage.path_for(RecordingId(3));
        tokio::fs::create_dir(&target).await.unwrap();
        tokio::fs::write(target.join("occupied"), b"x").await.unwrap();

        assert!(storage.try_save(&sample(3)).await.is_err());
        assert!(!storage.save(&sample(3)).await);
        assert!(!tokio::fs::try_exists(target.with_extension("json.tmp")).await.unwrap());
        assert!(storage.save(&sample(4)).await);
    }

    #[tokio::test]
    async fn test_load_all_skips_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();
        storage.save(&sample(1)).await;
        storage.save(&sample(2)).await;
        tokio::fs::write(dir.path().join("recording-3.json"), b"{ not json").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"ignored").await.unwrap();

        let mismatched = serde_json::to_vec(&sample(9)).unwrap();
        tokio::fs::write(dir.path().join("recording-4.json"), mismatched).await.unwrap();

        let loaded: Vec<u32> = storage.load_all().await.iter().map(|t| t.id.0).collect();
        assert_eq!(loaded, vec![1, 2]);
        assert_eq!(storage.list_ids().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_load_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();
        tokio::fs::write(storage.path_for(RecordingId(5)), b"[]").await.unwrap();
        assert!(matches!(
            storage.try_load(RecordingId(5)).await,
            Err(StorageError::Malformed { .. })
        ));
        assert!(matches!(
            storage.try_load(RecordingId(6)).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
