// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::PersistenceError,
    snapshot::Snapshot,
    store::{RecreatePolicy, Store},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// A snapshot of the same or a newer revision is already on disk.
    Skipped,
}

#[derive(Debug, Default)]
struct WriterState {
    last_revision: Option<u64>,
    last_saved_at: Option<DateTime<Utc>>,
}

/// The local snapshot file. Writes go to a uniquely named sibling first and
/// are renamed over the target, so readers never observe a partial file.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    writer: Mutex<WriterState>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(WriterState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.display(),
            source,
        }
    }

    /// Reads the store from disk. A missing file yields an empty store,
    /// which is written out immediately.
    pub async fn load(&self, recreate_policy: RecreatePolicy) -> Result<Store, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.display(), "snapshot file not found, starting empty");
                let store = Store::new(recreate_policy);
                self.save(&Snapshot::capture(&store), store.revision()).await?;
                return Ok(store);
            }
            Err(error) => return Err(self.io_error(error)),
        };

        let snapshot = self.parse(&bytes)?;
        let store = snapshot.into_store(recreate_policy);
        info!(
            path = %self.display(),
            chats = store.chats().count(),
            "snapshot loaded"
        );
        Ok(store)
    }

    /// Writes `snapshot` unless one taken at `revision` or later was already written.
    pub async fn save(
        &self,
        snapshot: &Snapshot,
        revision: u64,
    ) -> Result<SaveOutcome, PersistenceError> {
        let mut writer = self.writer.lock().await;
        if writer.last_revision.is_some_and(|last| last >= revision) {
            debug!(revision, "skipping outdated snapshot");
            return Ok(SaveOutcome::Skipped);
        }

        let payload = snapshot
            .to_json_pretty()
            .map_err(|source| PersistenceError::Malformed {
                path: self.display(),
                source,
            })?;
        self.write_atomically(payload.as_bytes()).await?;

        writer.last_revision = Some(revision);
        writer.last_saved_at = Some(Utc::now());
        debug!(revision, path = %self.display(), "snapshot saved");
        Ok(SaveOutcome::Written)
    }

    /// Raw file contents, or `None` when the file does not exist.
    pub async fn read_bytes(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.io_error(error)),
        }
    }

    /// Overwrites the file with `bytes` after checking they hold a snapshot.
    /// On a malformed payload the existing file is left as it was.
    pub async fn replace_with(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.parse(bytes)?;
        let _writer = self.writer.lock().await;
        self.write_atomically(bytes).await
    }

    pub async fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.writer.lock().await.last_saved_at
    }

    fn parse(&self, bytes: &[u8]) -> Result<Snapshot, PersistenceError> {
        serde_json::from_slice(bytes).map_err(|source| PersistenceError::Malformed {
            path: self.display(),
            source,
        })
    }

    async fn write_atomically(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| self.io_error(error))?;
        }

        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|error| self.io_error(error))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|error| self.io_error(error))
    }
}
