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

//! Optional off-site copy of the snapshot file. Every failure here is
//! logged and swallowed; the local file stays authoritative.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::persistence::SnapshotFile;

#[async_trait]
pub trait RemoteMirror: Send + Sync {
    fn is_enabled(&self) -> bool {
        true
    }

    /// The remote copy, or `None` when there is none yet.
    async fn fetch(&self) -> anyhow::Result<Option<Vec<u8>>>;

    async fn push(&self, bytes: Vec<u8>) -> anyhow::Result<()>;
}

/// Used when no mirror credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

#[async_trait]
impl RemoteMirror for NoopMirror {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn fetch(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn push(&self, _bytes: Vec<u8>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Overwrites the local file with the remote copy. Returns whether the local
/// file was replaced.
pub async fn restore_from_mirror(mirror: &dyn RemoteMirror, file: &SnapshotFile) -> bool {
    if !mirror.is_enabled() {
        return false;
    }

    let bytes = match mirror.fetch().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            info!("remote mirror has no snapshot yet, keeping local file");
            return false;
        }
        Err(error) => {
            warn!(error = %error, "failed to fetch snapshot from remote mirror");
            return false;
        }
    };

    match file.replace_with(&bytes).await {
        Ok(()) => {
            info!(bytes = bytes.len(), path = %file.path().display(), "snapshot restored from remote mirror");
            true
        }
        Err(error) => {
            warn!(error = %error, "rejected snapshot from remote mirror, keeping local file");
            false
        }
    }
}

/// Uploads the current local file. Returns whether anything was pushed.
pub async fn push_to_mirror(mirror: &dyn RemoteMirror, file: &SnapshotFile) -> bool {
    let bytes = match file.read_bytes().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(path = %file.path().display(), "no local snapshot to push");
            return false;
        }
        Err(error) => {
            warn!(error = %error, "failed to read local snapshot for push");
            return false;
        }
    };

    let size = bytes.len();
    match mirror.push(bytes).await {
        Ok(()) => {
            info!(bytes = size, "snapshot pushed to remote mirror");
            true
        }
        Err(error) => {
            warn!(error = %error, "failed to push snapshot to remote mirror");
            false
        }
    }
}

/// Pushes the local file every `period`, starting one period from now.
/// Returns `None` for a disabled mirror.
pub fn spawn_mirror_push(
    mirror: Arc<dyn RemoteMirror>,
    file: Arc<SnapshotFile>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if !mirror.is_enabled() {
        return None;
    }

    Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            push_to_mirror(mirror.as_ref(), &file).await;
        }
    }))
}
