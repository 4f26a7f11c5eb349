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

use thiserror::Error;

/// Rule violations and missing referents reported by [`crate::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid name: '{0}'")]
    InvalidName(String),

    #[error("game '{0}' not found")]
    GameNotFound(String),

    #[error("player '{0}' not found")]
    PlayerNotFound(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GameNotFound(_) | Self::PlayerNotFound(_))
    }
}

/// Failures raised while a flow is being advanced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("flow references a game or player that no longer exists")]
    StaleReference,

    #[error("user is not allowed to start this flow")]
    Unauthorized,
}

/// Errors reading or writing the durable snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot i/o failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot at {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
