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

//! Chat-scoped score keeping: the per-chat store, the interactive flow
//! engine that collects input for it, and the snapshot file it is persisted to.

use regex::Regex;

pub mod callback;
pub mod error;
pub mod flow;
pub mod mirror;
pub mod persistence;
pub mod snapshot;
pub mod store;
pub mod theme;

pub use callback::{CallbackAction, CallbackPayload, InlineButton, InlineKeyboard};
pub use error::{FlowError, PersistenceError, StoreError};
pub use flow::{
    Entity, Flow, FlowEngine, FlowInput, FlowKind, Outcome, Prompt, Purpose, Retry, Shortage,
};
pub use mirror::{NoopMirror, RemoteMirror, push_to_mirror, restore_from_mirror, spawn_mirror_push};
pub use persistence::{SaveOutcome, SnapshotFile};
pub use snapshot::Snapshot;
pub use store::{ChatState, Game, Mutation, RecreatePolicy, Score, Store, validate_name};
pub use theme::{Text, Theme, render_board, render_list};

/// Opaque chat identifier as handed out by the chat transport.
pub type ChatId = i64;

pub type UserId = i64;

/// Names may not start with this character; it introduces commands.
pub const COMMAND_PREFIX: char = '/';

/// Pre-set adjustments offered as buttons while a score value is awaited.
pub const SCORE_DELTAS: [Score; 4] = [-1, 1, 5, 10];

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    expand_vars_with(input, |name| std::env::var(name).ok())
}

/// Same as [`expand_env_vars`] but resolves names through `lookup`.
pub fn expand_vars_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        lookup(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
