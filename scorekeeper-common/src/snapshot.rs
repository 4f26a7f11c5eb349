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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ChatId,
    store::{ChatState, Game, RecreatePolicy, Score, Store},
    theme::Theme,
};

/// Durable image of every chat, laid out as arrays of `[key, value]` pairs:
///
/// ```json
/// {
///   "players": [[-100, ["Alice", "Bob"]]],
///   "games": [[-100, [["Catan", [["Alice", 1]]]]]],
///   "gachiModes": [[-100, false]]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub players: Vec<(ChatId, Vec<String>)>,
    pub games: Vec<(ChatId, Vec<(String, Vec<(String, Score)>)>)>,
    #[serde(rename = "gachiModes", default)]
    pub gachi_modes: Vec<(ChatId, bool)>,
}

impl Snapshot {
    pub fn capture(store: &Store) -> Self {
        let mut snapshot = Snapshot::default();
        for (chat, state) in store.chats() {
            snapshot.players.push((chat, state.players.clone()));
            snapshot.games.push((
                chat,
                state
                    .games
                    .iter()
                    .map(|game| (game.name.clone(), game.scores.clone()))
                    .collect(),
            ));
            snapshot
                .gachi_modes
                .push((chat, state.theme.is_alternate()));
        }
        snapshot
    }

    /// Rebuilds the store. Chats may appear in any subset of the three
    /// sections; repeated names keep their first position.
    pub fn into_store(self, recreate_policy: RecreatePolicy) -> Store {
        let mut chats: BTreeMap<ChatId, ChatState> = BTreeMap::new();

        for (chat, players) in self.players {
            let state = chats.entry(chat).or_default();
            for player in players {
                if !state.has_player(&player) {
                    state.players.push(player);
                }
            }
        }

        for (chat, games) in self.games {
            let state = chats.entry(chat).or_default();
            for (name, scores) in games {
                let mut game = Game::new(name);
                for (player, score) in scores {
                    if game.score(&player).is_none() {
                        game.scores.push((player, score));
                    }
                }
                if state.game(&game.name).is_none() {
                    state.games.push(game);
                }
            }
        }

        for (chat, alternate) in self.gachi_modes {
            chats.entry(chat).or_default().theme = Theme::from_flag(alternate);
        }

        Store::from_chats(chats, recreate_policy)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
