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

use crate::{COMMAND_PREFIX, ChatId, error::StoreError, theme::Theme};

pub type Score = i64;

/// What `create_game` does when the chat already has a game of that name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecreatePolicy {
    /// Replace the game with an empty one, discarding its scores.
    #[default]
    Reset,
    /// Leave the existing game and its scores untouched.
    Keep,
}

/// Player and game names must be non-empty and must not look like a command.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.starts_with(COMMAND_PREFIX) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Game {
    pub name: String,
    /// Scores in the order players were first scored.
    pub scores: Vec<(String, Score)>,
}

impl Game {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scores: Vec::new(),
        }
    }

    pub fn score(&self, player: &str) -> Option<Score> {
        self.scores
            .iter()
            .find(|(name, _)| name == player)
            .map(|(_, score)| *score)
    }

    fn score_mut(&mut self, player: &str) -> &mut Score {
        let index = match self.scores.iter().position(|(name, _)| name == player) {
            Some(index) => index,
            None => {
                self.scores.push((player.to_string(), 0));
                self.scores.len() - 1
            }
        };
        &mut self.scores[index].1
    }

    fn remove_player(&mut self, player: &str) {
        self.scores.retain(|(name, _)| name != player);
    }
}

/// Everything one chat owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub players: Vec<String>,
    pub games: Vec<Game>,
    pub theme: Theme,
}

impl ChatState {
    pub fn game(&self, name: &str) -> Option<&Game> {
        self.games.iter().find(|game| game.name == name)
    }

    fn game_mut(&mut self, name: &str) -> Option<&mut Game> {
        self.games.iter_mut().find(|game| game.name == name)
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|player| player == name)
    }
}

/// A store operation described as data, produced by a completed flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateGame { name: String },
    AddPlayer { name: String },
    IncrementScore { game: String, player: String },
    AdjustScore { game: String, player: String, delta: Score },
    SetScore { game: String, player: String, value: Score },
    DeleteGame { name: String },
    DeletePlayer { name: String },
}

/// In-memory players, games and scores for every chat.
///
/// No I/O happens here; callers persist a [`crate::Snapshot`] after each
/// successful mutation. The revision grows by one per applied mutation so
/// out-of-order saves can be detected.
#[derive(Debug, Clone, Default)]
pub struct Store {
    chats: BTreeMap<ChatId, ChatState>,
    revision: u64,
    recreate_policy: RecreatePolicy,
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.chats == other.chats
    }
}

impl Store {
    pub fn new(recreate_policy: RecreatePolicy) -> Self {
        Self {
            recreate_policy,
            ..Self::default()
        }
    }

    pub(crate) fn from_chats(
        chats: BTreeMap<ChatId, ChatState>,
        recreate_policy: RecreatePolicy,
    ) -> Self {
        Self {
            chats,
            revision: 0,
            recreate_policy,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn recreate_policy(&self) -> RecreatePolicy {
        self.recreate_policy
    }

    pub fn chats(&self) -> impl Iterator<Item = (ChatId, &ChatState)> {
        self.chats.iter().map(|(chat, state)| (*chat, state))
    }

    pub fn chat(&self, chat: ChatId) -> Option<&ChatState> {
        self.chats.get(&chat)
    }

    fn chat_mut(&mut self, chat: ChatId) -> &mut ChatState {
        self.chats.entry(chat).or_default()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    pub fn create_game(&mut self, chat: ChatId, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let policy = self.recreate_policy;
        let state = self.chat_mut(chat);
        match state.game_mut(name) {
            Some(existing) => {
                if policy == RecreatePolicy::Reset {
                    existing.scores.clear();
                }
            }
            None => state.games.push(Game::new(name)),
        }
        self.bump();
        Ok(())
    }

    pub fn add_player(&mut self, chat: ChatId, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let state = self.chat_mut(chat);
        if !state.has_player(name) {
            state.players.push(name.to_string());
        }
        self.bump();
        Ok(())
    }

    /// Adds one point; a player without a score starts from zero.
    pub fn increment_score(
        &mut self,
        chat: ChatId,
        game: &str,
        player: &str,
    ) -> Result<Score, StoreError> {
        self.adjust_score(chat, game, player, 1)
    }

    pub fn adjust_score(
        &mut self,
        chat: ChatId,
        game: &str,
        player: &str,
        delta: Score,
    ) -> Result<Score, StoreError> {
        let entry = self.game_entry(chat, game)?.score_mut(player);
        *entry = entry.saturating_add(delta);
        let value = *entry;
        self.bump();
        Ok(value)
    }

    pub fn set_score(
        &mut self,
        chat: ChatId,
        game: &str,
        player: &str,
        value: Score,
    ) -> Result<Score, StoreError> {
        *self.game_entry(chat, game)?.score_mut(player) = value;
        self.bump();
        Ok(value)
    }

    pub fn delete_game(&mut self, chat: ChatId, name: &str) -> Result<Game, StoreError> {
        let state = self
            .chats
            .get_mut(&chat)
            .ok_or_else(|| StoreError::GameNotFound(name.to_string()))?;
        let index = state
            .games
            .iter()
            .position(|game| game.name == name)
            .ok_or_else(|| StoreError::GameNotFound(name.to_string()))?;
        let removed = state.games.remove(index);
        self.bump();
        Ok(removed)
    }

    /// Removes the player from the roster and from every game of the chat.
    pub fn delete_player(&mut self, chat: ChatId, name: &str) -> Result<(), StoreError> {
        let state = self
            .chats
            .get_mut(&chat)
            .filter(|state| state.has_player(name))
            .ok_or_else(|| StoreError::PlayerNotFound(name.to_string()))?;
        state.players.retain(|player| player != name);
        for game in &mut state.games {
            game.remove_player(name);
        }
        self.bump();
        Ok(())
    }

    pub fn list_games(&self, chat: ChatId) -> Vec<String> {
        self.chat(chat)
            .map(|state| state.games.iter().map(|game| game.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn list_players(&self, chat: ChatId) -> Vec<String> {
        self.chat(chat)
            .map(|state| state.players.clone())
            .unwrap_or_default()
    }

    pub fn game(&self, chat: ChatId, name: &str) -> Option<&Game> {
        self.chat(chat).and_then(|state| state.game(name))
    }

    pub fn has_game(&self, chat: ChatId, name: &str) -> bool {
        self.game(chat, name).is_some()
    }

    pub fn has_player(&self, chat: ChatId, name: &str) -> bool {
        self.chat(chat).is_some_and(|state| state.has_player(name))
    }

    pub fn theme(&self, chat: ChatId) -> Theme {
        self.chat(chat).map(|state| state.theme).unwrap_or_default()
    }

    pub fn toggle_theme(&mut self, chat: ChatId) -> Theme {
        let state = self.chat_mut(chat);
        state.theme = state.theme.toggled();
        let theme = state.theme;
        self.bump();
        theme
    }

    pub fn apply(&mut self, chat: ChatId, mutation: &Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::CreateGame { name } => self.create_game(chat, name),
            Mutation::AddPlayer { name } => self.add_player(chat, name),
            Mutation::IncrementScore { game, player } => {
                self.increment_score(chat, game, player).map(|_| ())
            }
            Mutation::AdjustScore {
                game,
                player,
                delta,
            } => self.adjust_score(chat, game, player, *delta).map(|_| ()),
            Mutation::SetScore {
                game,
                player,
                value,
            } => self.set_score(chat, game, player, *value).map(|_| ()),
            Mutation::DeleteGame { name } => self.delete_game(chat, name).map(|_| ()),
            Mutation::DeletePlayer { name } => self.delete_player(chat, name),
        }
    }

    fn game_entry(&mut self, chat: ChatId, game: &str) -> Result<&mut Game, StoreError> {
        self.chats
            .get_mut(&chat)
            .and_then(|state| state.game_mut(game))
            .ok_or_else(|| StoreError::GameNotFound(game.to_string()))
    }
}
