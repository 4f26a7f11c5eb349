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

//! Multi-step interactions. Each chat has at most one live [`Flow`]; every
//! step it advances to is issued a fresh ticket, and button presses carrying
//! any other ticket are reported as [`Outcome::Expired`]. A flow only takes
//! input from the user who started it.
//!
//! Transitions only read the [`Store`]. Applying the resulting [`Mutation`]
//! is left to the caller.

use std::collections::HashMap;

use crate::{
    ChatId, SCORE_DELTAS, Score, UserId,
    callback::{CallbackAction, CallbackPayload},
    error::FlowError,
    store::{Mutation, Store, validate_name},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    AddGame,
    AddPlayer,
    AddScore,
    SetScore,
    DeleteGame,
    DeletePlayer,
}

impl FlowKind {
    pub fn requires_authorization(self) -> bool {
        matches!(
            self,
            FlowKind::SetScore | FlowKind::DeleteGame | FlowKind::DeletePlayer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Game,
    Player,
}

/// Why a selection is being asked for; only changes the wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Score,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreMode {
    Increment,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScoreStep {
    AwaitingGame { options: Vec<String> },
    AwaitingPlayer { game: String, options: Vec<String> },
    AwaitingValue { game: String, player: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeleteStep {
    AwaitingSelection { options: Vec<String> },
    AwaitingConfirmation { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow(FlowState);

#[derive(Debug, Clone, PartialEq, Eq)]
enum FlowState {
    AwaitingName(Entity),
    Score { mode: ScoreMode, step: ScoreStep },
    Delete { entity: Entity, step: DeleteStep },
}

impl Flow {
    pub fn kind(&self) -> FlowKind {
        match &self.0 {
            FlowState::AwaitingName(Entity::Game) => FlowKind::AddGame,
            FlowState::AwaitingName(Entity::Player) => FlowKind::AddPlayer,
            FlowState::Score {
                mode: ScoreMode::Increment,
                ..
            } => FlowKind::AddScore,
            FlowState::Score {
                mode: ScoreMode::Set,
                ..
            } => FlowKind::SetScore,
            FlowState::Delete {
                entity: Entity::Game,
                ..
            } => FlowKind::DeleteGame,
            FlowState::Delete {
                entity: Entity::Player,
                ..
            } => FlowKind::DeletePlayer,
        }
    }

    pub fn awaits_text(&self) -> bool {
        matches!(
            &self.0,
            FlowState::AwaitingName(_)
                | FlowState::Score {
                    step: ScoreStep::AwaitingValue { .. },
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowInput<'a> {
    Text(&'a str),
    Press(CallbackPayload),
}

/// What the user should be asked next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    EnterName(Entity),
    SelectGame { options: Vec<String>, purpose: Purpose },
    SelectPlayer { options: Vec<String>, purpose: Purpose },
    EnterValue { game: String, player: String },
    ConfirmDeletion { entity: Entity, name: String },
}

/// Input rejected; the flow stays on the same step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    InvalidName { entity: Entity, name: String },
    NotANumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortage {
    NoGames,
    NoPlayers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The flow moved to a new step, identified by `ticket`.
    Prompt { ticket: u64, prompt: Prompt },
    Retry(Retry),
    /// All input collected; the flow is finished.
    Apply(Mutation),
    Cancelled(FlowKind),
    /// The flow could not start or continue for lack of games or players.
    Unavailable(Shortage),
    Aborted(FlowError),
    /// A press for a flow that is no longer live, or that belongs to
    /// another user.
    Expired,
    /// Input the live flow does not expect; nothing changed.
    Ignored,
}

enum Advance {
    Next(FlowState, Prompt),
    Stay(Retry),
    Ignore,
    Cancel,
    Done(Outcome),
}

#[derive(Debug)]
struct ActiveFlow {
    ticket: u64,
    owner: UserId,
    flow: Flow,
}

#[derive(Debug, Default)]
pub struct FlowEngine {
    flows: HashMap<ChatId, ActiveFlow>,
    next_ticket: u64,
}

impl FlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `kind` in `chat` on behalf of `user`, dropping whatever flow
    /// was pending there.
    pub fn start(
        &mut self,
        chat: ChatId,
        user: UserId,
        kind: FlowKind,
        authorized: bool,
        store: &Store,
    ) -> Outcome {
        self.flows.remove(&chat);
        if kind.requires_authorization() && !authorized {
            return Outcome::Aborted(FlowError::Unauthorized);
        }
        match begin(chat, kind, store) {
            Ok((state, prompt)) => self.install(chat, user, state, prompt),
            Err(shortage) => Outcome::Unavailable(shortage),
        }
    }

    /// Feeds input sent by `user` to the live flow of `chat`.
    pub fn handle(
        &mut self,
        chat: ChatId,
        user: UserId,
        input: FlowInput<'_>,
        store: &Store,
    ) -> Outcome {
        let unexpected = match input {
            FlowInput::Press(_) => Outcome::Expired,
            FlowInput::Text(_) => Outcome::Ignored,
        };
        let Some(active) = self.flows.get(&chat) else {
            return unexpected;
        };
        if active.owner != user {
            return unexpected;
        }
        match input {
            FlowInput::Press(payload) if payload.ticket != active.ticket => {
                return Outcome::Expired;
            }
            FlowInput::Text(_) if !active.flow.awaits_text() => return Outcome::Ignored,
            _ => {}
        }

        let Some(active) = self.flows.remove(&chat) else {
            return Outcome::Ignored;
        };
        let kind = active.flow.kind();
        match advance(chat, &active.flow.0, input, store) {
            Advance::Next(state, prompt) => self.install(chat, active.owner, state, prompt),
            Advance::Stay(retry) => {
                self.flows.insert(chat, active);
                Outcome::Retry(retry)
            }
            Advance::Ignore => {
                self.flows.insert(chat, active);
                Outcome::Ignored
            }
            Advance::Cancel => Outcome::Cancelled(kind),
            Advance::Done(outcome) => outcome,
        }
    }

    pub fn cancel(&mut self, chat: ChatId) -> Option<FlowKind> {
        self.flows.remove(&chat).map(|active| active.flow.kind())
    }

    pub fn current(&self, chat: ChatId) -> Option<&Flow> {
        self.flows.get(&chat).map(|active| &active.flow)
    }

    pub fn ticket(&self, chat: ChatId) -> Option<u64> {
        self.flows.get(&chat).map(|active| active.ticket)
    }

    /// The user whose input the live flow of `chat` accepts.
    pub fn owner(&self, chat: ChatId) -> Option<UserId> {
        self.flows.get(&chat).map(|active| active.owner)
    }

    /// Whether `user` has a flow in `chat` waiting for a text reply.
    pub fn awaits_text(&self, chat: ChatId, user: UserId) -> bool {
        self.flows
            .get(&chat)
            .is_some_and(|active| active.owner == user && active.flow.awaits_text())
    }

    fn install(&mut self, chat: ChatId, owner: UserId, state: FlowState, prompt: Prompt) -> Outcome {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.flows.insert(
            chat,
            ActiveFlow {
                ticket,
                owner,
                flow: Flow(state),
            },
        );
        Outcome::Prompt { ticket, prompt }
    }
}

fn begin(chat: ChatId, kind: FlowKind, store: &Store) -> Result<(FlowState, Prompt), Shortage> {
    let games = || {
        let games = store.list_games(chat);
        if games.is_empty() {
            Err(Shortage::NoGames)
        } else {
            Ok(games)
        }
    };

    Ok(match kind {
        FlowKind::AddGame => (
            FlowState::AwaitingName(Entity::Game),
            Prompt::EnterName(Entity::Game),
        ),
        FlowKind::AddPlayer => (
            FlowState::AwaitingName(Entity::Player),
            Prompt::EnterName(Entity::Player),
        ),
        FlowKind::AddScore | FlowKind::SetScore => {
            let options = games()?;
            let mode = if kind == FlowKind::AddScore {
                ScoreMode::Increment
            } else {
                ScoreMode::Set
            };
            (
                FlowState::Score {
                    mode,
                    step: ScoreStep::AwaitingGame {
                        options: options.clone(),
                    },
                },
                Prompt::SelectGame {
                    options,
                    purpose: Purpose::Score,
                },
            )
        }
        FlowKind::DeleteGame => {
            let options = games()?;
            (
                FlowState::Delete {
                    entity: Entity::Game,
                    step: DeleteStep::AwaitingSelection {
                        options: options.clone(),
                    },
                },
                Prompt::SelectGame {
                    options,
                    purpose: Purpose::Delete,
                },
            )
        }
        FlowKind::DeletePlayer => {
            let options = store.list_players(chat);
            if options.is_empty() {
                return Err(Shortage::NoPlayers);
            }
            (
                FlowState::Delete {
                    entity: Entity::Player,
                    step: DeleteStep::AwaitingSelection {
                        options: options.clone(),
                    },
                },
                Prompt::SelectPlayer {
                    options,
                    purpose: Purpose::Delete,
                },
            )
        }
    })
}

fn stale() -> Advance {
    Advance::Done(Outcome::Aborted(FlowError::StaleReference))
}

fn exists(store: &Store, chat: ChatId, entity: Entity, name: &str) -> bool {
    match entity {
        Entity::Game => store.has_game(chat, name),
        Entity::Player => store.has_player(chat, name),
    }
}

fn advance(chat: ChatId, state: &FlowState, input: FlowInput<'_>, store: &Store) -> Advance {
    if let FlowInput::Press(CallbackPayload {
        action: CallbackAction::Cancel,
        ..
    }) = input
    {
        return Advance::Cancel;
    }

    match (state, input) {
        (FlowState::AwaitingName(entity), FlowInput::Text(name)) => match validate_name(name) {
            Ok(()) => {
                let name = name.to_string();
                Advance::Done(Outcome::Apply(match entity {
                    Entity::Game => Mutation::CreateGame { name },
                    Entity::Player => Mutation::AddPlayer { name },
                }))
            }
            Err(_) => Advance::Stay(Retry::InvalidName {
                entity: *entity,
                name: name.to_string(),
            }),
        },
        (FlowState::Score { mode, step }, input) => advance_score(chat, *mode, step, input, store),
        (FlowState::Delete { entity, step }, FlowInput::Press(payload)) => {
            advance_delete(chat, *entity, step, payload.action, store)
        }
        _ => Advance::Ignore,
    }
}

fn advance_score(
    chat: ChatId,
    mode: ScoreMode,
    step: &ScoreStep,
    input: FlowInput<'_>,
    store: &Store,
) -> Advance {
    match (step, input) {
        (ScoreStep::AwaitingGame { options }, FlowInput::Press(payload)) => {
            let CallbackAction::Pick(index) = payload.action else {
                return Advance::Ignore;
            };
            let Some(game) = options.get(index) else {
                return Advance::Ignore;
            };
            if !store.has_game(chat, game) {
                return stale();
            }
            let players = store.list_players(chat);
            if players.is_empty() {
                return Advance::Done(Outcome::Unavailable(Shortage::NoPlayers));
            }
            Advance::Next(
                FlowState::Score {
                    mode,
                    step: ScoreStep::AwaitingPlayer {
                        game: game.clone(),
                        options: players.clone(),
                    },
                },
                Prompt::SelectPlayer {
                    options: players,
                    purpose: Purpose::Score,
                },
            )
        }
        (ScoreStep::AwaitingPlayer { game, options }, FlowInput::Press(payload)) => {
            let CallbackAction::Pick(index) = payload.action else {
                return Advance::Ignore;
            };
            let Some(player) = options.get(index) else {
                return Advance::Ignore;
            };
            if !store.has_game(chat, game) || !store.has_player(chat, player) {
                return stale();
            }
            let (game, player) = (game.clone(), player.clone());
            match mode {
                ScoreMode::Increment => {
                    Advance::Done(Outcome::Apply(Mutation::IncrementScore { game, player }))
                }
                ScoreMode::Set => Advance::Next(
                    FlowState::Score {
                        mode,
                        step: ScoreStep::AwaitingValue {
                            game: game.clone(),
                            player: player.clone(),
                        },
                    },
                    Prompt::EnterValue { game, player },
                ),
            }
        }
        (ScoreStep::AwaitingValue { game, player }, input) => {
            let mutation = match input {
                FlowInput::Text(text) => match text.trim().parse::<Score>() {
                    Ok(value) => Mutation::SetScore {
                        game: game.clone(),
                        player: player.clone(),
                        value,
                    },
                    Err(_) => return Advance::Stay(Retry::NotANumber),
                },
                FlowInput::Press(CallbackPayload {
                    action: CallbackAction::Delta(delta),
                    ..
                }) if SCORE_DELTAS.contains(&delta) => Mutation::AdjustScore {
                    game: game.clone(),
                    player: player.clone(),
                    delta,
                },
                FlowInput::Press(_) => return Advance::Ignore,
            };
            if !store.has_game(chat, game) || !store.has_player(chat, player) {
                return stale();
            }
            Advance::Done(Outcome::Apply(mutation))
        }
        _ => Advance::Ignore,
    }
}

fn advance_delete(
    chat: ChatId,
    entity: Entity,
    step: &DeleteStep,
    action: CallbackAction,
    store: &Store,
) -> Advance {
    match (step, action) {
        (DeleteStep::AwaitingSelection { options }, CallbackAction::Pick(index)) => {
            let Some(name) = options.get(index) else {
                return Advance::Ignore;
            };
            if !exists(store, chat, entity, name) {
                return stale();
            }
            Advance::Next(
                FlowState::Delete {
                    entity,
                    step: DeleteStep::AwaitingConfirmation { name: name.clone() },
                },
                Prompt::ConfirmDeletion {
                    entity,
                    name: name.clone(),
                },
            )
        }
        (DeleteStep::AwaitingConfirmation { name }, CallbackAction::Confirm) => {
            if !exists(store, chat, entity, name) {
                return stale();
            }
            let name = name.clone();
            Advance::Done(Outcome::Apply(match entity {
                Entity::Game => Mutation::DeleteGame { name },
                Entity::Player => Mutation::DeletePlayer { name },
            }))
        }
        _ => Advance::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: ChatId = -100;
    const USER: UserId = 42;
    const OTHER_USER: UserId = 43;

    fn catan_store() -> Store {
        let mut store = Store::default();
        store.create_game(CHAT, "Catan").unwrap();
        store.add_player(CHAT, "Alice").unwrap();
        store.add_player(CHAT, "Bob").unwrap();
        store
    }

    fn press(ticket: u64, action: CallbackAction) -> FlowInput<'static> {
        FlowInput::Press(CallbackPayload::new(ticket, action))
    }

    fn prompt_ticket(outcome: &Outcome) -> u64 {
        match outcome {
            Outcome::Prompt { ticket, .. } => *ticket,
            other => panic!("expected a prompt, got {other:?}"),
        }
    }

    #[test]
    fn add_score_without_games_creates_no_flow() {
        let mut engine = FlowEngine::new();
        let outcome = engine.start(CHAT, USER, FlowKind::AddScore, false, &Store::default());
        assert_eq!(outcome, Outcome::Unavailable(Shortage::NoGames));
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn add_score_picks_game_then_player() {
        let store = catan_store();
        let mut engine = FlowEngine::new();

        let outcome = engine.start(CHAT, USER, FlowKind::AddScore, false, &store);
        assert!(matches!(
            &outcome,
            Outcome::Prompt { prompt: Prompt::SelectGame { options, purpose: Purpose::Score }, .. }
                if options == &["Catan"]
        ));
        let ticket = prompt_ticket(&outcome);

        let outcome = engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store);
        assert!(matches!(
            &outcome,
            Outcome::Prompt { prompt: Prompt::SelectPlayer { options, .. }, .. }
                if options == &["Alice", "Bob"]
        ));
        let ticket = prompt_ticket(&outcome);

        let outcome = engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store);
        assert_eq!(
            outcome,
            Outcome::Apply(Mutation::IncrementScore {
                game: "Catan".to_string(),
                player: "Alice".to_string(),
            })
        );
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn add_score_without_players_stops_after_game_pick() {
        let mut store = Store::default();
        store.create_game(CHAT, "Catan").unwrap();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::AddScore, false, &store));
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store),
            Outcome::Unavailable(Shortage::NoPlayers)
        );
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn add_game_rejects_slash_names_and_stays() {
        let store = Store::default();
        let mut engine = FlowEngine::new();
        engine.start(CHAT, USER, FlowKind::AddGame, false, &store);

        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text("/start"), &store),
            Outcome::Retry(Retry::InvalidName {
                entity: Entity::Game,
                name: "/start".to_string(),
            })
        );
        assert!(engine.awaits_text(CHAT, USER));
        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text("Catan"), &store),
            Outcome::Apply(Mutation::CreateGame {
                name: "Catan".to_string()
            })
        );
        assert!(!engine.awaits_text(CHAT, USER));
    }

    #[test]
    fn set_score_requires_authorization() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        engine.start(CHAT, USER, FlowKind::AddPlayer, false, &store);
        assert_eq!(
            engine.start(CHAT, USER, FlowKind::SetScore, false, &store),
            Outcome::Aborted(FlowError::Unauthorized)
        );
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn set_score_cancelled_at_any_step() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::SetScore, true, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Cancel), &store),
            Outcome::Cancelled(FlowKind::SetScore)
        );
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn set_score_reprompts_on_non_numeric_text() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::SetScore, true, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));
        let outcome = engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(1)), &store);
        assert_eq!(
            outcome,
            Outcome::Prompt {
                ticket: ticket + 1,
                prompt: Prompt::EnterValue {
                    game: "Catan".to_string(),
                    player: "Bob".to_string(),
                },
            }
        );

        for text in ["seven", "7.5", "", "7 points"] {
            assert_eq!(
                engine.handle(CHAT, USER, FlowInput::Text(text), &store),
                Outcome::Retry(Retry::NotANumber)
            );
        }
        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text(" -3 "), &store),
            Outcome::Apply(Mutation::SetScore {
                game: "Catan".to_string(),
                player: "Bob".to_string(),
                value: -3,
            })
        );
    }

    #[test]
    fn set_score_accepts_preset_deltas_only() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::SetScore, true, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));

        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Delta(1000)), &store),
            Outcome::Ignored
        );
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Delta(5)), &store),
            Outcome::Apply(Mutation::AdjustScore {
                game: "Catan".to_string(),
                player: "Alice".to_string(),
                delta: 5,
            })
        );
    }

    #[test]
    fn stale_ticket_is_expired_and_leaves_flow_alone() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let first = prompt_ticket(&engine.start(CHAT, USER, FlowKind::AddScore, false, &store));
        let second = prompt_ticket(&engine.start(CHAT, USER, FlowKind::DeleteGame, true, &store));

        assert_eq!(
            engine.handle(CHAT, USER, press(first, CallbackAction::Pick(0)), &store),
            Outcome::Expired
        );
        assert_eq!(engine.ticket(CHAT), Some(second));
        assert_eq!(engine.current(CHAT).map(Flow::kind), Some(FlowKind::DeleteGame));
    }

    #[test]
    fn press_without_any_flow_is_expired() {
        let mut engine = FlowEngine::new();
        assert_eq!(
            engine.handle(CHAT, USER, press(1, CallbackAction::Confirm), &Store::default()),
            Outcome::Expired
        );
        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text("hello"), &Store::default()),
            Outcome::Ignored
        );
    }

    #[test]
    fn delete_game_selects_then_confirms() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::DeleteGame, true, &store));
        let outcome = engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store);
        assert!(matches!(
            &outcome,
            Outcome::Prompt { prompt: Prompt::ConfirmDeletion { entity: Entity::Game, name }, .. }
                if name == "Catan"
        ));
        let ticket = prompt_ticket(&outcome);
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Confirm), &store),
            Outcome::Apply(Mutation::DeleteGame {
                name: "Catan".to_string()
            })
        );
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Confirm), &store),
            Outcome::Expired
        );
    }

    #[test]
    fn delete_player_on_empty_roster_is_unavailable() {
        let mut store = Store::default();
        store.create_game(CHAT, "Catan").unwrap();
        let mut engine = FlowEngine::new();
        assert_eq!(
            engine.start(CHAT, USER, FlowKind::DeletePlayer, true, &store),
            Outcome::Unavailable(Shortage::NoPlayers)
        );
        assert_eq!(
            engine.start(CHAT, USER, FlowKind::DeletePlayer, false, &store),
            Outcome::Aborted(FlowError::Unauthorized)
        );
    }

    #[test]
    fn vanished_game_aborts_with_stale_reference() {
        let mut store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::DeleteGame, true, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));

        store.delete_game(CHAT, "Catan").unwrap();
        let before = store.clone();
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Confirm), &store),
            Outcome::Aborted(FlowError::StaleReference)
        );
        assert_eq!(store, before);
        assert!(engine.current(CHAT).is_none());
    }

    #[test]
    fn vanished_player_aborts_at_selection() {
        let mut store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::AddScore, false, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));
        store.delete_player(CHAT, "Bob").unwrap();
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(1)), &store),
            Outcome::Aborted(FlowError::StaleReference)
        );
    }

    #[test]
    fn out_of_range_pick_and_stray_text_are_ignored() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::AddScore, false, &store));
        assert_eq!(
            engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(9)), &store),
            Outcome::Ignored
        );
        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text("Catan"), &store),
            Outcome::Ignored
        );
        assert_eq!(engine.ticket(CHAT), Some(ticket));
    }

    #[test]
    fn flows_are_per_chat() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        engine.start(CHAT, USER, FlowKind::AddGame, false, &store);
        engine.start(7, USER, FlowKind::AddPlayer, false, &store);
        assert_eq!(engine.cancel(CHAT), Some(FlowKind::AddGame));
        assert_eq!(engine.current(7).map(Flow::kind), Some(FlowKind::AddPlayer));
        assert_eq!(engine.cancel(CHAT), None);
    }

    #[test]
    fn input_from_other_users_does_not_advance_the_flow() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        let ticket = prompt_ticket(&engine.start(CHAT, USER, FlowKind::SetScore, true, &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));
        let ticket = prompt_ticket(&engine.handle(CHAT, USER, press(ticket, CallbackAction::Pick(0)), &store));

        assert!(!engine.awaits_text(CHAT, OTHER_USER));
        assert_eq!(
            engine.handle(CHAT, OTHER_USER, FlowInput::Text("999"), &store),
            Outcome::Ignored
        );
        assert_eq!(
            engine.handle(CHAT, OTHER_USER, press(ticket, CallbackAction::Delta(10)), &store),
            Outcome::Expired
        );
        assert_eq!(
            engine.handle(CHAT, OTHER_USER, press(ticket, CallbackAction::Cancel), &store),
            Outcome::Expired
        );
        assert_eq!(engine.ticket(CHAT), Some(ticket));
        assert_eq!(engine.owner(CHAT), Some(USER));

        assert_eq!(
            engine.handle(CHAT, USER, FlowInput::Text("4"), &store),
            Outcome::Apply(Mutation::SetScore {
                game: "Catan".to_string(),
                player: "Alice".to_string(),
                value: 4,
            })
        );
    }

    #[test]
    fn another_user_starting_a_flow_takes_over_the_chat() {
        let store = catan_store();
        let mut engine = FlowEngine::new();
        engine.start(CHAT, USER, FlowKind::AddGame, false, &store);
        engine.start(CHAT, OTHER_USER, FlowKind::AddPlayer, false, &store);
        assert_eq!(engine.owner(CHAT), Some(OTHER_USER));
        assert!(!engine.awaits_text(CHAT, USER));
        assert!(engine.awaits_text(CHAT, OTHER_USER));
    }
}
