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

//! Routes inbound chat events to store operations and flow transitions,
//! and renders the replies.

use std::sync::Arc;

use async_trait::async_trait;
use scorekeeper_common::{
    CallbackAction, CallbackPayload, ChatId, Entity, FlowEngine, FlowError,
    FlowInput, FlowKind, InlineButton, InlineKeyboard, Mutation, Outcome, Prompt, Purpose, Retry,
    SCORE_DELTAS, SaveOutcome, Shortage, Snapshot, SnapshotFile, Store, StoreError, Text, Theme,
    UserId, render_board, render_list,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRef {
    pub id: ChatId,
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command {
        chat: ChatRef,
        user: UserId,
        /// Without the leading slash and any `@botname` suffix.
        name: String,
        args: String,
        text: String,
    },
    Text {
        chat: ChatRef,
        user: UserId,
        text: String,
    },
    Callback {
        chat: ChatRef,
        user: UserId,
        callback_id: String,
        message_id: MessageId,
        data: String,
    },
}

impl Inbound {
    pub fn chat(&self) -> ChatRef {
        match self {
            Inbound::Command { chat, .. }
            | Inbound::Text { chat, .. }
            | Inbound::Callback { chat, .. } => *chat,
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> anyhow::Result<MessageId>;

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> anyhow::Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> anyhow::Result<()>;

    async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(&self, chat: ChatRef, user: UserId) -> anyhow::Result<bool>;
}

/// Commands advertised to the chat client.
pub const BOT_COMMANDS: [(&str, &str); 9] = [
    ("start", "Greeting and command list"),
    ("add_game", "Create a new tabletop game"),
    ("add_player", "Add a player"),
    ("list", "Show games, scores and players"),
    ("add_score", "Add a point to a score"),
    ("set_score", "(admins only) Set a score"),
    ("delete_game", "(admins only) Delete a game"),
    ("delete_player", "(admins only) Delete a player"),
    ("help", "Show the command list"),
];

/// How the reply to a finished step is delivered.
#[derive(Debug, Clone, Copy)]
enum Reply {
    Send,
    Edit(MessageId),
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<RwLock<Store>>,
    flows: Arc<Mutex<FlowEngine>>,
    snapshot_file: Arc<SnapshotFile>,
    transport: Arc<dyn ChatTransport>,
    authorizer: Arc<dyn Authorizer>,
}

impl Dispatcher {
    pub fn new(
        store: Store,
        snapshot_file: Arc<SnapshotFile>,
        transport: Arc<dyn ChatTransport>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            flows: Arc::new(Mutex::new(FlowEngine::new())),
            snapshot_file,
            transport,
            authorizer,
        }
    }

    pub async fn revision(&self) -> u64 {
        self.store.read().await.revision()
    }

    pub fn snapshot_file(&self) -> &SnapshotFile {
        &self.snapshot_file
    }

    /// Handles one event. Transport failures are logged; whatever was
    /// applied to the store before the failure stays applied.
    pub async fn handle(&self, event: Inbound) {
        let chat = event.chat().id;
        let result = match event {
            Inbound::Command {
                chat,
                user,
                name,
                args,
                text,
            } => self.handle_command(chat, user, &name, &args, &text).await,
            Inbound::Text { chat, user, text } => self.handle_text(chat.id, user, &text).await,
            Inbound::Callback {
                chat,
                user,
                callback_id,
                message_id,
                data,
            } => {
                self.handle_callback(chat.id, user, &callback_id, message_id, &data)
                    .await
            }
        };

        if let Err(error) = result {
            warn!(chat_id = chat, error = %format!("{error:#}"), "failed to deliver reply");
        }
    }

    async fn theme(&self, chat: ChatId) -> Theme {
        self.store.read().await.theme(chat)
    }

    async fn send(&self, chat: ChatId, text: &str) -> anyhow::Result<()> {
        self.transport.send_message(chat, text, None).await?;
        Ok(())
    }

    async fn handle_command(
        &self,
        chat: ChatRef,
        user: UserId,
        name: &str,
        args: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        debug!(chat_id = chat.id, user_id = user, command = %name, "command received");
        let theme = self.theme(chat.id).await;
        match name {
            "start" => self.send(chat.id, &theme.render(Text::Start)).await,
            "help" => self.send(chat.id, &theme.render(Text::Help)).await,
            "list" => {
                let message = {
                    let store = self.store.read().await;
                    render_list(theme, store.chat(chat.id))
                };
                self.send(chat.id, &message).await
            }
            "add_game" if !args.is_empty() => {
                let mutation = Mutation::CreateGame {
                    name: args.to_string(),
                };
                self.apply(chat.id, mutation, Reply::Send).await
            }
            "add_player" if !args.is_empty() => {
                let mutation = Mutation::AddPlayer {
                    name: args.to_string(),
                };
                self.apply(chat.id, mutation, Reply::Send).await
            }
            "add_game" => self.start_flow(chat, user, FlowKind::AddGame).await,
            "add_player" => self.start_flow(chat, user, FlowKind::AddPlayer).await,
            "add_score" | "add_count" => self.start_flow(chat, user, FlowKind::AddScore).await,
            "set_score" => self.start_flow(chat, user, FlowKind::SetScore).await,
            "delete_game" => self.start_flow(chat, user, FlowKind::DeleteGame).await,
            "delete_player" => self.start_flow(chat, user, FlowKind::DeletePlayer).await,
            "set_true_nature" => self.toggle_theme(chat.id).await,
            _ => {
                if self.flows.lock().await.awaits_text(chat.id, user) {
                    // A slash-prefixed reply to a name prompt is rejected by the flow.
                    return self.handle_text(chat.id, user, text).await;
                }
                debug!(chat_id = chat.id, command = %name, "ignoring unknown command");
                Ok(())
            }
        }
    }

    async fn authorize(&self, chat: ChatRef, user: UserId) -> bool {
        match self.authorizer.is_authorized(chat, user).await {
            Ok(authorized) => authorized,
            Err(error) => {
                warn!(
                    chat_id = chat.id,
                    user_id = user,
                    error = %format!("{error:#}"),
                    "authorization lookup failed, treating as not authorized"
                );
                false
            }
        }
    }

    async fn start_flow(&self, chat: ChatRef, user: UserId, kind: FlowKind) -> anyhow::Result<()> {
        let authorized = if kind.requires_authorization() {
            self.authorize(chat, user).await
        } else {
            true
        };

        let (theme, outcome) = {
            let store = self.store.read().await;
            let mut flows = self.flows.lock().await;
            (
                store.theme(chat.id),
                flows.start(chat.id, user, kind, authorized, &store),
            )
        };

        match outcome {
            Outcome::Prompt { ticket, prompt } => {
                let (text, keyboard) = render_prompt(theme, ticket, &prompt);
                self.transport
                    .send_message(chat.id, &text, Some(&keyboard))
                    .await?;
                Ok(())
            }
            Outcome::Unavailable(shortage) => {
                self.send(chat.id, &theme.render(shortage_text(shortage)))
                    .await
            }
            Outcome::Aborted(FlowError::Unauthorized) => {
                info!(chat_id = chat.id, user_id = user, ?kind, "flow denied");
                self.send(chat.id, &theme.render(denial_text(kind))).await
            }
            other => {
                debug!(chat_id = chat.id, ?other, "unexpected outcome when starting flow");
                Ok(())
            }
        }
    }

    async fn handle_text(&self, chat: ChatId, user: UserId, text: &str) -> anyhow::Result<()> {
        let (theme, outcome) = {
            let store = self.store.read().await;
            let mut flows = self.flows.lock().await;
            if !flows.awaits_text(chat, user) {
                return Ok(());
            }
            (
                store.theme(chat),
                flows.handle(chat, user, FlowInput::Text(text), &store),
            )
        };

        match outcome {
            Outcome::Apply(mutation) => self.apply(chat, mutation, Reply::Send).await,
            Outcome::Retry(retry) => self.send(chat, &theme.render(retry_text(&retry))).await,
            Outcome::Prompt { ticket, prompt } => {
                let (text, keyboard) = render_prompt(theme, ticket, &prompt);
                self.transport
                    .send_message(chat, &text, Some(&keyboard))
                    .await?;
                Ok(())
            }
            Outcome::Aborted(_) => self.send(chat, &theme.render(Text::OperationCancelled)).await,
            _ => Ok(()),
        }
    }

    async fn handle_callback(
        &self,
        chat: ChatId,
        user: UserId,
        callback_id: &str,
        message_id: MessageId,
        data: &str,
    ) -> anyhow::Result<()> {
        let Some(payload) = CallbackPayload::decode(data) else {
            debug!(chat_id = chat, data = %data, "ignoring undecodable callback data");
            return self.transport.answer_callback(callback_id, None).await;
        };

        let (theme, outcome) = {
            let store = self.store.read().await;
            let mut flows = self.flows.lock().await;
            (
                store.theme(chat),
                flows.handle(chat, user, FlowInput::Press(payload), &store),
            )
        };

        match outcome {
            Outcome::Prompt { ticket, prompt } => {
                let (text, keyboard) = render_prompt(theme, ticket, &prompt);
                self.transport
                    .edit_message(chat, message_id, &text, Some(&keyboard))
                    .await?;
                self.transport.answer_callback(callback_id, None).await
            }
            Outcome::Apply(mutation) => {
                self.apply(chat, mutation, Reply::Edit(message_id)).await?;
                self.transport.answer_callback(callback_id, None).await
            }
            Outcome::Cancelled(kind @ (FlowKind::AddGame | FlowKind::AddPlayer)) => {
                debug!(chat_id = chat, ?kind, "flow cancelled");
                let cancelled = theme.render(Text::OperationCancelled);
                self.transport.delete_message(chat, message_id).await?;
                self.transport
                    .answer_callback(callback_id, Some(&cancelled))
                    .await
            }
            Outcome::Cancelled(kind) => {
                debug!(chat_id = chat, ?kind, "flow cancelled");
                let notice = match kind {
                    FlowKind::DeleteGame | FlowKind::DeletePlayer => Text::DeletionCancelled,
                    _ => Text::ScoreCancelled,
                };
                self.transport
                    .edit_message(chat, message_id, &theme.render(notice), None)
                    .await?;
                self.transport.answer_callback(callback_id, None).await
            }
            Outcome::Unavailable(shortage) => {
                let notice = theme.render(shortage_text(shortage));
                self.transport
                    .edit_message(chat, message_id, &notice, None)
                    .await?;
                self.transport.answer_callback(callback_id, Some(&notice)).await
            }
            Outcome::Aborted(error) => {
                info!(chat_id = chat, error = %error, "flow aborted");
                let cancelled = theme.render(Text::OperationCancelled);
                self.transport
                    .edit_message(chat, message_id, &cancelled, None)
                    .await?;
                self.transport
                    .answer_callback(callback_id, Some(&cancelled))
                    .await
            }
            Outcome::Expired => {
                let cancelled = theme.render(Text::OperationCancelled);
                self.transport
                    .answer_callback(callback_id, Some(&cancelled))
                    .await
            }
            Outcome::Retry(_) | Outcome::Ignored => {
                self.transport.answer_callback(callback_id, None).await
            }
        }
    }

    async fn toggle_theme(&self, chat: ChatId) -> anyhow::Result<()> {
        let (theme, snapshot, revision) = {
            let mut store = self.store.write().await;
            let theme = store.toggle_theme(chat);
            (theme, Snapshot::capture(&store), store.revision())
        };
        info!(chat_id = chat, ?theme, "theme toggled");
        self.persist(snapshot, revision).await;
        self.send(chat, &theme.render(Text::ThemeChanged(theme)))
            .await
    }

    /// Applies `mutation`, flushes the snapshot and reports the result.
    async fn apply(&self, chat: ChatId, mutation: Mutation, reply: Reply) -> anyhow::Result<()> {
        let (message, saved) = {
            let mut store = self.store.write().await;
            let theme = store.theme(chat);
            match store.apply(chat, &mutation) {
                Ok(()) => (
                    confirmation_text(theme, &store, chat, &mutation),
                    Some((Snapshot::capture(&store), store.revision())),
                ),
                Err(error) => {
                    info!(chat_id = chat, error = %error, "mutation rejected");
                    (theme.render(rejection_text(&error, &mutation)), None)
                }
            }
        };

        if let Some((snapshot, revision)) = saved {
            debug!(chat_id = chat, revision, ?mutation, "mutation applied");
            self.persist(snapshot, revision).await;
        }

        match reply {
            Reply::Send => self.send(chat, &message).await,
            Reply::Edit(message_id) => {
                self.transport
                    .edit_message(chat, message_id, &message, None)
                    .await
            }
        }
    }

    async fn persist(&self, snapshot: Snapshot, revision: u64) {
        match self.snapshot_file.save(&snapshot, revision).await {
            Ok(SaveOutcome::Written) => {}
            Ok(SaveOutcome::Skipped) => debug!(revision, "newer snapshot already saved"),
            Err(error) => warn!(revision, error = %error, "failed to save snapshot"),
        }
    }
}

/// Message text and buttons for a flow step.
pub fn render_prompt(theme: Theme, ticket: u64, prompt: &Prompt) -> (String, InlineKeyboard) {
    let cancel_row = vec![InlineButton::new(
        theme.render(Text::CancelButton),
        ticket,
        CallbackAction::Cancel,
    )];
    let option_rows = |options: &[String]| -> InlineKeyboard {
        options
            .iter()
            .enumerate()
            .map(|(index, name)| {
                vec![InlineButton::new(
                    name.clone(),
                    ticket,
                    CallbackAction::Pick(index),
                )]
            })
            .chain(std::iter::once(cancel_row.clone()))
            .collect()
    };

    match prompt {
        Prompt::EnterName(entity) => {
            let text = match entity {
                Entity::Game => Text::EnterGameName,
                Entity::Player => Text::EnterPlayerName,
            };
            (theme.render(text), vec![cancel_row])
        }
        Prompt::SelectGame { options, purpose } => {
            let text = match purpose {
                Purpose::Score => Text::SelectGame,
                Purpose::Delete => Text::SelectGameForDeletion,
            };
            (theme.render(text), option_rows(options))
        }
        Prompt::SelectPlayer { options, purpose } => {
            let text = match purpose {
                Purpose::Score => Text::SelectPlayer,
                Purpose::Delete => Text::SelectPlayerForDeletion,
            };
            (theme.render(text), option_rows(options))
        }
        Prompt::EnterValue { game, player } => {
            let deltas = SCORE_DELTAS
                .iter()
                .map(|delta| {
                    InlineButton::new(format!("{delta:+}"), ticket, CallbackAction::Delta(*delta))
                })
                .collect();
            (
                theme.render(Text::EnterCustomScore { player, game }),
                vec![deltas, cancel_row],
            )
        }
        Prompt::ConfirmDeletion { entity, name } => {
            let text = match entity {
                Entity::Game => Text::ConfirmGameDeletion(name),
                Entity::Player => Text::ConfirmPlayerDeletion(name),
            };
            let confirm = InlineButton::new(
                theme.render(Text::ConfirmDeleteButton),
                ticket,
                CallbackAction::Confirm,
            );
            let cancel = InlineButton::new(
                theme.render(Text::CancelButton),
                ticket,
                CallbackAction::Cancel,
            );
            (theme.render(text), vec![vec![confirm, cancel]])
        }
    }
}

fn confirmation_text(theme: Theme, store: &Store, chat: ChatId, mutation: &Mutation) -> String {
    match mutation {
        Mutation::CreateGame { name } => theme.render(Text::GameCreated(name)),
        Mutation::AddPlayer { name } => theme.render(Text::PlayerAdded(name)),
        Mutation::IncrementScore { game, .. }
        | Mutation::AdjustScore { game, .. }
        | Mutation::SetScore { game, .. } => store
            .game(chat, game)
            .map(render_board)
            .unwrap_or_else(|| format!("{game}:\n")),
        Mutation::DeleteGame { name } => theme.render(Text::GameDeleted(name)),
        Mutation::DeletePlayer { name } => theme.render(Text::PlayerDeleted(name)),
    }
}

fn rejection_text<'a>(error: &'a StoreError, mutation: &Mutation) -> Text<'a> {
    match (error, mutation) {
        (StoreError::InvalidName(name), Mutation::AddPlayer { .. }) => Text::PlayerWrongName(name),
        (StoreError::InvalidName(name), _) => Text::GameWrongName(name),
        _ => Text::OperationCancelled,
    }
}

fn retry_text(retry: &Retry) -> Text<'_> {
    match retry {
        Retry::InvalidName {
            entity: Entity::Game,
            name,
        } => Text::GameWrongName(name),
        Retry::InvalidName {
            entity: Entity::Player,
            name,
        } => Text::PlayerWrongName(name),
        Retry::NotANumber => Text::PleaseEnterNumber,
    }
}

fn shortage_text(shortage: Shortage) -> Text<'static> {
    match shortage {
        Shortage::NoGames => Text::NoGames,
        Shortage::NoPlayers => Text::NoPlayers,
    }
}

fn denial_text(kind: FlowKind) -> Text<'static> {
    match kind {
        FlowKind::DeleteGame => Text::AdminOnlyGames,
        FlowKind::DeletePlayer => Text::AdminOnlyPlayers,
        _ => Text::AdminOnlyScores,
    }
}
