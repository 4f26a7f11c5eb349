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

mod config;
mod dispatcher;
mod telegram;
#[cfg(test)]
mod test_support;
mod webdav;

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use scorekeeper_common::{
    ChatId, NoopMirror, RemoteMirror, SnapshotFile, restore_from_mirror, spawn_mirror_push,
};
use tokio::sync::{Mutex, mpsc};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    dispatcher::{BOT_COMMANDS, Dispatcher, Inbound},
    telegram::{TelegramClient, Update},
    webdav::WebDavMirror,
};

const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type WorkerMap = Arc<Mutex<HashMap<ChatId, mpsc::UnboundedSender<Inbound>>>>;

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    workers: WorkerMap,
    worker_idle_timeout: Duration,
    webhook: Option<WebhookConfig>,
    /// Commands suffixed with another bot's name are ignored.
    bot_username: Option<String>,
}

#[derive(Debug, Clone)]
struct WebhookConfig {
    secret: Option<String>,
}

impl AppState {
    fn new(
        dispatcher: Dispatcher,
        webhook: Option<WebhookConfig>,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            dispatcher,
            workers: Arc::new(Mutex::new(HashMap::new())),
            worker_idle_timeout: WORKER_IDLE_TIMEOUT,
            webhook,
            bot_username,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "scorekeeper_bot=debug,scorekeeper_common=info,tower_http=info".to_string()
        }))
        .init();

    let settings = Settings::load()?;

    let snapshot_file = Arc::new(SnapshotFile::new(settings.data_file.clone()));
    let mirror: Arc<dyn RemoteMirror> = match &settings.mirror {
        Some(mirror_settings) => {
            info!(
                base_url = %mirror_settings.base_url,
                remote_path = %mirror_settings.remote_path,
                "remote mirror enabled"
            );
            Arc::new(WebDavMirror::new(mirror_settings)?)
        }
        None => {
            info!("no mirror credentials configured; using local persistence only");
            Arc::new(NoopMirror)
        }
    };

    restore_from_mirror(mirror.as_ref(), &snapshot_file).await;
    let store = snapshot_file
        .load(settings.recreate_policy)
        .await
        .context(format!(
            "failed to load snapshot from {}",
            settings.data_file.display()
        ))?;

    let telegram = Arc::new(TelegramClient::new(
        &settings.api_base_url,
        &settings.bot_token,
        settings.poll_timeout_seconds,
    )?);
    let bot_username = match telegram.get_me().await {
        Ok(me) => {
            info!(username = ?me.username, "telegram bot identified");
            me.username
        }
        Err(error) => {
            warn!(error = %format!("{error:#}"), "failed to look up bot username");
            None
        }
    };
    if let Err(error) = telegram.set_my_commands(&BOT_COMMANDS).await {
        warn!(error = %format!("{error:#}"), "failed to register bot commands");
    }

    let mirror_task = spawn_mirror_push(
        mirror,
        snapshot_file.clone(),
        settings
            .mirror
            .as_ref()
            .map(|mirror| mirror.push_interval)
            .unwrap_or(Duration::from_secs(3600)),
    );

    let dispatcher = Dispatcher::new(store, snapshot_file, telegram.clone(), telegram.clone());
    let webhook = settings.webhook_url.as_ref().map(|_| WebhookConfig {
        secret: settings.webhook_secret.clone(),
    });
    let state = AppState::new(dispatcher, webhook, bot_username);

    let poller = match &settings.webhook_url {
        Some(url) => {
            telegram
                .set_webhook(url, settings.webhook_secret.as_deref())
                .await
                .context("failed to register telegram webhook")?;
            info!(url = %url, "receiving updates through webhook");
            None
        }
        None => {
            if let Err(error) = telegram.delete_webhook().await {
                warn!(error = %format!("{error:#}"), "failed to clear telegram webhook");
            }
            info!(
                timeout_seconds = settings.poll_timeout_seconds,
                "receiving updates through long polling"
            );
            Some(tokio::spawn(run_polling(
                state.clone(),
                telegram.clone(),
                settings.poll_timeout_seconds,
            )))
        }
    };

    let app = build_router(state);
    info!(bind_addr = %settings.bind, "scorekeeper-bot listening");
    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(poller) = poller {
        poller.abort();
    }
    if let Some(mirror_task) = mirror_task {
        mirror_task.abort();
    }
    info!("scorekeeper-bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telegram/webhook", post(webhook_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "scorekeeper-bot",
        "revision": state.dispatcher.revision().await,
        "last_saved_at": state.dispatcher.snapshot_file().last_saved_at().await,
    }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    let Some(webhook) = &state.webhook else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(secret) = &webhook.secret {
        let presented = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("rejected webhook call with a wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    if let Some(event) = update.into_inbound(state.bot_username.as_deref()) {
        route_event(&state, event).await;
    }
    StatusCode::OK
}

async fn run_polling(state: AppState, telegram: Arc<TelegramClient>, timeout_seconds: u64) {
    let mut offset: Option<i64> = None;
    loop {
        let updates = match telegram.get_updates(offset, timeout_seconds).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "failed to poll telegram updates");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(event) = update.into_inbound(state.bot_username.as_deref()) {
                route_event(&state, event).await;
            }
        }
    }
}

/// Queues `event` on its chat's worker, starting one on first use. Events of
/// one chat are handled in arrival order; chats proceed independently.
async fn route_event(state: &AppState, event: Inbound) {
    let chat = event.chat().id;
    let mut workers = state.workers.lock().await;
    let sender = workers
        .entry(chat)
        .or_insert_with(|| spawn_chat_worker(state, chat));
    if let Err(mpsc::error::SendError(event)) = sender.send(event) {
        warn!(chat_id = chat, "chat worker was gone, restarting it");
        let sender = spawn_chat_worker(state, chat);
        if sender.send(event).is_err() {
            warn!(chat_id = chat, "failed to queue event for restarted chat worker");
        }
        workers.insert(chat, sender);
    }
}

/// Spawns the worker for `chat`. It deregisters itself after sitting idle
/// for `state.worker_idle_timeout`.
fn spawn_chat_worker(state: &AppState, chat: ChatId) -> mpsc::UnboundedSender<Inbound> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Inbound>();
    tokio::spawn(run_chat_worker(
        state.dispatcher.clone(),
        state.workers.clone(),
        state.worker_idle_timeout,
        chat,
        event_rx,
    ));
    event_tx
}

async fn run_chat_worker(
    dispatcher: Dispatcher,
    workers: WorkerMap,
    idle_timeout: Duration,
    chat: ChatId,
    mut event_rx: mpsc::UnboundedReceiver<Inbound>,
) {
    debug!(chat_id = chat, "chat worker started");
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => dispatcher.handle(event).await,
                None => break,
            },
            _ = tokio::time::sleep(idle_timeout) => {
                // Senders queue while holding the map lock, so nothing can
                // arrive between the emptiness check and the removal.
                let mut workers = workers.lock().await;
                match event_rx.try_recv() {
                    Ok(event) => {
                        drop(workers);
                        dispatcher.handle(event).await;
                    }
                    Err(_) => {
                        workers.remove(&chat);
                        break;
                    }
                }
            }
        }
    }
    debug!(chat_id = chat, "chat worker stopped");
}
