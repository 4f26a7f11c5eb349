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

//! Telegram Bot API client: update decoding, replies and admin lookups.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use scorekeeper_common::{COMMAND_PREFIX, ChatId, InlineKeyboard, UserId};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;

use crate::dispatcher::{Authorizer, ChatRef, ChatTransport, Inbound, MessageId};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    fn chat_ref(&self) -> ChatRef {
        ChatRef {
            id: self.id,
            private: self.kind == "private",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

impl ChatMember {
    pub fn is_admin(&self) -> bool {
        matches!(self.status.as_str(), "creator" | "administrator")
    }
}

impl Update {
    /// `None` for updates the bot does not react to (edits, stickers, joins)
    /// and for commands addressed to a bot other than `bot_username`.
    pub fn into_inbound(self, bot_username: Option<&str>) -> Option<Inbound> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(Inbound::Callback {
                chat: message.chat.chat_ref(),
                user: query.from.id,
                callback_id: query.id,
                message_id: message.message_id,
                data: query.data?,
            });
        }

        let message = self.message?;
        let chat = message.chat.chat_ref();
        let user = message.from.map(|from| from.id).unwrap_or_default();
        let text = message.text?;
        let Some(command) = parse_command(&text) else {
            return Some(Inbound::Text { chat, user, text });
        };
        if let (Some(addressee), Some(own)) = (command.addressee, bot_username) {
            if !addressee.eq_ignore_ascii_case(own) {
                debug!(chat_id = chat.id, addressee = %addressee, "ignoring command for another bot");
                return None;
            }
        }
        let (name, args) = (command.name.to_string(), command.args.to_string());
        Some(Inbound::Command {
            chat,
            user,
            name,
            args,
            text,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedCommand<'a> {
    name: &'a str,
    /// The `@bot` suffix, without the `@`.
    addressee: Option<&'a str>,
    args: &'a str,
}

/// Splits `/name@bot args` into the bare name, the addressed bot and the
/// trimmed arguments.
fn parse_command(text: &str) -> Option<ParsedCommand<'_>> {
    let rest = text.strip_prefix(COMMAND_PREFIX)?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, addressee) = match head.split_once('@') {
        Some((name, addressee)) => (name, Some(addressee)),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        name,
        addressee,
        args,
    })
}

fn reply_markup(keyboard: &InlineKeyboard) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    json!({
                        "text": button.text,
                        "callback_data": button.payload.encode(),
                    })
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_base_url: &str, token: &str, poll_timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_seconds + 15))
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), token),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<T> {
        // Request errors carry the URL, which embeds the bot token.
        let response = self
            .client
            .post(self.endpoint(method))
            .json(&payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context(format!("failed to call telegram {method}"))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context(format!("failed to decode telegram {method} response ({status})"))?;

        if !body.ok {
            anyhow::bail!(
                "telegram {method} returned {status}: {}",
                body.description
                    .unwrap_or_else(|| "<no description>".to_string())
            );
        }
        body.result
            .context(format!("telegram {method} returned no result"))
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> anyhow::Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_seconds,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    /// The bot's own account, used to recognise `/command@username`.
    pub async fn get_me(&self) -> anyhow::Result<User> {
        self.call("getMe", json!({})).await
    }

    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> anyhow::Result<()> {
        let commands: Vec<serde_json::Value> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        self.call::<bool>("setMyCommands", json!({ "commands": commands }))
            .await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> anyhow::Result<()> {
        let mut payload = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            payload["secret_token"] = json!(secret);
        }
        self.call::<bool>("setWebhook", payload).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> anyhow::Result<()> {
        self.call::<bool>("deleteWebhook", json!({})).await?;
        Ok(())
    }

    pub async fn get_chat_member(&self, chat: ChatId, user: UserId) -> anyhow::Result<ChatMember> {
        self.call(
            "getChatMember",
            json!({ "chat_id": chat, "user_id": user }),
        )
        .await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> anyhow::Result<MessageId> {
        let mut payload = json!({ "chat_id": chat, "text": text });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = reply_markup(keyboard);
        }
        let message: Message = self.call("sendMessage", payload).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> anyhow::Result<()> {
        let mut payload = json!({ "chat_id": chat, "message_id": message_id, "text": text });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = reply_markup(keyboard);
        }
        // The result is the edited message, or `true` for inline messages.
        self.call::<serde_json::Value>("editMessageText", payload)
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> anyhow::Result<()> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        self.call::<bool>("answerCallbackQuery", payload).await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.call::<bool>(
            "deleteMessage",
            json!({ "chat_id": chat, "message_id": message_id }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Authorizer for TelegramClient {
    async fn is_authorized(&self, chat: ChatRef, user: UserId) -> anyhow::Result<bool> {
        if chat.private {
            return Ok(true);
        }
        let member = self.get_chat_member(chat.id, user).await?;
        debug!(chat_id = chat.id, user_id = user, status = %member.status, "chat member looked up");
        Ok(member.is_admin())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use scorekeeper_common::{CallbackAction, CallbackPayload, InlineButton};

    use super::*;
    use crate::test_support::{FakeServer, RecordedRequest};

    fn update(raw: serde_json::Value) -> Option<Inbound> {
        serde_json::from_value::<Update>(raw)
            .unwrap()
            .into_inbound(Some("ScoreBot"))
    }

    fn group_command(text: &str) -> serde_json::Value {
        json!({
            "update_id": 6,
            "message": {
                "message_id": 14,
                "chat": { "id": -5, "type": "group" },
                "from": { "id": 42 },
                "text": text
            }
        })
    }

    fn ok(result: serde_json::Value) -> (StatusCode, Vec<u8>) {
        (
            StatusCode::OK,
            json!({ "ok": true, "result": result }).to_string().into_bytes(),
        )
    }

    fn method(request: &RecordedRequest) -> &str {
        request.path.rsplit('/').next().unwrap_or_default()
    }

    #[test]
    fn command_suffix_and_arguments_are_split() {
        let inbound = update(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": -5, "type": "supergroup" },
                "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
                "text": "/add_game@ScoreBot  Ticket to Ride "
            }
        }));
        assert_eq!(
            inbound,
            Some(Inbound::Command {
                chat: ChatRef {
                    id: -5,
                    private: false
                },
                user: 42,
                name: "add_game".to_string(),
                args: "Ticket to Ride".to_string(),
                text: "/add_game@ScoreBot  Ticket to Ride ".to_string(),
            })
        );
    }

    #[test]
    fn commands_for_other_bots_are_skipped() {
        assert!(update(group_command("/start@OtherBot")).is_none());
        assert!(update(group_command("/list@otherbot extra")).is_none());
        assert!(matches!(
            update(group_command("/list@scorebot")),
            Some(Inbound::Command { name, .. }) if name == "list"
        ));
        assert!(matches!(
            update(group_command("/list")),
            Some(Inbound::Command { name, .. }) if name == "list"
        ));

        let unknown_self = serde_json::from_value::<Update>(group_command("/start@OtherBot"))
            .unwrap()
            .into_inbound(None);
        assert!(matches!(unknown_self, Some(Inbound::Command { name, .. }) if name == "start"));
    }

    #[test]
    fn parse_command_separates_addressee() {
        assert_eq!(
            parse_command("/set_score@ScoreBot 5"),
            Some(ParsedCommand {
                name: "set_score",
                addressee: Some("ScoreBot"),
                args: "5",
            })
        );
        assert_eq!(parse_command("/@ScoreBot"), None);
        assert_eq!(parse_command("Catan"), None);
    }

    #[tokio::test]
    async fn get_me_reads_username() {
        let server = FakeServer::spawn(|request| match method(request) {
            "getMe" => ok(json!({ "id": 99, "is_bot": true, "first_name": "Score", "username": "ScoreBot" })),
            _ => (StatusCode::NOT_FOUND, Vec::new()),
        })
        .await;
        let client = TelegramClient::new(&server.base_url, "t", 1).unwrap();
        let me = client.get_me().await.unwrap();
        assert_eq!(me.id, 99);
        assert_eq!(me.username.as_deref(), Some("ScoreBot"));
    }

    #[test]
    fn plain_text_and_bare_slash_are_text() {
        for text in ["Catan", "/"] {
            let inbound = update(json!({
                "update_id": 2,
                "message": {
                    "message_id": 11,
                    "chat": { "id": 9, "type": "private" },
                    "from": { "id": 9 },
                    "text": text
                }
            }));
            assert_eq!(
                inbound,
                Some(Inbound::Text {
                    chat: ChatRef {
                        id: 9,
                        private: true
                    },
                    user: 9,
                    text: text.to_string(),
                })
            );
        }
    }

    #[test]
    fn callback_query_keeps_message_and_data() {
        let inbound = update(json!({
            "update_id": 3,
            "callback_query": {
                "id": "77",
                "from": { "id": 42 },
                "message": { "message_id": 12, "chat": { "id": -5, "type": "group" }, "text": "Choose a game:" },
                "data": "{\"a\":\"cancel\",\"t\":1}"
            }
        }));
        assert_eq!(
            inbound,
            Some(Inbound::Callback {
                chat: ChatRef {
                    id: -5,
                    private: false
                },
                user: 42,
                callback_id: "77".to_string(),
                message_id: 12,
                data: "{\"a\":\"cancel\",\"t\":1}".to_string(),
            })
        );
    }

    #[test]
    fn non_text_updates_are_skipped() {
        assert!(update(json!({
            "update_id": 4,
            "message": { "message_id": 13, "chat": { "id": 1, "type": "group" }, "sticker": {} }
        }))
        .is_none());
        assert!(update(json!({ "update_id": 5, "edited_message": {} })).is_none());
    }

    #[tokio::test]
    async fn send_message_posts_text_and_keyboard() {
        let server = FakeServer::spawn(|request| match method(request) {
            "sendMessage" => ok(json!({ "message_id": 55, "chat": { "id": -5, "type": "group" } })),
            _ => (StatusCode::NOT_FOUND, Vec::new()),
        })
        .await;
        let client = TelegramClient::new(&server.base_url, "123:abc", 1).unwrap();
        let keyboard = vec![vec![InlineButton::new("Catan", 3, CallbackAction::Pick(0))]];

        let message_id = client
            .send_message(-5, "Choose a game:", Some(&keyboard))
            .await
            .unwrap();
        assert_eq!(message_id, 55);

        let requests = server.requests();
        assert_eq!(requests[0].path, "/bot123:abc/sendMessage");
        assert_eq!(
            requests[0].json(),
            json!({
                "chat_id": -5,
                "text": "Choose a game:",
                "reply_markup": {
                    "inline_keyboard": [[{
                        "text": "Catan",
                        "callback_data": CallbackPayload::new(3, CallbackAction::Pick(0)).encode(),
                    }]]
                }
            })
        );
    }

    #[tokio::test]
    async fn api_errors_surface_the_description() {
        let server = FakeServer::spawn(|_| {
            (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error_code": 400, "description": "Bad Request: message is not modified" })
                    .to_string()
                    .into_bytes(),
            )
        })
        .await;
        let client = TelegramClient::new(&server.base_url, "123:abc", 1).unwrap();

        let error = client.edit_message(-5, 12, "same", None).await.unwrap_err();
        let rendered = format!("{error:#}");
        assert!(rendered.contains("message is not modified"));
        assert!(!rendered.contains("123:abc"));
    }

    #[tokio::test]
    async fn only_group_admins_are_authorized() {
        let server = FakeServer::spawn(|request| {
            let user = request.json()["user_id"].as_i64().unwrap_or_default();
            let status = match user {
                1 => "creator",
                2 => "administrator",
                _ => "member",
            };
            ok(json!({ "status": status, "user": { "id": user } }))
        })
        .await;
        let client = TelegramClient::new(&server.base_url, "t", 1).unwrap();
        let group = ChatRef {
            id: -5,
            private: false,
        };

        assert!(client.is_authorized(group, 1).await.unwrap());
        assert!(client.is_authorized(group, 2).await.unwrap());
        assert!(!client.is_authorized(group, 3).await.unwrap());

        let private = ChatRef {
            id: 3,
            private: true,
        };
        assert!(client.is_authorized(private, 3).await.unwrap());
        assert_eq!(server.requests().len(), 3);
        assert!(
            server
                .requests()
                .iter()
                .all(|request| method(request) == "getChatMember")
        );
    }

    #[tokio::test]
    async fn get_updates_decodes_batch() {
        let server = FakeServer::spawn(|_| {
            ok(json!([
                { "update_id": 7, "message": { "message_id": 1, "chat": { "id": 1, "type": "private" }, "text": "/list" } },
                { "update_id": 8, "my_chat_member": {} }
            ]))
        })
        .await;
        let client = TelegramClient::new(&server.base_url, "t", 1).unwrap();

        let updates = client.get_updates(Some(7), 0).await.unwrap();
        assert_eq!(updates.iter().map(|u| u.update_id).collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(server.requests()[0].json()["offset"], json!(7));
    }
}
