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

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use scorekeeper_common::{RecreatePolicy, expand_vars_with};
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_DATA_FILE: &str = "data.json";
const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_MIRROR_BASE_URL: &str = "https://webdav.cloud.mail.ru";
const DEFAULT_MIRROR_REMOTE_PATH: &str = "/tabletop-bot/data.json";
const DEFAULT_MIRROR_PUSH_INTERVAL_MINUTES: u64 = 60;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub api_base_url: String,
    pub data_file: PathBuf,
    pub poll_timeout_seconds: u64,
    pub bind: SocketAddr,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub recreate_policy: RecreatePolicy,
    pub mirror: Option<MirrorSettings>,
}

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub remote_path: String,
    pub push_interval: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    data_file: Option<String>,
    #[serde(default)]
    poll_timeout_seconds: Option<u64>,
    #[serde(default)]
    bind: Option<String>,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default, alias = "recreate_game_policy")]
    recreate_game: Option<RecreatePolicy>,
    #[serde(default)]
    mirror: MirrorSettingsFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MirrorSettingsFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    remote_path: Option<String>,
    #[serde(default)]
    push_interval_minutes: Option<u64>,
}

impl Settings {
    /// Reads the optional YAML file named by `SCOREKEEPER_CONFIG_PATH`, then
    /// fills every key it leaves unset from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let raw = load_settings_file();
        Self::from_sources(raw.as_deref(), |name| std::env::var(name).ok())
    }

    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let file = match yaml {
            Some(raw) => serde_yaml::from_str::<SettingsFile>(&expand_vars_with(raw, &env))
                .context("failed to parse scorekeeper config yaml")?,
            None => SettingsFile::default(),
        };
        let env_string = |name: &str| normalize_optional_string(env(name));

        let bot_token = normalize_optional_string(file.bot_token)
            .or_else(|| env_string("BOT_TOKEN"))
            .context("BOT_TOKEN is not set")?;

        let bind = normalize_optional_string(file.bind)
            .or_else(|| env_string("SCOREKEEPER_BIND"))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse::<SocketAddr>()
            .context(format!("invalid SCOREKEEPER_BIND {bind:?}"))?;

        let recreate_policy = match file.recreate_game {
            Some(policy) => policy,
            None => match env_string("RECREATE_GAME_POLICY") {
                Some(value) => parse_recreate_policy(&value)?,
                None => RecreatePolicy::default(),
            },
        };

        let mirror_file = file.mirror;
        let username =
            normalize_optional_string(mirror_file.username).or_else(|| env_string("MAILRU_USERNAME"));
        let password =
            normalize_optional_string(mirror_file.password).or_else(|| env_string("MAILRU_PASSWORD"));
        let mirror = match (username, password) {
            (Some(username), Some(password)) => Some(MirrorSettings {
                base_url: normalize_optional_string(mirror_file.base_url)
                    .or_else(|| env_string("MIRROR_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_MIRROR_BASE_URL.to_string()),
                username,
                password,
                remote_path: normalize_optional_string(mirror_file.remote_path)
                    .or_else(|| env_string("MIRROR_REMOTE_PATH"))
                    .unwrap_or_else(|| DEFAULT_MIRROR_REMOTE_PATH.to_string()),
                push_interval: Duration::from_secs(
                    60 * mirror_file
                        .push_interval_minutes
                        .or_else(|| env_u64(&env, "MIRROR_PUSH_INTERVAL_MINUTES"))
                        .filter(|minutes| *minutes > 0)
                        .unwrap_or(DEFAULT_MIRROR_PUSH_INTERVAL_MINUTES),
                ),
            }),
            (None, None) => None,
            _ => {
                warn!("only one of MAILRU_USERNAME and MAILRU_PASSWORD is set; remote mirror disabled");
                None
            }
        };

        Ok(Self {
            bot_token,
            api_base_url: normalize_optional_string(file.api_base_url)
                .or_else(|| env_string("TELEGRAM_API_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            data_file: PathBuf::from(
                normalize_optional_string(file.data_file)
                    .or_else(|| env_string("DATA_FILE_PATH"))
                    .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string()),
            ),
            poll_timeout_seconds: file
                .poll_timeout_seconds
                .or_else(|| env_u64(&env, "POLL_TIMEOUT_SECONDS"))
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECONDS),
            bind,
            webhook_url: normalize_optional_string(file.webhook_url)
                .or_else(|| env_string("WEBHOOK_URL")),
            webhook_secret: normalize_optional_string(file.webhook_secret)
                .or_else(|| env_string("WEBHOOK_SECRET")),
            recreate_policy,
            mirror,
        })
    }
}

fn load_settings_file() -> Option<String> {
    let path = normalize_optional_string(std::env::var("SCOREKEEPER_CONFIG_PATH").ok())?;
    match std::fs::read_to_string(&path) {
        Ok(raw) if raw.trim().is_empty() => {
            warn!(path = %path, "scorekeeper config file is empty");
            None
        }
        Ok(raw) => {
            info!(path = %path, "loaded scorekeeper config file");
            Some(raw)
        }
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read scorekeeper config file");
            None
        }
    }
}

fn parse_recreate_policy(value: &str) -> anyhow::Result<RecreatePolicy> {
    match value.to_ascii_lowercase().as_str() {
        "reset" => Ok(RecreatePolicy::Reset),
        "keep" => Ok(RecreatePolicy::Keep),
        other => anyhow::bail!("invalid RECREATE_GAME_POLICY {other:?}, expected reset or keep"),
    }
}

fn env_u64(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let value = normalize_optional_string(env(name))?;
    match value.parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(name, value = %value, error = %error, "ignoring non-numeric setting");
            None
        }
    }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}
