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

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use scorekeeper_common::RemoteMirror;
use tracing::debug;

use crate::config::MirrorSettings;

/// Snapshot mirror on a WebDAV share (the mail.ru cloud by default).
#[derive(Clone)]
pub struct WebDavMirror {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    remote_path: String,
}

impl WebDavMirror {
    pub fn new(settings: &MirrorSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build webdav http client")?;
        let remote_path = if settings.remote_path.starts_with('/') {
            settings.remote_path.clone()
        } else {
            format!("/{}", settings.remote_path)
        };
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            remote_path,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The collection holding the snapshot, e.g. `/tabletop-bot/`.
    fn parent_collection(&self) -> Option<String> {
        let (parent, _) = self.remote_path.rsplit_once('/')?;
        (!parent.is_empty()).then(|| format!("{parent}/"))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn ensure_parent_collection(&self) -> anyhow::Result<()> {
        let Some(parent) = self.parent_collection() else {
            return Ok(());
        };
        let mkcol = Method::from_bytes(b"MKCOL").context("invalid MKCOL method")?;
        let response = self
            .request(mkcol, &parent)
            .send()
            .await
            .context("failed to create webdav collection")?;
        let status = response.status();
        // 405 means the collection already exists.
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
            debug!(collection = %parent, %status, "webdav collection ready");
            return Ok(());
        }
        anyhow::bail!("webdav MKCOL {parent} returned {status}");
    }
}

#[async_trait]
impl RemoteMirror for WebDavMirror {
    async fn fetch(&self) -> anyhow::Result<Option<Vec<u8>>> {
        let response = self
            .request(Method::GET, &self.remote_path)
            .send()
            .await
            .context("failed to download snapshot from webdav")?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("webdav GET {} returned {status}", self.remote_path);
        }
        let bytes = response
            .bytes()
            .await
            .context("failed to read webdav snapshot body")?;
        Ok(Some(bytes.to_vec()))
    }

    async fn push(&self, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.ensure_parent_collection().await?;
        let response = self
            .request(Method::PUT, &self.remote_path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .context("failed to upload snapshot to webdav")?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("webdav PUT {} returned {status}: {body}", self.remote_path);
        }
        Ok(())
    }
}
