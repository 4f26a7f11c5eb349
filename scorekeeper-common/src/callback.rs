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

//! Button payloads. Each button carries the ticket of the flow that rendered
//! it and an action; entity names are referenced by index only.

use serde::{Deserialize, Serialize};

/// Upper bound the chat transport puts on button data.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallbackAction {
    Cancel,
    Confirm,
    /// Index into the options captured when the buttons were rendered.
    Pick(usize),
    Delta(i64),
}

/// Field order is the wire order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackPayload {
    #[serde(rename = "a")]
    pub action: CallbackAction,
    #[serde(rename = "t")]
    pub ticket: u64,
}

impl CallbackPayload {
    pub fn new(ticket: u64, action: CallbackAction) -> Self {
        Self { ticket, action }
    }

    /// Compact JSON form, e.g. `{"a":{"pick":3},"t":7}`.
    pub fn encode(&self) -> String {
        // Integers and unit variants always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// `None` for anything this bot did not produce.
    pub fn decode(data: &str) -> Option<Self> {
        if data.len() > MAX_CALLBACK_DATA_LEN {
            return None;
        }
        serde_json::from_str(data).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub payload: CallbackPayload,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, ticket: u64, action: CallbackAction) -> Self {
        Self {
            text: text.into(),
            payload: CallbackPayload::new(ticket, action),
        }
    }
}

/// Rows of buttons.
pub type InlineKeyboard = Vec<Vec<InlineButton>>;
