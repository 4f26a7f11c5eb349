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

//! User-facing texts. Every chat picks one of two voices; the alternate
//! voice is the dungeon-master persona toggled by `/set_true_nature`.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::store::{ChatState, Game};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Normal,
    Alternate,
}

impl Theme {
    pub fn from_flag(alternate: bool) -> Self {
        if alternate {
            Theme::Alternate
        } else {
            Theme::Normal
        }
    }

    pub fn is_alternate(self) -> bool {
        self == Theme::Alternate
    }

    pub fn toggled(self) -> Self {
        Theme::from_flag(!self.is_alternate())
    }

    pub fn render(self, text: Text<'_>) -> String {
        match self {
            Theme::Normal => normal(text),
            Theme::Alternate => alternate(text),
        }
    }
}

/// Message keys with their arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text<'a> {
    Start,
    Help,
    EnterGameName,
    EnterPlayerName,
    GameCreated(&'a str),
    GameWrongName(&'a str),
    PlayerAdded(&'a str),
    PlayerWrongName(&'a str),
    NoGames,
    NoPlayers,
    SelectGame,
    SelectPlayer,
    SelectGameForDeletion,
    SelectPlayerForDeletion,
    ConfirmGameDeletion(&'a str),
    ConfirmPlayerDeletion(&'a str),
    GameDeleted(&'a str),
    PlayerDeleted(&'a str),
    DeletionCancelled,
    AdminOnlyGames,
    AdminOnlyPlayers,
    AdminOnlyScores,
    ScoreCancelled,
    EnterCustomScore { player: &'a str, game: &'a str },
    PleaseEnterNumber,
    OperationCancelled,
    ThemeChanged(Theme),
    ListHeader,
    NoScores,
    PlayersHeader,
    CancelButton,
    ConfirmDeleteButton,
}

const COMMANDS: &str = "/add_game - Create a new tabletop game\n\
/add_player - Add a player\n\
/list - Show games, scores and players\n\
/add_score - Add a point to a score\n\
/set_score - (admins only) Set a score\n\
/delete_game - (admins only) Delete a game\n\
/delete_player - (admins only) Delete a player\n\
/help - Show this message";

const ALTERNATE_COMMANDS: &str = "/add_game - Forge a new quest\n\
/add_player - Recruit an adventurer\n\
/list - Read the chronicle\n\
/add_score - Award glory\n\
/set_score - (Dungeon Master only) Rewrite glory\n\
/delete_game - (Dungeon Master only) Abandon a quest\n\
/delete_player - (Dungeon Master only) Banish an adventurer\n\
/help - Show this message";

fn normal(text: Text<'_>) -> String {
    match text {
        Text::Start => format!(
            "Hi! I keep score for your tabletop games.\n\nAvailable commands:\n{COMMANDS}"
        ),
        Text::Help => format!("Available commands:\n\n{COMMANDS}"),
        Text::EnterGameName => "Enter the name of the game:".to_string(),
        Text::EnterPlayerName => "Enter the player's name:".to_string(),
        Text::GameCreated(game) => format!(
            "Game \"{game}\" created!\nUse:\n/add_player - add a player\n/add_score - add points"
        ),
        Text::GameWrongName(game) => format!(
            "\"{game}\" is not a valid game name! Enter a name that does not start with a slash."
        ),
        Text::PlayerAdded(player) => format!("Player \"{player}\" added!"),
        Text::PlayerWrongName(player) => format!(
            "\"{player}\" is not a valid player name! Enter a name that does not start with a slash."
        ),
        Text::NoGames => "There are no games in this chat yet.".to_string(),
        Text::NoPlayers => "There are no players in this chat yet.".to_string(),
        Text::SelectGame => "Choose a game:".to_string(),
        Text::SelectPlayer => "Choose a player:".to_string(),
        Text::SelectGameForDeletion => "Choose a game to delete:".to_string(),
        Text::SelectPlayerForDeletion => "Choose a player to delete:".to_string(),
        Text::ConfirmGameDeletion(game) => format!(
            "Are you sure you want to delete the game \"{game}\"?\nThis cannot be undone!"
        ),
        Text::ConfirmPlayerDeletion(player) => format!(
            "Are you sure you want to delete the player \"{player}\"?\nThis cannot be undone!"
        ),
        Text::GameDeleted(game) => format!("Game \"{game}\" deleted!"),
        Text::PlayerDeleted(player) => format!("Player \"{player}\" deleted!"),
        Text::DeletionCancelled => "Deletion cancelled".to_string(),
        Text::AdminOnlyGames => "Only administrators can delete games!".to_string(),
        Text::AdminOnlyPlayers => "Only administrators can delete players!".to_string(),
        Text::AdminOnlyScores => "Only administrators can change scores!".to_string(),
        Text::ScoreCancelled => "Score change cancelled".to_string(),
        Text::EnterCustomScore { player, game } => {
            format!("Enter the new score for {player} in {game}:")
        }
        Text::PleaseEnterNumber => "Please enter a number.".to_string(),
        Text::OperationCancelled => "Operation cancelled".to_string(),
        Text::ThemeChanged(Theme::Alternate) => "The Dungeon Master takes the table.".to_string(),
        Text::ThemeChanged(Theme::Normal) => "The Dungeon Master leaves the table.".to_string(),
        Text::ListHeader => "Your games:".to_string(),
        Text::NoScores => "No scores".to_string(),
        Text::PlayersHeader => "Players:".to_string(),
        Text::CancelButton => "Cancel".to_string(),
        Text::ConfirmDeleteButton => "Yes, delete".to_string(),
    }
}

fn alternate(text: Text<'_>) -> String {
    match text {
        Text::Start => format!(
            "🐉 Welcome, traveller! 🐉\n\n🐉 The Dungeon Master's spells: 🐉\n{ALTERNATE_COMMANDS}"
        ),
        Text::Help => format!("🐉 The Dungeon Master's spells: 🐉\n\n{ALTERNATE_COMMANDS}"),
        Text::EnterGameName => "🐉 Name thy quest: 🐉".to_string(),
        Text::EnterPlayerName => "🐉 Name the adventurer: 🐉".to_string(),
        Text::GameCreated(game) => format!(
            "🐉 A new quest begins! \"{game}\" is forged! 🐉\n🐉 Speak these words: 🐉\n\
             /add_player - recruit an adventurer\n/add_score - award glory"
        ),
        Text::GameWrongName(game) => format!(
            "🐉 Foolish mortal. \"{game}\" is no name for a quest! Speak it without a slash. 🐉"
        ),
        Text::PlayerAdded(player) => {
            format!("🐉 Welcome to the party! Adventurer \"{player}\" joins! 🐉")
        }
        Text::PlayerWrongName(player) => format!(
            "🐉 Foolish mortal. \"{player}\" is no name for an adventurer! Speak it without a slash. 🐉"
        ),
        Text::NoGames => "🐉 Alas! This realm has no quests yet! 🐉".to_string(),
        Text::NoPlayers => "🐉 Alas! This realm has no adventurers yet! 🐉".to_string(),
        Text::SelectGame => "🐉 Choose thy quest: 🐉".to_string(),
        Text::SelectPlayer => "🐉 Choose the adventurer: 🐉".to_string(),
        Text::SelectGameForDeletion => "🐉 Which quest shall be abandoned? 🐉".to_string(),
        Text::SelectPlayerForDeletion => "🐉 Which adventurer shall be banished? 🐉".to_string(),
        Text::ConfirmGameDeletion(game) => format!(
            "🐉 Truly abandon the quest \"{game}\"? 🐉\n🐉 There is no resurrection spell for this! 🐉"
        ),
        Text::ConfirmPlayerDeletion(player) => format!(
            "🐉 Truly banish the adventurer \"{player}\"? 🐉\n🐉 There is no resurrection spell for this! 🐉"
        ),
        Text::GameDeleted(game) => format!("🐉 The quest \"{game}\" is lost to legend! 🐉"),
        Text::PlayerDeleted(player) => format!("🐉 Adventurer \"{player}\" is banished! 🐉"),
        Text::DeletionCancelled => "🐉 Mercy is granted. Nothing is destroyed! 🐉".to_string(),
        Text::AdminOnlyGames => {
            "🐉 You shall not pass! 🐉\nOnly the Dungeon Master may abandon quests!".to_string()
        }
        Text::AdminOnlyPlayers => {
            "🐉 You shall not pass! 🐉\nOnly the Dungeon Master may banish adventurers!"
                .to_string()
        }
        Text::AdminOnlyScores => {
            "🐉 You shall not pass! 🐉\nOnly the Dungeon Master may rewrite glory!".to_string()
        }
        Text::ScoreCancelled => "🐉 Glory stays as it was! 🐉".to_string(),
        Text::EnterCustomScore { player, game } => {
            format!("🐉 Speak the new glory of adventurer {player} in the quest {game}: 🐉")
        }
        Text::PleaseEnterNumber => "🐉 You shall not pass! Speak a number! 🐉".to_string(),
        Text::OperationCancelled => "🐉 Alas! The spell fizzles 🐉".to_string(),
        Text::ThemeChanged(Theme::Alternate) => "🐉 THE DUNGEON MASTER AWAKENS! 🐉".to_string(),
        Text::ThemeChanged(Theme::Normal) => "🐉 THE DUNGEON MASTER SLEEPS! 🐉".to_string(),
        Text::ListHeader => "🐉 The chronicle of quests: 🐉".to_string(),
        Text::NoScores => "No glory yet".to_string(),
        Text::PlayersHeader => "Adventurers:".to_string(),
        Text::CancelButton => "Retreat".to_string(),
        Text::ConfirmDeleteButton => "Yes, destroy".to_string(),
    }
}

/// `"{game}:\n"` followed by one `"{player}: {score}\n"` line per scored player.
pub fn render_board(game: &Game) -> String {
    let mut board = format!("{}:\n", game.name);
    for (player, score) in &game.scores {
        let _ = writeln!(board, "{player}: {score}");
    }
    board
}

/// The `/list` reply, or the "no games" notice when the chat has none.
pub fn render_list(theme: Theme, chat: Option<&ChatState>) -> String {
    let Some(chat) = chat.filter(|chat| !chat.games.is_empty()) else {
        return theme.render(Text::NoGames);
    };

    let mut message = format!("{}\n\n", theme.render(Text::ListHeader));
    for game in &chat.games {
        let _ = writeln!(message, "{}:", game.name);
        if game.scores.is_empty() {
            let _ = writeln!(message, "  {}", theme.render(Text::NoScores));
        } else {
            for (player, score) in &game.scores {
                let _ = writeln!(message, "  {player}: {score}");
            }
        }
        message.push('\n');
    }

    if !chat.players.is_empty() {
        let _ = writeln!(message, "{}", theme.render(Text::PlayersHeader));
        for player in &chat.players {
            let _ = writeln!(message, "- {player}");
        }
    }
    message
}
