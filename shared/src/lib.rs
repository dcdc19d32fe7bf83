//! Host-independent protocol data shared by the overlay and its tests.
//!
//! Everything here is plain data: the wire form of identity list updates,
//! the action and game mode tags, the slot label encoding, the grid layout and
//! a viewer-side model that replays received packets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod label;
pub mod layout;
pub mod view;

pub use label::{decode_label, encode_label, COLOR_CHAR};
pub use layout::{convert_coordinate, Credential, Layout, LayoutEntry, LayoutError, COLUMNS, ROW_WIDTH};
pub use view::TabView;

/// Number of synthetic slots an overlay occupies (4 columns of 20 rows).
pub const OVERLAY_SLOTS: usize = 80;

/// Action tag carried by every identity list update.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerInfoAction {
    AddPlayer,
    UpdateGameMode,
    UpdateLatency,
    UpdateDisplayName,
    RemovePlayer,
}

impl PlayerInfoAction {
    pub const ALL: [PlayerInfoAction; 5] = [
        PlayerInfoAction::AddPlayer,
        PlayerInfoAction::UpdateGameMode,
        PlayerInfoAction::UpdateLatency,
        PlayerInfoAction::UpdateDisplayName,
        PlayerInfoAction::RemovePlayer,
    ];

    /// Name of the matching constant on the host's action enum.
    pub fn constant_name(self) -> &'static str {
        match self {
            PlayerInfoAction::AddPlayer => "ADD_PLAYER",
            PlayerInfoAction::UpdateGameMode => "UPDATE_GAMEMODE",
            PlayerInfoAction::UpdateLatency => "UPDATE_LATENCY",
            PlayerInfoAction::UpdateDisplayName => "UPDATE_DISPLAY_NAME",
            PlayerInfoAction::RemovePlayer => "REMOVE_PLAYER",
        }
    }

    pub fn from_constant_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.constant_name() == name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameMode {
    #[default]
    NotSet,
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub const ALL: [GameMode; 5] = [
        GameMode::NotSet,
        GameMode::Survival,
        GameMode::Creative,
        GameMode::Adventure,
        GameMode::Spectator,
    ];

    pub fn constant_name(self) -> &'static str {
        match self {
            GameMode::NotSet => "NOT_SET",
            GameMode::Survival => "SURVIVAL",
            GameMode::Creative => "CREATIVE",
            GameMode::Adventure => "ADVENTURE",
            GameMode::Spectator => "SPECTATOR",
        }
    }

    pub fn from_constant_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.constant_name() == name)
    }
}

/// Signed profile property, e.g. skin textures.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// One record of an identity list update as it travels to the viewer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerInfoEntry {
    pub id: Uuid,
    pub name: String,
    pub ping: i32,
    pub game_mode: GameMode,
    pub display_name: Option<String>,
    pub properties: Vec<ProfileProperty>,
}

impl PlayerInfoEntry {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ping: 0,
            game_mode: GameMode::NotSet,
            display_name: None,
            properties: Vec::new(),
        }
    }
}

// Packets the host sends to a viewer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    PlayerInfo {
        action: PlayerInfoAction,
        entries: Vec<PlayerInfoEntry>,
    },
    HeaderFooter {
        header: String,
        footer: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::{deserialize, serialize};

    #[test]
    fn test_action_constant_names() {
        for action in PlayerInfoAction::ALL {
            assert_eq!(
                PlayerInfoAction::from_constant_name(action.constant_name()),
                Some(action)
            );
        }
        assert_eq!(PlayerInfoAction::from_constant_name("SET_LISTED"), None);
    }

    #[test]
    fn test_game_mode_default() {
        assert_eq!(GameMode::default(), GameMode::NotSet);
        assert_eq!(GameMode::NotSet.constant_name(), "NOT_SET");
        assert_eq!(GameMode::from_constant_name("CREATIVE"), Some(GameMode::Creative));
    }

    #[test]
    fn test_player_info_packet_serialization() {
        let mut entry = PlayerInfoEntry::new(Uuid::new_v4(), "Steve");
        entry.ping = 42;
        entry.display_name = Some("hello".to_string());
        entry.properties.push(ProfileProperty {
            name: "textures".to_string(),
            value: "abc".to_string(),
            signature: Some("sig".to_string()),
        });
        let packet = Packet::PlayerInfo {
            action: PlayerInfoAction::AddPlayer,
            entries: vec![entry],
        };

        let bytes = serialize(&packet).unwrap();
        let decoded: Packet = deserialize(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }
}
