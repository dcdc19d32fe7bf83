//! Viewer-side replay of identity list packets.
//!
//! `TabView` is what a single viewer's client would render after applying
//! every packet it received, in order. Tests and the demo binary use it to
//! check what a viewer actually sees.

use crate::{decode_label, Packet, PlayerInfoAction, PlayerInfoEntry};
use bincode::deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TabView {
    entries: HashMap<Uuid, PlayerInfoEntry>,
    pub header: String,
    pub footer: String,
    pub packets_applied: usize,
}

impl TabView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one bincode frame and applies it.
    pub fn apply_frame(&mut self, frame: &[u8]) -> Result<(), bincode::Error> {
        let packet: Packet = deserialize(frame)?;
        self.apply(&packet);
        Ok(())
    }

    pub fn apply(&mut self, packet: &Packet) {
        self.packets_applied += 1;
        match packet {
            Packet::PlayerInfo { action, entries } => {
                for entry in entries {
                    self.apply_entry(*action, entry);
                }
            }
            Packet::HeaderFooter { header, footer } => {
                self.header = header.clone();
                self.footer = footer.clone();
            }
        }
    }

    fn apply_entry(&mut self, action: PlayerInfoAction, entry: &PlayerInfoEntry) {
        match action {
            PlayerInfoAction::AddPlayer => {
                self.entries.insert(entry.id, entry.clone());
            }
            PlayerInfoAction::RemovePlayer => {
                self.entries.remove(&entry.id);
            }
            // Updates for unknown ids are ignored, like a real client does
            PlayerInfoAction::UpdateGameMode => {
                if let Some(existing) = self.entries.get_mut(&entry.id) {
                    existing.game_mode = entry.game_mode;
                }
            }
            PlayerInfoAction::UpdateLatency => {
                if let Some(existing) = self.entries.get_mut(&entry.id) {
                    existing.ping = entry.ping;
                }
            }
            PlayerInfoAction::UpdateDisplayName => {
                if let Some(existing) = self.entries.get_mut(&entry.id) {
                    existing.display_name = entry.display_name.clone();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&PlayerInfoEntry> {
        self.entries.get(id)
    }

    /// Entries in the order a client lists them (by profile name).
    pub fn sorted(&self) -> Vec<&PlayerInfoEntry> {
        let mut entries: Vec<&PlayerInfoEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Visible entries whose name is a slot label.
    pub fn synthetic_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| decode_label(&e.name).is_some())
            .count()
    }

    /// Visible entries that are not slot labels.
    pub fn real_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|e| decode_label(&e.name).is_none())
            .map(|e| e.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Entry currently shown for a slot, if any.
    pub fn slot(&self, slot: usize) -> Option<&PlayerInfoEntry> {
        self.entries
            .values()
            .find(|e| decode_label(&e.name) == Some(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_label, GameMode};
    use bincode::serialize;

    fn add(entries: Vec<PlayerInfoEntry>) -> Packet {
        Packet::PlayerInfo {
            action: PlayerInfoAction::AddPlayer,
            entries,
        }
    }

    #[test]
    fn test_add_and_remove() {
        let mut view = TabView::new();
        let steve = PlayerInfoEntry::new(Uuid::new_v4(), "Steve");
        let alex = PlayerInfoEntry::new(Uuid::new_v4(), "Alex");

        view.apply(&add(vec![steve.clone(), alex.clone()]));
        assert_eq!(view.len(), 2);
        assert_eq!(view.real_names(), vec!["Alex", "Steve"]);

        view.apply(&Packet::PlayerInfo {
            action: PlayerInfoAction::RemovePlayer,
            entries: vec![steve.clone()],
        });
        assert!(!view.contains(&steve.id));
        assert!(view.contains(&alex.id));
        assert_eq!(view.packets_applied, 2);
    }

    #[test]
    fn test_updates_only_touch_known_entries() {
        let mut view = TabView::new();
        let entry = PlayerInfoEntry::new(Uuid::new_v4(), encode_label(3));
        view.apply(&add(vec![entry.clone()]));

        let mut update = entry.clone();
        update.ping = 150;
        update.display_name = Some("Kills: 3".to_string());
        update.game_mode = GameMode::Creative;
        for action in [
            PlayerInfoAction::UpdateLatency,
            PlayerInfoAction::UpdateDisplayName,
            PlayerInfoAction::UpdateGameMode,
        ] {
            view.apply(&Packet::PlayerInfo {
                action,
                entries: vec![update.clone()],
            });
        }

        let shown = view.slot(3).unwrap();
        assert_eq!(shown.ping, 150);
        assert_eq!(shown.display_name.as_deref(), Some("Kills: 3"));
        assert_eq!(shown.game_mode, GameMode::Creative);

        let stranger = PlayerInfoEntry::new(Uuid::new_v4(), "ghost");
        view.apply(&Packet::PlayerInfo {
            action: PlayerInfoAction::UpdateLatency,
            entries: vec![stranger.clone()],
        });
        assert!(!view.contains(&stranger.id));
        assert_eq!(view.synthetic_count(), 1);
    }

    #[test]
    fn test_apply_frame() {
        let mut view = TabView::new();
        let frame = serialize(&Packet::HeaderFooter {
            header: "Welcome".to_string(),
            footer: "play.example.net".to_string(),
        })
        .unwrap();

        view.apply_frame(&frame).unwrap();
        assert_eq!(view.header, "Welcome");
        assert_eq!(view.footer, "play.example.net");
        assert!(view.apply_frame(&[0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
