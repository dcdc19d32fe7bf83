//! Grid layout for overlay content.
//!
//! A layout is a sparse set of slot contents plus header and footer text.
//! Callers may address slots directly or through `(x, y)` grid coordinates,
//! where `x` is the column and `y` the row.

use crate::OVERLAY_SLOTS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Rows per column of the overlay grid.
pub const ROW_WIDTH: usize = 20;
/// Number of columns of the overlay grid.
pub const COLUMNS: usize = OVERLAY_SLOTS / ROW_WIDTH;

/// Errors produced while building a layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("slot {0} is outside the overlay (0..80)")]
    SlotOutOfRange(usize),
    #[error("coordinate ({x}, {y}) is outside the 4x20 grid")]
    CoordinateOutOfRange { x: usize, y: usize },
    #[error("ping must not be negative, got {0}")]
    NegativePing(i32),
}

/// Maps grid coordinates to a slot index: `y + x * ROW_WIDTH`.
pub fn convert_coordinate(x: usize, y: usize) -> usize {
    y + x * ROW_WIDTH
}

/// Signed value attached to an entry's profile (skin textures).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub signature: String,
}

/// Content of one slot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub text: String,
    #[serde(default)]
    pub ping: i32,
    #[serde(default)]
    pub credential: Option<Credential>,
}

impl LayoutEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ping: 0,
            credential: None,
        }
    }

    pub fn with_ping(mut self, ping: i32) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_credential(mut self, value: impl Into<String>, signature: impl Into<String>) -> Self {
        self.credential = Some(Credential {
            value: value.into(),
            signature: signature.into(),
        });
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Layout {
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    entries: BTreeMap<usize, LayoutEntry>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Sets the content of a slot, replacing whatever was there.
    pub fn set_slot(&mut self, slot: usize, entry: LayoutEntry) -> Result<(), LayoutError> {
        if slot >= OVERLAY_SLOTS {
            return Err(LayoutError::SlotOutOfRange(slot));
        }
        if entry.ping < 0 {
            return Err(LayoutError::NegativePing(entry.ping));
        }
        self.entries.insert(slot, entry);
        Ok(())
    }

    /// Sets the content of the slot at column `x`, row `y`.
    pub fn set_at(&mut self, x: usize, y: usize, entry: LayoutEntry) -> Result<(), LayoutError> {
        if x >= COLUMNS || y >= ROW_WIDTH {
            return Err(LayoutError::CoordinateOutOfRange { x, y });
        }
        self.set_slot(convert_coordinate(x, y), entry)
    }

    pub fn entry(&self, slot: usize) -> Option<&LayoutEntry> {
        self.entries.get(&slot)
    }

    /// Entries in ascending slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &LayoutEntry)> {
        self.entries.iter().map(|(slot, entry)| (*slot, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-checks every entry; needed after deserializing an untrusted layout.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (slot, entry) in &self.entries {
            if *slot >= OVERLAY_SLOTS {
                return Err(LayoutError::SlotOutOfRange(*slot));
            }
            if entry.ping < 0 {
                return Err(LayoutError::NegativePing(entry.ping));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_coordinate() {
        assert_eq!(convert_coordinate(3, 5), 65);
        assert_eq!(convert_coordinate(0, 0), 0);
        assert_eq!(convert_coordinate(0, 19), 19);
        assert_eq!(convert_coordinate(1, 0), 20);
        assert_eq!(convert_coordinate(3, 19), OVERLAY_SLOTS - 1);
    }

    #[test]
    fn test_set_at_uses_grid_mapping() {
        let mut layout = Layout::new();
        layout.set_at(3, 5, LayoutEntry::new("Kills: 4")).unwrap();

        assert_eq!(layout.entry(65).map(|e| e.text.as_str()), Some("Kills: 4"));
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn test_set_slot_replaces_existing() {
        let mut layout = Layout::new();
        layout.set_slot(2, LayoutEntry::new("a")).unwrap();
        layout.set_slot(2, LayoutEntry::new("b").with_ping(30)).unwrap();

        assert_eq!(layout.len(), 1);
        assert_eq!(layout.entry(2), Some(&LayoutEntry::new("b").with_ping(30)));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut layout = Layout::new();
        assert_eq!(
            layout.set_slot(80, LayoutEntry::new("x")),
            Err(LayoutError::SlotOutOfRange(80))
        );
        assert_eq!(
            layout.set_at(4, 0, LayoutEntry::new("x")),
            Err(LayoutError::CoordinateOutOfRange { x: 4, y: 0 })
        );
        assert_eq!(
            layout.set_at(0, 20, LayoutEntry::new("x")),
            Err(LayoutError::CoordinateOutOfRange { x: 0, y: 20 })
        );
        assert_eq!(
            layout.set_slot(1, LayoutEntry::new("x").with_ping(-1)),
            Err(LayoutError::NegativePing(-1))
        );
        assert!(layout.is_empty());
    }

    #[test]
    fn test_entries_in_slot_order() {
        let mut layout = Layout::new().with_header("top").with_footer("bottom");
        layout.set_slot(40, LayoutEntry::new("c")).unwrap();
        layout.set_slot(1, LayoutEntry::new("a")).unwrap();
        layout
            .set_slot(20, LayoutEntry::new("b").with_credential("tex", "sig"))
            .unwrap();

        let slots: Vec<usize> = layout.entries().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![1, 20, 40]);
        assert_eq!(layout.header.as_deref(), Some("top"));
        assert_eq!(
            layout.entry(20).and_then(|e| e.credential.clone()),
            Some(Credential {
                value: "tex".to_string(),
                signature: "sig".to_string()
            })
        );
    }
}
