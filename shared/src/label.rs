//! Slot labels for synthetic entries.
//!
//! Viewers sort the identity list by name, and a synthetic entry has no
//! visible name of its own, so each slot gets a name made purely of formatting
//! markers. The markers render as nothing but still sort, which keeps the
//! overlay columns in slot order.

/// Marker character that introduces a formatting code.
pub const COLOR_CHAR: char = '\u{00A7}';

const BOLD: char = 'l';
const BLACK: char = '0';
const GREEN: char = 'a';
const UNDERLINE: char = 'n';
const YELLOW: char = 'e';

fn marker(code: char) -> String {
    let mut s = String::with_capacity(3);
    s.push(COLOR_CHAR);
    s.push(code);
    s
}

/// Style prefix of labels for slots below 10.
pub fn single_digit_prefix() -> String {
    [BOLD, BLACK].into_iter().map(marker).collect()
}

/// Style prefix of labels for slots 10 and above.
pub fn double_digit_prefix() -> String {
    [BOLD, GREEN, UNDERLINE, YELLOW].into_iter().map(marker).collect()
}

/// Encodes a slot index into its label.
///
/// Slots below 10 become bold black followed by one digit marker; larger slots
/// become bold green underline yellow followed by a tens and a ones digit
/// marker. The mapping is injective over `0..OVERLAY_SLOTS` and lexicographic
/// order of the labels follows slot order.
pub fn encode_label(slot: usize) -> String {
    if slot >= 10 {
        format!(
            "{}{}{}{}{}",
            double_digit_prefix(),
            COLOR_CHAR,
            (slot / 10) % 10,
            COLOR_CHAR,
            slot % 10
        )
    } else {
        format!("{}{}{}", single_digit_prefix(), COLOR_CHAR, slot)
    }
}

/// Inverse of [`encode_label`]. Returns `None` for anything it did not produce.
pub fn decode_label(label: &str) -> Option<usize> {
    let (digits, expected) = if let Some(rest) = label.strip_prefix(&double_digit_prefix()) {
        (rest, 2)
    } else if let Some(rest) = label.strip_prefix(&single_digit_prefix()) {
        (rest, 1)
    } else {
        return None;
    };

    let mut chars = digits.chars();
    let mut value = 0usize;
    for _ in 0..expected {
        if chars.next()? != COLOR_CHAR {
            return None;
        }
        value = value * 10 + chars.next()?.to_digit(10)? as usize;
    }
    if chars.next().is_some() {
        return None;
    }
    // "§l§a§n§e§0§5" is not a label we emit
    if expected == 2 && value < 10 {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OVERLAY_SLOTS;
    use std::collections::HashSet;

    fn digits_after_prefix(slot: usize) -> Vec<u32> {
        let label = encode_label(slot);
        let prefix = if slot < 10 {
            single_digit_prefix()
        } else {
            double_digit_prefix()
        };
        label
            .strip_prefix(&prefix)
            .unwrap()
            .chars()
            .filter_map(|c| c.to_digit(10))
            .collect()
    }

    #[test]
    fn test_labels_are_injective() {
        let labels: HashSet<String> = (0..OVERLAY_SLOTS).map(encode_label).collect();
        assert_eq!(labels.len(), OVERLAY_SLOTS);
    }

    #[test]
    fn test_single_digit_labels() {
        for slot in 0..10 {
            assert_eq!(digits_after_prefix(slot), vec![slot as u32]);
        }
        assert_eq!(encode_label(7), "\u{00A7}l\u{00A7}0\u{00A7}7");
    }

    #[test]
    fn test_double_digit_labels() {
        for slot in 10..OVERLAY_SLOTS {
            assert_eq!(
                digits_after_prefix(slot),
                vec![(slot / 10) as u32, (slot % 10) as u32]
            );
        }
        assert_eq!(
            encode_label(42),
            "\u{00A7}l\u{00A7}a\u{00A7}n\u{00A7}e\u{00A7}4\u{00A7}2"
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        for slot in 0..OVERLAY_SLOTS {
            assert_eq!(decode_label(&encode_label(slot)), Some(slot));
        }
        assert_eq!(decode_label("Steve"), None);
        assert_eq!(decode_label(&format!("{}{}5", double_digit_prefix(), COLOR_CHAR)), None);
        assert_eq!(decode_label(&format!("{}x", encode_label(3))), None);
    }

    #[test]
    fn test_label_order_follows_slot_order() {
        let mut labels: Vec<String> = (0..OVERLAY_SLOTS).map(encode_label).collect();
        labels.reverse();
        labels.sort();
        let slots: Vec<usize> = labels.iter().filter_map(|l| decode_label(l)).collect();
        assert_eq!(slots, (0..OVERLAY_SLOTS).collect::<Vec<_>>());
    }
}
