//! Single-character labels for rule ordinals, shared by the rule list and the
//! keyboard shortcuts.
//!
//! Ordinals 1-9 are shown as digits and 10-35 as `A`..`Z`. Grammars may hold up
//! to 99 rules, so ordinals 36-99 have no label and cannot be picked by key.

/// Largest ordinal that has a one-character label.
pub const MAX_LABELLED_ORDINAL: usize = 35;

const RADIX: u32 = 36;

/// The display label of a 1-based rule ordinal.
pub fn ordinal_label(ordinal: usize) -> Option<char> {
    if !(1..=MAX_LABELLED_ORDINAL).contains(&ordinal) {
        return None;
    }
    char::from_digit(ordinal as u32, RADIX).map(|ch| ch.to_ascii_uppercase())
}

/// The rule ordinal selected by a key press. Letters are case-insensitive;
/// `0` and everything else selects nothing.
pub fn ordinal_from_key(key: char) -> Option<usize> {
    match key.to_digit(RADIX) {
        Some(0) | None => None,
        Some(n) => Some(n as usize),
    }
}

/// Like `ordinal_from_key`, but also drops ordinals past the grammar's rules.
pub fn ordinal_for_rules(key: char, rule_count: usize) -> Option<usize> {
    ordinal_from_key(key).filter(|&ordinal| ordinal <= rule_count)
}
