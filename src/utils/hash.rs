use crate::grammar::rule::ProductionRule;
use twox_hash::XxHash64;
use std::hash::Hasher;

/// Hash an ordered rule set using xxHash. Rule order matters: ordinals are
/// part of every stored derivation step.
///
/// Each rule is fed as its left symbol in UTF-8, the byte length of the
/// right side as little-endian `u32`, then the right side itself. The bytes
/// never depend on the platform, so a stored id stays valid everywhere.
pub fn hash_rules(rules: &[ProductionRule]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    let mut left = [0u8; 4];
    for rule in rules {
        hasher.write(rule.left.encode_utf8(&mut left).as_bytes());
        hasher.write(&(rule.right.len() as u32).to_le_bytes());
        hasher.write(rule.right.as_bytes());
    }
    hasher.finish()
}

/// Structural fingerprint of a grammar's rules, as stored next to persisted
/// history (`grammarId`).
pub fn grammar_fingerprint(rules: &[ProductionRule]) -> String {
    format!("{:016x}", hash_rules(rules))
}
