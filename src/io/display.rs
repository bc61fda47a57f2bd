use crate::grammar::engine::DerivationStep;
use crate::grammar::ordinal::ordinal_label;
use crate::grammar::rule::ProductionRule;
use crate::grammar::symbol::{BLANK, EPSILON, EPSILON_DISPLAY};

const RULE_BLANK: char = '_';
const WORD_BLANK: char = '\u{00A0}';

/// Formats the right-hand side of a rule: `ъ` becomes `ε`, spaces become `_`.
pub fn format_rule_right(right: &str) -> String {
    right
        .chars()
        .map(|ch| match ch {
            EPSILON => EPSILON_DISPLAY,
            BLANK => RULE_BLANK,
            other => other,
        })
        .collect()
}

/// Formats a sentential form or derived word: `ъ` becomes `ε`, spaces become
/// non-breaking spaces. The empty word is shown as `ε`.
pub fn format_sentential(result: &str) -> String {
    if result.is_empty() {
        return EPSILON_DISPLAY.to_string();
    }
    result
        .chars()
        .map(|ch| match ch {
            EPSILON => EPSILON_DISPLAY,
            BLANK => WORD_BLANK,
            other => other,
        })
        .collect()
}

/// `S → аA`
pub fn format_rule(rule: &ProductionRule) -> String {
    format!("{} → {}", rule.left, format_rule_right(&rule.right))
}

/// `[1] S → аA`, or `[#36] ...` for ordinals without a shortcut label.
pub fn format_numbered_rule(ordinal: usize, rule: &ProductionRule) -> String {
    let label = match ordinal_label(ordinal) {
        Some(ch) => ch.to_string(),
        None => format!("#{}", ordinal),
    };
    format!("[{}] {}", label, format_rule(rule))
}

/// `S ⇒(1) аA ⇒(3) а`
pub fn format_chain(steps: &[DerivationStep]) -> String {
    let mut out = String::new();
    for step in steps {
        if let Some(ordinal) = step.rule_index {
            let label = ordinal_label(ordinal).map_or_else(|| ordinal.to_string(), |ch| ch.to_string());
            out.push_str(&format!(" ⇒({}) ", label));
        }
        out.push_str(&format_sentential(&step.result));
    }
    out
}
