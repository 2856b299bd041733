use crate::question::LETTERS;
use std::collections::BTreeSet;

/// Parse typed answer letters.
///
/// Single-select accepts one letter (`A`, `b`). Multi-select also accepts
/// `A,C`, `a c`, `A;C` and run-together `AC`. Returns `None` for blank or
/// invalid input.
pub fn parse_answer(raw: &str, multi_select: bool, num_options: usize) -> Option<BTreeSet<usize>> {
    let s = raw.trim().to_uppercase();
    if s.is_empty() {
        return None;
    }

    let s: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if matches!(c, ';' | '/' | '|') { ',' } else { c })
        .collect();

    let parts: Vec<String> = if multi_select {
        if !s.contains(',') && s.chars().count() > 1 {
            s.chars().map(String::from).collect()
        } else {
            s.split(',')
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        }
    } else {
        s.chars().next().map(String::from).into_iter().collect()
    };

    let valid = &LETTERS[..num_options.min(LETTERS.len())];
    let mut chosen = BTreeSet::new();
    for part in parts {
        let mut chars = part.chars();
        let (Some(letter), None) = (chars.next(), chars.next()) else {
            return None;
        };
        chosen.insert(valid.find(letter)?);
    }

    if chosen.is_empty() || (!multi_select && chosen.len() != 1) {
        return None;
    }
    Some(chosen)
}

pub fn fmt_mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
