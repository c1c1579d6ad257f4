use std::collections::BTreeSet;

const SEPARATORS: &[char] = &['/', '|', '_', '／', '｜', '＿'];
const BRACKETS: &[(char, char)] = &[('[', ']'), ('［', '］'), ('【', '】')];

/// Derives the lowercase candidate strings used to match a listing title
/// against the catalog.
///
/// Bracketed annotations such as `[T]` are dropped, multi-title listings are
/// split on slash, pipe and underscore (ASCII and fullwidth), and every
/// fragment is trimmed, whitespace-collapsed and lowercased. Empty fragments
/// are discarded.
pub fn normalize(raw: &str) -> BTreeSet<String> {
    strip_brackets(raw)
        .split(SEPARATORS)
        .map(normalize_fragment)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Lowercases and collapses whitespace without splitting. Catalog titles go
/// through this so both sides of a comparison share one shape.
pub fn normalize_fragment(fragment: &str) -> String {
    fragment
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_brackets(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut closing: Vec<char> = Vec::new();

    for ch in raw.chars() {
        if let Some((_, close)) = BRACKETS.iter().find(|(open, _)| *open == ch) {
            closing.push(*close);
            continue;
        }
        if let Some(expected) = closing.last() {
            if *expected == ch {
                closing.pop();
                // keep words on either side of the annotation apart
                if closing.is_empty() {
                    out.push(' ');
                }
            }
            continue;
        }
        out.push(ch);
    }

    out
}
