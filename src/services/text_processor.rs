// Text Processing Service
// Normalization applied to submitted text before heuristics run

use regex::Regex;
use std::sync::OnceLock;

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}\u{2009}\u{200B}]").expect("static regex"))
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B]+").expect("static regex"))
}

/// Normalize typographic punctuation and whitespace so ASCII patterns match
/// text pasted from social media or word processors.
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text.to_string();

    // Replace smart quotes
    s = s.replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}', '\u{02bc}'], "'");

    // Replace em and en dashes
    s = s.replace(['\u{2014}', '\u{2013}'], "-");

    s = space_re().replace_all(&s, " ").to_string();

    // Normalize line endings
    s = s.replace("\r\n", "\n").replace('\r', "\n");

    s = ws_re().replace_all(&s, " ").to_string();

    s = s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n");

    s.trim().to_string()
}

/// Length in Unicode scalars, not UTF-8 bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Single-line preview for logs.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}
