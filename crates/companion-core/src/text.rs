//! Text normalization primitives.
//!
//! Prompt cleanup, case-insensitive replacement and filename sanitation.
//! Everything here is a pure function over strings.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

/// Characters that are unsafe in filenames on at least one platform.
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\?%*:|"<>\x7F\x00-\x1F]"#).unwrap());

/// Pairs applied repeatedly, in order, until none of them match.
const COLLAPSE_RULES: &[(&str, &str)] = &[
    ("  ", " "),
    (",,", ","),
    (" ,", ","),
    (".,", ","),
    (". ,", ","),
    (",.", ","),
    (", .", ","),
    (", ,", ","),
    ("8 k", "8k"),
    ("4 k", "4k"),
];

/// Fix common formatting issues in a user prompt.
///
/// # Rules Applied
/// 1. Remove line breaks (lines are joined without a separator)
/// 2. Remove explicit `embedding:` declarations
/// 3. Collapse doubled separators and stray spaces around commas/periods
/// 4. Force a space after every comma
/// 5. Force a space after every period not followed by whitespace, a digit or the end
/// 6. Trim leading/trailing spaces and commas
///
/// # Examples
///
/// ```
/// use companion_core::text::sanitize_prompt;
///
/// assert_eq!(sanitize_prompt("masterpiece,,best quality ,8 k"), "masterpiece, best quality, 8k");
/// ```
pub fn sanitize_prompt(text: &str) -> String {
    let mut p = text.replace(['\n', '\r'], "");
    p = p.replace("embedding:", "");

    for (from, to) in COLLAPSE_RULES {
        while p.contains(from) {
            p = p.replace(from, to);
        }
    }

    p = space_after(&p, ',', char::is_whitespace).trim().to_string();
    p = space_after(&p, '.', |c| c.is_whitespace() || c.is_ascii_digit())
        .trim()
        .to_string();

    while p.contains(", ,") {
        p = p.replace(", ,", ",");
    }

    p.trim_matches(|c| c == ' ' || c == ',').to_string()
}

/// Insert a space after every `mark` that is followed by a character
/// for which `keep` is false. A trailing `mark` is left alone.
fn space_after(text: &str, mark: char, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == mark {
            if let Some(&next) = chars.peek() {
                if !keep(next) {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Replace characters that are illegal in filenames with `-`.
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(filename, "-").to_string()
}

/// Case-insensitive replacement of every occurrence of `old` in `text`.
///
/// Replacements are not re-scanned, so `new` may safely contain `old`.
pub fn ireplace(old: &str, new: &str, text: &str) -> String {
    if old.is_empty() {
        return text.to_string();
    }
    match Regex::new(&format!("(?i){}", regex::escape(old))) {
        Ok(re) => re.replace_all(text, NoExpand(new)).to_string(),
        Err(_) => text.to_string(),
    }
}

/// Case-insensitive whole-word removal.
///
/// An occurrence of `word` is removed only when it is preceded by the start
/// of the text, a space or a comma, and followed by the end of the text, a
/// space, a comma or a period. The result is not re-sanitized.
pub fn word_replace(word: &str, text: &str) -> String {
    let word = word.trim();
    if word.is_empty() {
        return text.to_string();
    }
    if word.to_lowercase() == text.trim().to_lowercase() {
        return String::new();
    }

    let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(word))) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        let preceded = text[..m.start()]
            .chars()
            .next_back()
            .map_or(true, |c| c == ' ' || c == ',');
        let followed = text[m.end()..]
            .chars()
            .next()
            .map_or(true, |c| matches!(c, ' ' | ',' | '.'));
        if preceded && followed {
            out.push_str(&text[last..m.start()]);
            last = m.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Extract the model filename from an identifier like `dir/name.safetensors [hash]`.
///
/// Drops the bracketed hash, any directory path and a `.safetensors` suffix.
pub fn extract_model_filename(model_id: &str) -> String {
    let name = model_id.split('[').next().unwrap_or_default().trim();
    let name = last_path_segment(name);
    name.strip_suffix(".safetensors").unwrap_or(name).to_string()
}

/// Extract the bracketed hash from an identifier like `name [hash]`.
pub fn extract_model_hash(model_id: &str) -> String {
    model_id
        .split_once('[')
        .and_then(|(_, rest)| rest.split_once(']'))
        .map(|(hash, _)| hash.trim().to_string())
        .unwrap_or_default()
}

/// Final segment of a path using either separator.
pub fn last_path_segment(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Filename with its last extension removed.
pub fn file_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map_or(filename, |(stem, _)| stem)
}
