//! Small text helpers shared by the bot and the configuration layer.

/// Truncates a string so that its UTF-16 length stays within `max_units`.
///
/// Telegram measures message and caption limits in UTF-16 code units, so
/// characters outside the BMP (most emoji) count twice. Never splits a character.
///
/// # Examples
///
/// ```
/// use filmlink_bot::utils::truncate_utf16;
/// assert_eq!(truncate_utf16("🎬abc", 3), "🎬a");
/// assert_eq!(truncate_utf16("🎬abc", 1), "");
/// ```
#[must_use]
pub fn truncate_utf16(s: &str, max_units: usize) -> String {
    let mut units = 0;
    for (pos, c) in s.char_indices() {
        units += c.len_utf16();
        if units > max_units {
            return s[..pos].to_string();
        }
    }
    s.to_string()
}

/// Parses a list of numeric IDs separated by commas, semicolons or whitespace.
///
/// Entries that are not valid integers are skipped. Order is preserved and
/// duplicates are dropped.
///
/// # Examples
///
/// ```
/// use filmlink_bot::utils::parse_id_list;
/// assert_eq!(parse_id_list("-100, 200;abc 200"), vec![-100, 200]);
/// ```
#[must_use]
pub fn parse_id_list(s: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for id in s
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<i64>().ok())
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
