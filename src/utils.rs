//! Small string helpers shared by the scraping and logging code.

use itertools::Itertools;

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (moved back to the previous character
/// boundary) and suffixed with `"…(+N bytes)"`.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Trim every piece, drop the empty ones and join the rest with one space.
///
/// The extranet spreads a value such as `60.3 Gb` over several text nodes
/// padded with newlines and indentation.
///
/// # Arguments
///
/// * `pieces` - Text fragments in document order
///
/// # Returns
///
/// The fragments with inner whitespace collapsed, joined by single spaces.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(join_trimmed(["\n", " 60.3 ", "\n  Gb\n"]), "60.3 Gb");
/// ```
pub fn join_trimmed<I, S>(pieces: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pieces
        .into_iter()
        .map(|p| p.as_ref().split_whitespace().join(" "))
        .filter(|p| !p.is_empty())
        .join(" ")
}
