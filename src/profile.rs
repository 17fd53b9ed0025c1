//! Profile metadata: which list to extract and how many members it claims

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two member lists a profile exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Followers,
    Following,
}

impl ListKind {
    /// Path segment used by the profile link that opens this list's modal
    pub fn path_segment(self) -> &'static str {
        match self {
            ListKind::Followers => "followers",
            ListKind::Following => "following",
        }
    }

    /// CSS selector for the profile header link that opens the modal
    pub fn link_selector(self) -> String {
        format!("a[href*='/{}/']", self.path_segment())
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Member counts displayed on the profile header
///
/// Read once per session. Either value may be stale or zero when the header
/// could not be parsed; zero means "unknown" to the termination logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounts {
    pub followers: u64,
    pub following: u64,
}

impl ProfileCounts {
    pub fn expected_for(&self, kind: ListKind) -> u64 {
        match kind {
            ListKind::Followers => self.followers,
            ListKind::Following => self.following,
        }
    }
}

/// Parse a displayed member count such as `"1,234 followers"` or `"12.5K"`
///
/// Thousands separators are ignored. A `K`, `M` or `B` directly after the number
/// scales it, unless it starts a word (`"88 members"` is 88); without a suffix
/// any fractional part is dropped. Returns `None` when the text holds no digits.
pub fn parse_count(text: &str) -> Option<u64> {
    let compact: String = text.chars().filter(|c| *c != ',').collect();

    let start = compact.find(|c: char| c.is_ascii_digit())?;
    let rest = &compact[start..];
    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let number = rest[..number_len].trim_end_matches('.');

    let mut tail = rest[number_len..].chars();
    let suffix = tail.next();
    let starts_word = tail.next().is_some_and(char::is_alphabetic);
    let multiplier = match suffix {
        _ if starts_word => 1.0,
        Some('k' | 'K') => 1_000.0,
        Some('m' | 'M') => 1_000_000.0,
        Some('b' | 'B') => 1_000_000_000.0,
        _ => 1.0,
    };

    if multiplier > 1.0 {
        let value: f64 = number.parse().ok()?;
        Some((value * multiplier).round() as u64)
    } else {
        number.split('.').next()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_counts() {
        assert_eq!(parse_count("575 followers"), Some(575));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("following 88"), Some(88));
    }

    #[test]
    fn suffixed_counts() {
        assert_eq!(parse_count("12.5K followers"), Some(12_500));
        assert_eq!(parse_count("2M"), Some(2_000_000));
        assert_eq!(parse_count("1.1b"), Some(1_100_000_000));
    }

    #[test]
    fn words_are_not_suffixes() {
        assert_eq!(parse_count("88 members"), Some(88));
        assert_eq!(parse_count("3mutual"), Some(3));
    }

    #[test]
    fn missing_digits() {
        assert_eq!(parse_count("followers"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn counts_select_by_kind() {
        let counts = ProfileCounts {
            followers: 10,
            following: 20,
        };
        assert_eq!(counts.expected_for(ListKind::Followers), 10);
        assert_eq!(counts.expected_for(ListKind::Following), 20);
        assert_eq!(ListKind::Following.link_selector(), "a[href*='/following/']");
    }
}
