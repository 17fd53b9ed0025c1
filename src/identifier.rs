//! Identifier normalization shared by every read path
//!
//! Viewport reads, capture feed drains and full-subtree scans all funnel raw
//! `href` values through [`normalize`], so their outputs can be unioned safely.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Longest identifier the list surface can render.
pub const MAX_IDENTIFIER_LEN: usize = 30;

/// Route segments that share the `/<segment>/` shape with member links.
pub const RESERVED_SEGMENTS: &[&str] = &[
    "explore",
    "direct",
    "accounts",
    "p",
    "reel",
    "stories",
    "reels",
    "tv",
    "live",
    "tags",
    "locations",
    "followers",
    "following",
];

/// Canonical lowercase member identifier
///
/// Only constructible through [`normalize`], so every value satisfies the
/// charset, length and reserved-segment rules. Deserializing goes through
/// the same check, so only strings [`normalize`] returns unchanged are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match normalize(&raw) {
            Some(id) if id.0 == raw => Ok(id),
            _ => Err(format!("'{raw}' is not a canonical identifier")),
        }
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw path-like string into an [`Identifier`]
///
/// Rules, in order:
/// 1. Trim whitespace, drop everything from the first `?`, drop one leading `/`
/// 2. Keep the first path segment
/// 3. Require 1-30 characters from `[A-Za-z0-9._]`
/// 4. Reject reserved route segments (case-insensitive)
/// 5. Lowercase
///
/// # Example
/// ```rust
/// use roster_extract::normalize;
///
/// assert_eq!(normalize("/bob.smith_99/?hl=en").unwrap().as_str(), "bob.smith_99");
/// assert!(normalize("/explore/").is_none());
/// ```
pub fn normalize(raw: &str) -> Option<Identifier> {
    let trimmed = raw.trim();
    let path = trimmed.split('?').next().unwrap_or_default();
    let path = path.strip_prefix('/').unwrap_or(path);
    let segment = path.split('/').next().unwrap_or_default();

    if segment.is_empty() || segment.len() > MAX_IDENTIFIER_LEN {
        return None;
    }
    if !segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_')
    {
        return None;
    }

    let lowered = segment.to_ascii_lowercase();
    if RESERVED_SEGMENTS.contains(&lowered.as_str()) {
        return None;
    }

    Some(Identifier(lowered))
}
