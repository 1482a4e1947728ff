//! Shared value types for the folio workspace.
//!
//! These types are deliberately small and validated at construction so that the builder,
//! the client and the REST layer all agree on what a folder key or media kind is.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// Nothing left after trimming.
    #[error("text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing a folder key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("folder key cannot be empty")]
    Empty,
    #[error("folder key must contain only ASCII digits: {0:?}")]
    NotNumeric(String),
    #[error("folder key is too long: {0:?}")]
    TooLong(String),
}

/// Trimmed text with at least one character. Used for owner names and similar labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input`, rejecting it if nothing remains.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Longest key we accept; keeps `numeric()` inside `u64`.
const MAX_KEY_DIGITS: usize = 18;

/// Identity of a numbered content folder (`"01"`, `"04"`, `"26"`).
///
/// The textual form is kept verbatim because it is also the directory name and the URL
/// segment. Ordering is by numeric value first, so `"9"` sorts before `"10"`; ties between
/// differently padded keys fall back to the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey(String);

impl FolderKey {
    /// Parses a folder key. Surrounding whitespace is ignored.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, KeyError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::NotNumeric(trimmed.to_owned()));
        }
        if trimmed.len() > MAX_KEY_DIGITS {
            return Err(KeyError::TooLong(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Builds a zero-padded key from a number.
    pub fn from_number(n: u64, width: usize) -> Self {
        Self(format!("{n:0width$}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value used for ordering.
    pub fn numeric(&self) -> u64 {
        // Construction guarantees at most MAX_KEY_DIGITS ASCII digits.
        self.0.parse().unwrap_or(u64::MAX)
    }

    /// Number of characters in the key, i.e. its padding width.
    pub fn width(&self) -> usize {
        self.0.len()
    }
}

impl Ord for FolderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric()
            .cmp(&other.numeric())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for FolderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FolderKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FolderKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for FolderKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FolderKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FolderKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Namespace for the persisted client cache (the account the media is synced from).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct OwnerId(NonEmptyText);

impl OwnerId {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        NonEmptyText::new(input).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// Media classification by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    /// Anything else (sidecars, stray documents). Never a preview or full candidate.
    Other,
}

impl MediaKind {
    /// Classifies an extension without the leading dot, case-insensitively.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }

    /// Classifies a file name or URL path by its final extension.
    pub fn from_file_name(name: &str) -> Self {
        let base = name.rsplit('/').next().unwrap_or(name);
        let base = base.split(['?', '#']).next().unwrap_or(base);
        match base.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_extension(ext),
            _ => MediaKind::Other,
        }
    }

    pub fn is_media(self) -> bool {
        !matches!(self, MediaKind::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
