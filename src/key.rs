use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

lazy_static! {
    static ref HEX_COLOR_REGEX: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
}

const ID_SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 6;

/// A user-defined state a day can be marked with.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TrackerKey {
    pub id: String,
    pub name: String,
    pub color: KeyColor,
}

impl TrackerKey {
    pub fn create(id: impl Into<String>, name: impl Into<String>, color: KeyColor) -> Self {
        TrackerKey {
            id: id.into(),
            name: name.into(),
            color,
        }
    }
}

/// Palette a key color is picked from
///
/// Stored as the hex string so documents written by other clients stay readable.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "String", into = "String")]
pub enum KeyColor {
    #[default]
    Emerald,
    Blue,
    Violet,
    Pink,
    Amber,
    Red,
    Cyan,
    Lime,
    Orange,
    Indigo,
    Teal,
    Purple,
}

impl KeyColor {
    pub const ALL: [KeyColor; 12] = [
        KeyColor::Emerald,
        KeyColor::Blue,
        KeyColor::Violet,
        KeyColor::Pink,
        KeyColor::Amber,
        KeyColor::Red,
        KeyColor::Cyan,
        KeyColor::Lime,
        KeyColor::Orange,
        KeyColor::Indigo,
        KeyColor::Teal,
        KeyColor::Purple,
    ];

    pub fn hex(&self) -> &'static str {
        match self {
            KeyColor::Emerald => "#10b981",
            KeyColor::Blue => "#3b82f6",
            KeyColor::Violet => "#8b5cf6",
            KeyColor::Pink => "#ec4899",
            KeyColor::Amber => "#f59e0b",
            KeyColor::Red => "#ef4444",
            KeyColor::Cyan => "#06b6d4",
            KeyColor::Lime => "#84cc16",
            KeyColor::Orange => "#f97316",
            KeyColor::Indigo => "#6366f1",
            KeyColor::Teal => "#14b8a6",
            KeyColor::Purple => "#a855f7",
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            KeyColor::Emerald => "emerald",
            KeyColor::Blue => "blue",
            KeyColor::Violet => "violet",
            KeyColor::Pink => "pink",
            KeyColor::Amber => "amber",
            KeyColor::Red => "red",
            KeyColor::Cyan => "cyan",
            KeyColor::Lime => "lime",
            KeyColor::Orange => "orange",
            KeyColor::Indigo => "indigo",
            KeyColor::Teal => "teal",
            KeyColor::Purple => "purple",
        }
    }

    /// Red, green and blue channels of the hex value.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = &self.hex()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }

    /// Accepts either a preset hex value (any case) or its token name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if HEX_COLOR_REGEX.is_match(value) {
            let lower = value.to_ascii_lowercase();
            return Self::ALL.iter().copied().find(|c| c.hex() == lower);
        }
        let lower = value.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.token() == lower)
    }

    pub fn random() -> Self {
        let idx = rand::thread_rng().gen_range(0..Self::ALL.len());
        Self::ALL[idx]
    }
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hex())
    }
}

impl TryFrom<String> for KeyColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        KeyColor::parse(&value).ok_or_else(|| format!("unknown key color '{}'", value))
    }
}

impl From<KeyColor> for String {
    fn from(color: KeyColor) -> Self {
        color.hex().to_string()
    }
}

/// Generate a key id that does not collide with any id in `existing`
///
/// Ids look like `key_<unix-millis>_<suffix>`; the random suffix keeps two keys
/// created in the same millisecond apart.
pub fn generate_key_id(existing: &[TrackerKey]) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut rng = rand::thread_rng();

    loop {
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..ID_SUFFIX_CHARSET.len());
                ID_SUFFIX_CHARSET[idx] as char
            })
            .collect();
        let id = format!("key_{}_{}", millis, suffix);
        if !existing.iter().any(|k| k.id == id) {
            return id;
        }
    }
}
