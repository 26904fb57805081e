//! Key identifiers and canonical combo strings.
//!
//! A key is named by the host's raw key-name vocabulary: lowercase words,
//! multi-word names separated by a single space (`"a"`, `"ctrl"`,
//! `"left windows"`, `"page down"`).  Two names are the same key iff the
//! strings are byte-for-byte equal; no normalization happens here.
//!
//! # Combos
//!
//! A combo is a non-modifier key pressed while one or more modifiers are held.
//! Observers deduplicate combos by string, so the representation must not
//! depend on press order: every participating name is sorted
//! lexicographically and joined with `+`.
//!
//! ```rust
//! use keystream_core::{Combo, KeyName};
//!
//! let key = KeyName::new("a");
//! let ctrl_first = [KeyName::new("ctrl"), KeyName::new("shift")];
//! let shift_first = [KeyName::new("shift"), KeyName::new("ctrl")];
//!
//! let a = Combo::new(&ctrl_first, &key);
//! let b = Combo::new(&shift_first, &key);
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "a+ctrl+shift");
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

/// The fixed set of modifier key names.
///
/// Modifiers never emit events of their own; they only fold into combos.
pub const MODIFIER_KEYS: [&str; 5] = ["ctrl", "shift", "alt", "left windows", "super"];

/// Separator between names in a canonical combo string.
pub const COMBO_SEPARATOR: &str = "+";

/// Returns `true` if `name` is one of [`MODIFIER_KEYS`].
pub fn is_modifier(name: &str) -> bool {
    MODIFIER_KEYS.contains(&name)
}

/// Name of a physical key in the host vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyName(String);

impl KeyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this key belongs to the modifier set.
    pub fn is_modifier(&self) -> bool {
        is_modifier(&self.0)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for KeyName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for KeyName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for KeyName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Canonical `+`-joined combo string.
///
/// Always in the sorted, duplicate-free form: [`Combo::new`] builds it that
/// way and deserialization re-canonicalizes whatever string it is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Combo(String);

impl Combo {
    /// Builds the canonical combo for `modifiers ∪ {key}`.
    pub fn new<'a>(modifiers: impl IntoIterator<Item = &'a KeyName>, key: &'a KeyName) -> Self {
        Self::from_names(
            modifiers
                .into_iter()
                .map(KeyName::as_str)
                .chain(std::iter::once(key.as_str())),
        )
    }

    fn from_names<'a>(names: impl Iterator<Item = &'a str>) -> Self {
        let names: BTreeSet<&str> = names.collect();
        Self(names.into_iter().collect::<Vec<_>>().join(COMBO_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the participating key names in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.split(COMBO_SEPARATOR)
    }
}

impl<'de> Deserialize<'de> for Combo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.split(COMBO_SEPARATOR).any(str::is_empty) {
            return Err(de::Error::custom(format!("malformed combo `{raw}`")));
        }
        Ok(Self::from_names(raw.split(COMBO_SEPARATOR)))
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
