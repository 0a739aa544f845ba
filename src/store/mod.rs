//! Persistent lookups the dispatcher depends on.
//!
//! * [`PhraseStore`]: stable ids for utterances plus optional translations.
//! * [`CharacterStore`]: per-speaker voice assignment and effects.
//!
//! Both are synchronous traits: every implementation so far is a local
//! file, and callers hold no lock across an `.await`.  [`JsonStore`]
//! implements both.

pub mod json;

pub use json::JsonStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::Category;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialisation error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown phrase id {0}")]
    UnknownPhrase(PhraseId),

    #[error("unknown character id {0}")]
    UnknownCharacter(CharacterId),
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u64);

impl std::fmt::Display for PhraseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Text to synthesise for a phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub text: String,
    /// `false` when no translation exists for the target locale and `text`
    /// is the original utterance.
    pub was_translated: bool,
}

/// A speaker with its voice assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub category: Category,
    /// Provider id tried first.
    pub primary_provider: String,
    /// Provider id used when the primary needs a fallback.
    pub secondary_provider: String,
    /// Effect names forwarded to the renderer, in order.
    #[serde(default)]
    pub effects: Vec<String>,
    /// Free-form attributes from self-reports (`gender`, `origin`, …).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Unix seconds of the last successful playback start.
    #[serde(default)]
    pub last_spoke: Option<u64>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait PhraseStore: Send + Sync {
    /// Idempotent: the same `(speaker, category, text)` always yields the
    /// same id.
    fn get_or_create_phrase_id(
        &self,
        speaker: &str,
        category: Category,
        text: &str,
    ) -> Result<PhraseId, StoreError>;

    /// Text to speak for `id` in the store's target locale.
    fn get_translated(&self, id: PhraseId) -> Result<Translated, StoreError>;
}

pub trait CharacterStore: Send + Sync {
    /// Idempotent on `(name, category)`.  New characters get the default
    /// provider pair.
    fn get_or_create_character(
        &self,
        name: &str,
        category: Category,
    ) -> Result<Character, StoreError>;

    fn record_last_spoke(&self, id: CharacterId) -> Result<(), StoreError>;

    /// Apply one self-reported `key=value` to every record named `name`,
    /// creating a player record if none exists.
    ///
    /// `primary`, `secondary` and `effects` (comma separated) update the
    /// voice assignment; any other key is stored as a plain attribute.
    fn set_attribute(&self, name: &str, key: &str, value: &str) -> Result<(), StoreError>;
}
