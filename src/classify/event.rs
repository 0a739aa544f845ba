//! Domain events produced by the line classifier.
//!
//! Every classified log line becomes zero or more [`Event`]s.  Speech events
//! flow to the synthesis dispatcher; everything else goes to the
//! [`EventBus`](crate::bus::EventBus).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Who is talking, broadly.  Drives both voice selection and which playback
/// channel an utterance lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Non-player characters (contacts, villains, captions).
    Npc,
    /// Other players (team chat, tells).
    Player,
    /// Narration: buffs, debuffs, badges, level-ups.
    System,
}

impl Category {
    /// Lower-case label used in cache paths and store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Npc => "npc",
            Category::Player => "player",
            Category::System => "system",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SpeechEvent
// ---------------------------------------------------------------------------

/// A single utterance to vocalise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    /// `None` for pure system narration.
    pub speaker: Option<String>,
    pub text: String,
    pub category: Category,
}

impl SpeechEvent {
    pub fn new(speaker: Option<String>, text: impl Into<String>, category: Category) -> Self {
        Self {
            speaker,
            text: text.into(),
            category,
        }
    }

    /// Narration with no speaker.
    pub fn narration(text: impl Into<String>) -> Self {
        Self::new(None, text, Category::System)
    }
}

// ---------------------------------------------------------------------------
// StatEvent
// ---------------------------------------------------------------------------

/// Numeric combat / progression events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatEvent {
    XpGain(u64),
    InfGain(u64),
    Damage {
        target: String,
        power: String,
        amount: u64,
        damage_type: String,
        over_time: bool,
        /// Title-cased tag from a trailing `(CRITICAL)`-style marker.
        special: Option<String>,
    },
    Miss {
        target: String,
        power: String,
    },
}

// ---------------------------------------------------------------------------
// StateEvent
// ---------------------------------------------------------------------------

/// Direction of a team roster change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    Joined,
    Quit,
}

/// Session / character state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// The logged-in character was identified.
    CharacterLogin { name: String },
    /// The login scan found no welcome marker in the current log.
    LoginNotFound,
    LevelUp { level: u32 },
    TeamChange { name: String, change: RosterChange },
    PowerRecharged { power: String },
    /// One `key=value` pair from an outbound self-report tell.
    SelfReport { key: String, value: String },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// The tagged union every classified line maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Speech(SpeechEvent),
    Stat(StatEvent),
    State(StateEvent),
    Unclassified { raw_line: String },
}

impl Event {
    pub fn unclassified(raw_line: &str) -> Self {
        Event::Unclassified {
            raw_line: raw_line.to_string(),
        }
    }

    pub fn is_speech(&self) -> bool {
        matches!(self, Event::Speech(_))
    }
}

impl From<SpeechEvent> for Event {
    fn from(ev: SpeechEvent) -> Self {
        Event::Speech(ev)
    }
}

impl From<StatEvent> for Event {
    fn from(ev: StatEvent) -> Self {
        Event::Stat(ev)
    }
}

impl From<StateEvent> for Event {
    fn from(ev: StateEvent) -> Self {
        Event::State(ev)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
