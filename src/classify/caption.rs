//! Speaker memory for the `[Caption]` channel.
//!
//! Captions carry no speaker name.  Two heuristics recover one:
//!
//! 1. **Color memory**: each speaker's captions tend to use a consistent
//!    `<bgcolor X>`, so once a color is attributed it is remembered.
//! 2. **Introduction phrases**: a fixed table of substrings
//!    (`"Positron here"`) that name the speaker outright.
//!
//! A phrase match wins over color memory and rebinds the color.  Bindings can
//! be overwritten but are never removed during a session.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Introduction table
// ---------------------------------------------------------------------------

struct Introduction {
    phrase: &'static str,
    speaker: &'static str,
}

static INTRODUCTIONS: &[Introduction] = &[
    Introduction {
        phrase: "Positron here",
        speaker: "Positron",
    },
    Introduction {
        phrase: "This is Positron",
        speaker: "Positron",
    },
    Introduction {
        phrase: "Synapse here",
        speaker: "Synapse",
    },
    Introduction {
        phrase: "This is Synapse",
        speaker: "Synapse",
    },
    Introduction {
        phrase: "This is Sister Psyche",
        speaker: "Sister Psyche",
    },
    Introduction {
        phrase: "Statesman here",
        speaker: "Statesman",
    },
    Introduction {
        phrase: "This is Manticore",
        speaker: "Manticore",
    },
    Introduction {
        phrase: "Ms. Liberty here",
        speaker: "Ms. Liberty",
    },
    Introduction {
        phrase: "Back Alley Brawler here",
        speaker: "Back Alley Brawler",
    },
    Introduction {
        phrase: "I am Lord Recluse",
        speaker: "Lord Recluse",
    },
    Introduction {
        phrase: "Mender Silos here",
        speaker: "Mender Silos",
    },
];

/// Speaker named by the first introduction phrase found in `text`.
pub fn match_introduction(text: &str) -> Option<&'static str> {
    INTRODUCTIONS
        .iter()
        .find(|intro| text.contains(intro.phrase))
        .map(|intro| intro.speaker)
}

// ---------------------------------------------------------------------------
// CaptionState
// ---------------------------------------------------------------------------

/// Per-session caption speaker memory.  Owned by the classifier; reset when
/// the tailer starts a new session.
#[derive(Debug, Default, Clone)]
pub struct CaptionState {
    colors: HashMap<String, String>,
    active: Option<String>,
}

impl CaptionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaker_for_color(&self, color: &str) -> Option<&str> {
        self.colors.get(color).map(String::as_str)
    }

    pub fn active_speaker(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn bind(&mut self, color: &str, speaker: &str) {
        self.colors.insert(color.to_string(), speaker.to_string());
    }

    /// Forget everything.  Only called on session restart.
    pub fn reset(&mut self) {
        self.colors.clear();
        self.active = None;
    }

    /// Work out who is speaking `text`, updating memory as a side effect.
    ///
    /// Order matters: color memory is consulted first, then the phrase
    /// table, which overrides it.  With neither a color nor a phrase the
    /// active speaker carries over; an unbound color yields `None`.
    pub fn identify(&mut self, color: Option<&str>, text: &str) -> Option<String> {
        let mut speaker = color
            .and_then(|c| self.speaker_for_color(c))
            .map(str::to_string);

        if let Some(name) = match_introduction(text) {
            if let Some(c) = color {
                log::debug!("caption: binding color {c} -> {name}");
                self.bind(c, name);
            }
            speaker = Some(name.to_string());
        }

        match speaker {
            Some(name) => {
                self.active = Some(name.clone());
                Some(name)
            }
            None if color.is_none() => self.active.clone(),
            None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_binds_color() {
        let mut st = CaptionState::new();
        let who = st.identify(Some("DarkGreen"), "Positron here. Status report");
        assert_eq!(who.as_deref(), Some("Positron"));
        assert_eq!(st.speaker_for_color("DarkGreen"), Some("Positron"));
        assert_eq!(st.active_speaker(), Some("Positron"));
    }

    #[test]
    fn bound_color_is_adopted_later() {
        let mut st = CaptionState::new();
        st.identify(Some("DarkGreen"), "Positron here.");
        let who = st.identify(Some("DarkGreen"), "Keep moving");
        assert_eq!(who.as_deref(), Some("Positron"));
    }

    #[test]
    fn phrase_overrides_color_memory_and_rebinds() {
        let mut st = CaptionState::new();
        st.identify(Some("Blue"), "Positron here.");
        let who = st.identify(Some("Blue"), "Synapse here, on the line");
        assert_eq!(who.as_deref(), Some("Synapse"));
        assert_eq!(st.speaker_for_color("Blue"), Some("Synapse"));
    }

    #[test]
    fn unbound_color_without_phrase_is_unknown() {
        let mut st = CaptionState::new();
        st.identify(Some("Blue"), "Positron here.");
        assert_eq!(st.identify(Some("Red"), "Who goes there"), None);
        // Existing bindings survive.
        assert_eq!(st.speaker_for_color("Blue"), Some("Positron"));
    }

    #[test]
    fn no_color_keeps_active_speaker() {
        let mut st = CaptionState::new();
        st.identify(Some("Blue"), "Statesman here.");
        assert_eq!(st.identify(None, "Follow me").as_deref(), Some("Statesman"));
    }

    #[test]
    fn reset_clears_memory() {
        let mut st = CaptionState::new();
        st.identify(Some("Blue"), "Statesman here.");
        st.reset();
        assert_eq!(st.speaker_for_color("Blue"), None);
        assert_eq!(st.active_speaker(), None);
    }

    #[test]
    fn match_introduction_unknown() {
        assert_eq!(match_introduction("The doors are sealed"), None);
        assert_eq!(match_introduction("This is Sister Psyche."), Some("Sister Psyche"));
    }
}
