//! [`LineClassifier`]: raw log line in, typed [`Event`]s out.
//!
//! # Algorithm
//!
//! ```text
//! raw line
//!   └─ split DATE TIME REST ──fail──▶ Unclassified
//!        ├─ "[Tag] body" ──▶ ChannelRouter
//!        │     ├─ unknown tag   ──▶ Unclassified
//!        │     ├─ disabled      ──▶ (nothing)
//!        │     └─ enabled       ──▶ channel parser ──▶ Speech / SelfReport
//!        └─ PREFIX_RULES (first match wins) ──▶ Stat / State / Speech
//!              └─ no match ──▶ Unclassified
//! ```
//!
//! Channel-tagged lines always take precedence over prefix rules.  The only
//! state carried between calls is the caption speaker memory and the
//! logged-in character, so replaying the same lines from a fresh session
//! yields the same events.

use crate::config::{AppConfig, SpeechConfig};

use super::caption::CaptionState;
use super::event::{Event, SpeechEvent, StateEvent};
use super::markup::is_unspeakable;
use super::parsers::{parse_channel, ParseError, Parsed};
use super::router::{ChannelRouter, Route};
use super::rules::{LogLine, RuleContext, PREFIX_RULES};

// ---------------------------------------------------------------------------
// LineClassifier
// ---------------------------------------------------------------------------

/// Per-session classifier.  Owned by the tailer thread.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    router: ChannelRouter,
    speech: SpeechConfig,
    caption: CaptionState,
    character: Option<String>,
}

impl LineClassifier {
    pub fn new(router: ChannelRouter, speech: SpeechConfig) -> Self {
        Self {
            router,
            speech,
            caption: CaptionState::new(),
            character: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ChannelRouter::new(config.channels.clone()),
            config.speech.clone(),
        )
    }

    /// Logged-in character, if a login marker has been seen.
    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    pub fn set_character(&mut self, name: Option<String>) {
        self.character = name;
    }

    pub fn caption_state(&self) -> &CaptionState {
        &self.caption
    }

    /// Start a new session: forget caption speakers and the character.
    pub fn reset_session(&mut self) {
        self.caption.reset();
        self.character = None;
    }

    /// Classify one raw line.
    ///
    /// Returns an empty vector for lines that are recognised but suppressed
    /// (toggle off, nothing worth saying, disabled channel) or that failed a
    /// sub-parser's shape check.  Never panics on bad input.
    pub fn classify(&mut self, raw: &str) -> Vec<Event> {
        let line = match LogLine::split(raw) {
            Ok(line) => line,
            Err(e) => {
                log::debug!("classify: {e}");
                return vec![Event::unclassified(raw)];
            }
        };

        if line.rest.starts_with('[') {
            return self.classify_channel(raw, line.rest);
        }

        let ctx = RuleContext {
            speech: &self.speech,
            character: self.character.as_deref(),
        };

        let Some(rule) = PREFIX_RULES.iter().find(|r| (r.matches)(&line)) else {
            log::trace!("classify: no rule for {:?}", line.rest);
            return vec![Event::unclassified(raw)];
        };

        match (rule.parse)(&line, &ctx) {
            Ok(events) => {
                self.observe(&events);
                events
            }
            Err(e) => {
                log::debug!("classify: rule {} failed: {e}", rule.name);
                Vec::new()
            }
        }
    }

    fn classify_channel(&mut self, raw: &str, rest: &str) -> Vec<Event> {
        let Some((tag, body)) = ChannelRouter::split_tag(rest) else {
            log::debug!("classify: {}", ParseError::MalformedLine(raw.to_string()));
            return vec![Event::unclassified(raw)];
        };

        let channel = match self.router.route(tag) {
            Route::Dispatch(cfg) => *cfg,
            Route::Disabled => return Vec::new(),
            Route::Unknown => {
                log::debug!("classify: {}", ParseError::UnclassifiedTag(tag.to_string()));
                return vec![Event::unclassified(raw)];
            }
        };

        match parse_channel(channel.parser, body, self.character.as_deref(), &mut self.caption) {
            Ok(Parsed::Speech { speaker, text }) => {
                if is_unspeakable(&text) {
                    return Vec::new();
                }
                vec![SpeechEvent::new(speaker, text, channel.category).into()]
            }
            Ok(Parsed::SelfReport(pairs)) => pairs
                .into_iter()
                .map(|(key, value)| StateEvent::SelfReport { key, value }.into())
                .collect(),
            Ok(Parsed::Nothing) => Vec::new(),
            Err(e) => {
                log::debug!("classify: [{tag}] {e}");
                Vec::new()
            }
        }
    }

    fn observe(&mut self, events: &[Event]) {
        for event in events {
            if let Event::State(StateEvent::CharacterLogin { name }) = event {
                log::info!("classify: character identified: {name}");
                self.character = Some(name.clone());
            }
        }
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(ChannelRouter::default(), SpeechConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
