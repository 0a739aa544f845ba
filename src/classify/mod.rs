//! Line classification: raw log lines → typed domain events.
//!
//! This module provides:
//! * [`Event`] and friends: the tagged union every line maps to.
//! * [`ChannelRouter`] / [`ChannelConfig`]: the `[Tag]` → parser table.
//! * [`LineClassifier`]: the per-session classifier driven by the tailer.
//! * [`CaptionState`]: speaker memory for the caption channel.
//! * [`PREFIX_RULES`]: ordered rules for untagged lines.
//!
//! # Quick start
//!
//! ```rust
//! use log_voices::classify::{Category, Event, LineClassifier};
//!
//! let mut classifier = LineClassifier::default();
//! let events = classifier.classify("2024-04-26 18:40:13 [NPC] Positron: Stay sharp.");
//! match &events[..] {
//!     [Event::Speech(ev)] => {
//!         assert_eq!(ev.speaker.as_deref(), Some("Positron"));
//!         assert_eq!(ev.category, Category::Npc);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod caption;
pub mod classifier;
pub mod combat;
pub mod event;
pub mod markup;
pub mod parsers;
pub mod router;
pub mod rules;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use caption::CaptionState;
pub use classifier::LineClassifier;
pub use event::{Category, Event, RosterChange, SpeechEvent, StatEvent, StateEvent};
pub use parsers::{ParseError, Parsed};
pub use router::{default_channels, ChannelConfig, ChannelRouter, ParserKind, Route};
pub use rules::{login_name, LogLine, PREFIX_RULES};
