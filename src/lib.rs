//! Give voices to a game's chat log.
//!
//! A [`tailer::LogTailer`] follows the newest log file and runs each line
//! through a [`classify::LineClassifier`].  Speech goes to a
//! [`speech::SynthesisDispatcher`] over an mpsc queue; everything else is
//! broadcast on the [`bus::EventBus`].

pub mod bus;
pub mod classify;
pub mod config;
pub mod speech;
pub mod store;
pub mod tailer;
