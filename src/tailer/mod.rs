//! Log tailing: follow the game's newest chat log and feed every new line
//! through the classifier.
//!
//! * [`discovery`]: pick the active log file.
//! * [`login`]: scan a file for the logged-in character.
//! * [`tail`]: [`LogTailer`], the blocking read loop.

pub mod discovery;
pub mod login;
pub mod tail;

pub use discovery::find_latest_log;
pub use login::find_character_login;
pub use tail::{LogTailer, TailSinks};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailerError {
    /// Fatal at startup: there is nothing to follow.
    #[error("no *.{extension} log file found in {}", dir.display())]
    NoLogFileFound { dir: PathBuf, extension: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The speech queue consumer has gone away; the tailer should stop.
    #[error("speech queue closed")]
    SpeechQueueClosed,
}
