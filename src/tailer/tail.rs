//! [`LogTailer`]: blocking follower for the active chat log.
//!
//! # Loop
//!
//! ```text
//! ┌──────────── every poll_interval_ms ────────────┐
//! │ read complete lines ─▶ LineClassifier          │
//! │    Speech        ─▶ speech queue (mpsc)        │
//! │    everything else ─▶ EventBus                 │
//! │ every rotation_check_secs: newer log? switch   │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Runs on its own OS thread; nothing here touches the async runtime except
//! the non-blocking channel sends.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;

use crate::bus::EventBus;
use crate::classify::{Event, LineClassifier, SpeechEvent, StateEvent};
use crate::config::{TailMode, TailerConfig};

use super::discovery::find_latest_log;
use super::login::find_character_login;
use super::TailerError;

/// Floor for `poll_interval_ms`; zero would spin a core.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Where classified events go.
#[derive(Debug, Clone)]
pub struct TailSinks {
    pub speech: UnboundedSender<SpeechEvent>,
    pub bus: EventBus,
}

pub struct LogTailer {
    dir: PathBuf,
    config: TailerConfig,
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of a line whose newline has not been written yet.
    pending: Vec<u8>,
    classifier: LineClassifier,
    sinks: TailSinks,
    last_rotation_check: Instant,
}

impl LogTailer {
    /// Discover the newest log in `dir`, identify the character and position
    /// the reader according to `config.mode`.
    pub fn open(
        dir: &Path,
        config: &TailerConfig,
        classifier: LineClassifier,
        sinks: TailSinks,
    ) -> Result<Self, TailerError> {
        let path = find_latest_log(dir, &config.extension)?;
        log::info!("tailer: following {}", path.display());

        let mut tailer = Self {
            dir: dir.to_path_buf(),
            config: config.clone(),
            reader: open_reader(&path)?,
            path,
            pending: Vec::new(),
            classifier,
            sinks,
            last_rotation_check: Instant::now(),
        };
        tailer.activate()?;
        tailer.position(config.mode)?;
        Ok(tailer)
    }

    /// File currently being followed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn classifier(&self) -> &LineClassifier {
        &self.classifier
    }

    /// `Live` seeks to the end so only new activity is read; `Replay`
    /// rewinds to the start.
    pub fn position(&mut self, mode: TailMode) -> Result<(), TailerError> {
        let from = match mode {
            TailMode::Live => SeekFrom::End(0),
            TailMode::Replay => SeekFrom::Start(0),
        };
        self.reader
            .seek(from)
            .map_err(|e| io_err(&self.path, e))?;
        self.pending.clear();
        Ok(())
    }

    /// Read and route every complete line appended since the last call.
    ///
    /// Returns the number of non-empty lines classified.  A trailing partial
    /// line is held back until its newline arrives.
    pub fn poll_once(&mut self) -> Result<usize, TailerError> {
        self.rewind_if_truncated()?;

        let mut lines = 0;
        loop {
            let n = self
                .reader
                .read_until(b'\n', &mut self.pending)
                .map_err(|e| io_err(&self.path, e))?;
            if n == 0 || self.pending.last() != Some(&b'\n') {
                break;
            }
            let raw = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            if self.handle_line(&raw)? {
                lines += 1;
            }
        }
        Ok(lines)
    }

    /// Switch to a newer log file if one has appeared.
    ///
    /// The old file is drained first.  The new file is read from the top,
    /// the classifier session is reset and the login scan re-run.
    pub fn check_rotation(&mut self) -> Result<bool, TailerError> {
        let latest = match find_latest_log(&self.dir, &self.config.extension) {
            Ok(path) => path,
            Err(TailerError::NoLogFileFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if latest == self.path {
            return Ok(false);
        }

        self.poll_once()?;

        log::info!("tailer: new session log {}", latest.display());
        self.reader = open_reader(&latest)?;
        self.path = latest;
        self.pending.clear();
        self.classifier.reset_session();
        self.activate()?;
        Ok(true)
    }

    /// Poll forever.
    ///
    /// Returns `Ok(())` when the speech queue receiver is dropped and an
    /// error on unrecoverable I/O failure.
    pub fn run(&mut self) -> Result<(), TailerError> {
        let interval = self.poll_interval();
        loop {
            let step = self.poll_once().and_then(|_| self.maybe_rotate());
            match step {
                Ok(_) => {}
                Err(TailerError::SpeechQueueClosed) => {
                    log::info!("tailer: speech queue closed, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            std::thread::sleep(interval);
        }
    }

    /// Sleep between passes of [`run`](Self::run).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn maybe_rotate(&mut self) -> Result<bool, TailerError> {
        let every = Duration::from_secs(self.config.rotation_check_secs);
        if self.last_rotation_check.elapsed() < every {
            return Ok(false);
        }
        self.last_rotation_check = Instant::now();
        self.check_rotation()
    }

    /// Publish the login scan result and seed the classifier with it.
    fn activate(&mut self) -> Result<(), TailerError> {
        match find_character_login(&self.path)? {
            Some(name) => {
                log::info!("tailer: logged in as {name}");
                self.classifier.set_character(Some(name.clone()));
                self.sinks
                    .bus
                    .publish(StateEvent::CharacterLogin { name }.into());
            }
            None => {
                log::warn!(
                    "tailer: no login marker in {}, outbound tells stay silent until one appears",
                    self.path.display()
                );
                self.sinks.bus.publish(StateEvent::LoginNotFound.into());
            }
        }
        Ok(())
    }

    /// The game truncated or replaced the file in place: start over.
    fn rewind_if_truncated(&mut self) -> Result<(), TailerError> {
        let len = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| io_err(&self.path, e))?
            .len();
        let pos = self
            .reader
            .stream_position()
            .map_err(|e| io_err(&self.path, e))?;
        if len < pos {
            log::warn!("tailer: {} shrank, rereading from the start", self.path.display());
            self.position(TailMode::Replay)?;
        }
        Ok(())
    }

    fn handle_line(&mut self, raw: &str) -> Result<bool, TailerError> {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(false);
        }
        for event in self.classifier.classify(line) {
            self.route(event)?;
        }
        Ok(true)
    }

    fn route(&self, event: Event) -> Result<(), TailerError> {
        match event {
            Event::Speech(speech) => self
                .sinks
                .speech
                .send(speech)
                .map_err(|_| TailerError::SpeechQueueClosed),
            Event::Unclassified { raw_line } => {
                log::debug!("tailer: unclassified: {raw_line}");
                self.sinks.bus.publish(Event::Unclassified { raw_line });
                Ok(())
            }
            other => {
                self.sinks.bus.publish(other);
                Ok(())
            }
        }
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, TailerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| io_err(path, e))
}

fn io_err(path: &Path, source: io::Error) -> TailerError {
    TailerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventSubscriber;
    use crate::classify::{Category, StatEvent};
    use std::io::Write;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Fixture {
        dir: TempDir,
        speech: UnboundedReceiver<SpeechEvent>,
        events: EventSubscriber,
        tailer: LogTailer,
    }

    fn config(mode: TailMode) -> TailerConfig {
        TailerConfig {
            mode,
            rotation_check_secs: 3600,
            poll_interval_ms: 1,
            ..TailerConfig::default()
        }
    }

    fn fixture(contents: &str, mode: TailMode) -> Fixture {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("chatlog.txt"), contents).unwrap();

        let (tx, speech) = unbounded_channel();
        let bus = EventBus::new();
        let events = bus.subscribe();
        let sinks = TailSinks { speech: tx, bus };
        let tailer =
            LogTailer::open(dir.path(), &config(mode), LineClassifier::default(), sinks).unwrap();
        Fixture {
            dir,
            speech,
            events,
            tailer,
        }
    }

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn drain_speech(rx: &mut UnboundedReceiver<SpeechEvent>) -> Vec<SpeechEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn drain_events(sub: &mut EventSubscriber) -> Vec<Event> {
        std::iter::from_fn(|| sub.try_next_event()).collect()
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let mut f = fixture("", TailMode::Live);
        assert_eq!(f.tailer.poll_interval(), MIN_POLL_INTERVAL);

        f.tailer.config.poll_interval_ms = 0;
        assert_eq!(f.tailer.poll_interval(), MIN_POLL_INTERVAL);

        f.tailer.config.poll_interval_ms = 250;
        assert_eq!(f.tailer.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn open_fails_without_logs() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = unbounded_channel();
        let sinks = TailSinks {
            speech: tx,
            bus: EventBus::new(),
        };
        let err = LogTailer::open(
            dir.path(),
            &config(TailMode::Live),
            LineClassifier::default(),
            sinks,
        )
        .err()
        .unwrap();
        assert!(matches!(err, TailerError::NoLogFileFound { .. }));
    }

    #[test]
    fn replay_routes_speech_and_other_events() {
        let mut fx = fixture(
            "2024-01-01 10:00:00 Welcome to City of Heroes, Captain Zed!\n\
             2024-01-01 10:00:01 [NPC] Positron: Stay sharp.\n\
             2024-01-01 10:00:02 You gain 250 experience.\n\
             \n",
            TailMode::Replay,
        );

        assert_eq!(fx.tailer.poll_once().unwrap(), 3);

        let speech = drain_speech(&mut fx.speech);
        assert_eq!(
            speech,
            vec![SpeechEvent::new(
                Some("Positron".into()),
                "Stay sharp",
                Category::Npc
            )]
        );

        let events = drain_events(&mut fx.events);
        let login = Event::State(StateEvent::CharacterLogin {
            name: "Captain Zed".into(),
        });
        assert_eq!(events.first(), Some(&login));
        assert!(events.contains(&Event::Stat(StatEvent::XpGain(250))));
        assert_eq!(fx.tailer.classifier().character(), Some("Captain Zed"));
    }

    #[test]
    fn live_mode_skips_history() {
        let mut fx = fixture(
            "2024-01-01 10:00:01 [NPC] Positron: old news\n",
            TailMode::Live,
        );
        assert_eq!(fx.tailer.poll_once().unwrap(), 0);

        let path = fx.tailer.path().to_path_buf();
        append(&path, "2024-01-01 10:00:05 [NPC] Positron: fresh\n");
        assert_eq!(fx.tailer.poll_once().unwrap(), 1);

        let speech = drain_speech(&mut fx.speech);
        assert_eq!(speech.len(), 1);
        assert_eq!(speech[0].text, "fresh");
    }

    #[test]
    fn partial_line_is_completed_later() {
        let mut fx = fixture("", TailMode::Live);
        let path = fx.tailer.path().to_path_buf();

        append(&path, "2024-01-01 10:00:05 [NPC] Positron: hel");
        assert_eq!(fx.tailer.poll_once().unwrap(), 0);
        assert!(drain_speech(&mut fx.speech).is_empty());

        append(&path, "lo there\r\n");
        assert_eq!(fx.tailer.poll_once().unwrap(), 1);
        assert_eq!(drain_speech(&mut fx.speech)[0].text, "hello there");
    }

    #[test]
    fn missing_login_is_published() {
        let mut fx = fixture("2024-01-01 10:00:01 [NPC] Positron: hi\n", TailMode::Live);
        let events = drain_events(&mut fx.events);
        assert_eq!(events, vec![Event::State(StateEvent::LoginNotFound)]);
        assert_eq!(fx.tailer.classifier().character(), None);
    }

    #[test]
    fn unclassified_lines_reach_the_bus() {
        let mut fx = fixture("", TailMode::Live);
        drain_events(&mut fx.events);
        let path = fx.tailer.path().to_path_buf();
        append(&path, "something odd\n");
        fx.tailer.poll_once().unwrap();
        assert_eq!(
            drain_events(&mut fx.events),
            vec![Event::unclassified("something odd")]
        );
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut fx = fixture("", TailMode::Live);
        let path = fx.tailer.path().to_path_buf();
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"2024-01-01 10:00:05 [NPC] Positron: caf\xe9\n")
            .unwrap();
        assert_eq!(fx.tailer.poll_once().unwrap(), 1);
        assert_eq!(drain_speech(&mut fx.speech)[0].text, "caf\u{FFFD}");
    }

    #[test]
    fn run_stops_when_queue_closes() {
        let Fixture {
            dir: _dir,
            speech,
            events: _events,
            mut tailer,
        } = fixture(
            "2024-01-01 10:00:01 [NPC] Positron: anyone there?\n",
            TailMode::Replay,
        );
        drop(speech);
        assert!(tailer.run().is_ok());
    }

    #[test]
    fn rotation_switches_to_newer_log() {
        let mut fx = fixture("2024-01-01 10:00:01 [NPC] Positron: first\n", TailMode::Live);
        assert!(!fx.tailer.check_rotation().unwrap());

        std::thread::sleep(Duration::from_millis(30));
        let newer = fx.dir.path().join("chatlog-2.txt");
        std::fs::write(
            &newer,
            "2024-01-02 09:00:00 Now entering Atlas Park, Sparky!\n\
             2024-01-02 09:00:01 [NPC] Synapse: second\n",
        )
        .unwrap();
        drain_events(&mut fx.events);

        assert!(fx.tailer.check_rotation().unwrap());
        assert_eq!(fx.tailer.path(), newer.as_path());
        assert_eq!(
            drain_events(&mut fx.events),
            vec![Event::State(StateEvent::CharacterLogin {
                name: "Sparky".into()
            })]
        );

        fx.tailer.poll_once().unwrap();
        let texts: Vec<String> = drain_speech(&mut fx.speech)
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, vec!["second".to_string()]);
    }

    #[test]
    fn truncated_file_is_reread() {
        let mut fx = fixture(
            "2024-01-01 10:00:01 [NPC] Positron: a fairly long first line\n",
            TailMode::Replay,
        );
        fx.tailer.poll_once().unwrap();
        drain_speech(&mut fx.speech);

        let path = fx.tailer.path().to_path_buf();
        std::fs::write(&path, "2024-01-01 11:00:00 [NPC] Zeke: short\n").unwrap();
        fx.tailer.poll_once().unwrap();
        assert_eq!(drain_speech(&mut fx.speech)[0].text, "short");
    }
}
