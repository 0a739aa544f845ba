//! Playback channels and the audio sink behind them.
//!
//! [`PlaybackChannelPool`] holds N logical channels, each a busy flag.
//! Channel 0 is reserved for system narration; every other speaker is
//! hash-routed to one of channels `1..N`, so one speaker's lines never
//! overlap while different speakers may talk over each other.
//!
//! Acquiring a busy channel polls with a fixed backoff.  Playback itself runs
//! on the blocking pool and the channel is released when it finishes.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::classify::Category;
use crate::config::PlaybackConfig;

/// Reserved for speakerless system narration.
pub const SYSTEM_CHANNEL: usize = 0;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No output device, or the device refused a stream.
    #[error("audio device error: {0}")]
    Device(String),

    /// The bytes are not a format the decoder understands.
    #[error("audio decode error: {0}")]
    Decode(String),

    /// The blocking playback task panicked or was cancelled.
    #[error("playback task failed: {0}")]
    Join(String),
}

// ---------------------------------------------------------------------------
// AudioSink
// ---------------------------------------------------------------------------

/// Something that can play encoded audio to completion.
///
/// `play` blocks the calling thread until the audio has finished; the pool
/// always calls it from `spawn_blocking`.
pub trait AudioSink: Send + Sync + 'static {
    fn play(&self, channel: usize, audio: Vec<u8>) -> Result<(), PlaybackError>;
}

/// Default output device via rodio.
///
/// `OutputStream` is not `Send`, so each utterance opens its own stream on
/// the playback thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioSink;

impl AudioSink for RodioSink {
    fn play(&self, channel: usize, audio: Vec<u8>) -> Result<(), PlaybackError> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
        let source =
            Decoder::new(Cursor::new(audio)).map_err(|e| PlaybackError::Decode(e.to_string()))?;

        log::trace!("playback: channel {channel} started");
        sink.append(source);
        sink.sleep_until_end();
        log::trace!("playback: channel {channel} finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelGuard
// ---------------------------------------------------------------------------

/// Holds one channel busy until dropped.
pub struct ChannelGuard {
    busy: Arc<Vec<AtomicBool>>,
    channel: usize,
}

impl ChannelGuard {
    pub fn channel(&self) -> usize {
        self.channel
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.busy[self.channel].store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// PlaybackChannelPool
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PlaybackChannelPool {
    busy: Arc<Vec<AtomicBool>>,
    sink: Arc<dyn AudioSink>,
    backoff: Duration,
}

impl PlaybackChannelPool {
    /// `channels` is clamped to at least 2: the reserved system channel plus
    /// one for speakers.
    pub fn new(channels: usize, backoff: Duration, sink: Arc<dyn AudioSink>) -> Self {
        let channels = channels.max(2);
        Self {
            busy: Arc::new((0..channels).map(|_| AtomicBool::new(false)).collect()),
            sink,
            backoff,
        }
    }

    pub fn from_config(config: &PlaybackConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self::new(config.channels, Duration::from_millis(config.backoff_ms), sink)
    }

    pub fn channel_count(&self) -> usize {
        self.busy.len()
    }

    /// System narration → [`SYSTEM_CHANNEL`]; anyone else → a stable hash of
    /// the speaker name over the remaining channels.
    pub fn channel_for(&self, category: Category, speaker: &str) -> usize {
        if category == Category::System {
            return SYSTEM_CHANNEL;
        }
        let speakers = (self.busy.len() - 1) as u64;
        1 + (stable_hash(speaker) % speakers) as usize
    }

    pub fn is_busy(&self, channel: usize) -> bool {
        self.busy[channel].load(Ordering::Acquire)
    }

    /// Wait until `channel` is free, then claim it.
    pub async fn acquire(&self, channel: usize) -> ChannelGuard {
        let flag = &self.busy[channel];
        loop {
            if flag
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return ChannelGuard {
                    busy: Arc::clone(&self.busy),
                    channel,
                };
            }
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Claim `channel` (waiting while busy) and start playing `audio` on it.
    ///
    /// Returns once playback has *started*; the handle resolves when it ends.
    /// The channel is released when playback ends, whatever the outcome.
    pub async fn play(
        &self,
        channel: usize,
        audio: Vec<u8>,
    ) -> JoinHandle<Result<(), PlaybackError>> {
        let guard = self.acquire(channel).await;
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let result = sink.play(guard.channel(), audio);
            if let Err(e) = &result {
                log::error!("playback: channel {}: {e}", guard.channel());
            }
            drop(guard);
            result
        })
    }
}

/// Await a handle returned by [`PlaybackChannelPool::play`].
pub async fn finished(handle: JoinHandle<Result<(), PlaybackError>>) -> Result<(), PlaybackError> {
    handle
        .await
        .map_err(|e| PlaybackError::Join(e.to_string()))?
}

/// First eight bytes of SHA-256: stable across runs and platforms, unlike
/// `DefaultHasher`.
fn stable_hash(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Sleeps for a fixed time per utterance and records when it played.
    #[derive(Default)]
    struct RecordingSink {
        plays: Mutex<Vec<(usize, Instant, Instant)>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, channel: usize, _audio: Vec<u8>) -> Result<(), PlaybackError> {
            let start = Instant::now();
            std::thread::sleep(Duration::from_millis(60));
            self.plays
                .lock()
                .unwrap()
                .push((channel, start, Instant::now()));
            Ok(())
        }
    }

    struct BrokenSink;

    impl AudioSink for BrokenSink {
        fn play(&self, _: usize, _: Vec<u8>) -> Result<(), PlaybackError> {
            Err(PlaybackError::Decode("not audio".into()))
        }
    }

    fn pool(sink: Arc<dyn AudioSink>) -> PlaybackChannelPool {
        PlaybackChannelPool::new(4, Duration::from_millis(5), sink)
    }

    fn two_speakers_on_different_channels(pool: &PlaybackChannelPool) -> (String, String) {
        let first = "Positron".to_string();
        let ch = pool.channel_for(Category::Npc, &first);
        let second = (0..100)
            .map(|i| format!("Speaker {i}"))
            .find(|name| pool.channel_for(Category::Npc, name) != ch)
            .unwrap();
        (first, second)
    }

    #[test]
    fn system_uses_reserved_channel() {
        let p = pool(Arc::new(RecordingSink::default()));
        assert_eq!(p.channel_for(Category::System, "Narrator"), SYSTEM_CHANNEL);
    }

    #[test]
    fn speakers_never_land_on_reserved_channel() {
        let p = pool(Arc::new(RecordingSink::default()));
        for i in 0..200 {
            let ch = p.channel_for(Category::Player, &format!("Player {i}"));
            assert!((1..4).contains(&ch));
        }
    }

    #[test]
    fn routing_is_stable() {
        let a = pool(Arc::new(RecordingSink::default()));
        let b = pool(Arc::new(RecordingSink::default()));
        assert_eq!(
            a.channel_for(Category::Npc, "Positron"),
            b.channel_for(Category::Npc, "Positron")
        );
    }

    #[test]
    fn channel_count_is_clamped() {
        let p = PlaybackChannelPool::new(0, Duration::from_millis(5), Arc::new(RodioSink));
        assert_eq!(p.channel_count(), 2);
        assert_eq!(p.channel_for(Category::Npc, "anyone"), 1);
    }

    #[tokio::test]
    async fn same_speaker_never_overlaps() {
        let sink = Arc::new(RecordingSink::default());
        let p = pool(sink.clone());
        let ch = p.channel_for(Category::Npc, "Positron");

        let first = p.play(ch, vec![1]).await;
        assert!(p.is_busy(ch));
        let second = p.play(ch, vec![2]).await;
        finished(first).await.unwrap();
        finished(second).await.unwrap();

        let plays = sink.plays.lock().unwrap();
        assert_eq!(plays.len(), 2);
        let (_, _, first_end) = plays[0];
        let (_, second_start, _) = plays[1];
        assert!(second_start >= first_end);
        assert!(!p.is_busy(ch));
    }

    #[tokio::test]
    async fn different_speakers_overlap() {
        let sink = Arc::new(RecordingSink::default());
        let p = pool(sink.clone());
        let (a, b) = two_speakers_on_different_channels(&p);

        let first = p.play(p.channel_for(Category::Npc, &a), vec![1]).await;
        let second = p.play(p.channel_for(Category::Npc, &b), vec![2]).await;
        finished(first).await.unwrap();
        finished(second).await.unwrap();

        let plays = sink.plays.lock().unwrap();
        let (_, s0, e0) = plays[0];
        let (_, s1, e1) = plays[1];
        assert!(s0 < e1 && s1 < e0, "expected overlapping playback");
    }

    #[tokio::test]
    async fn failed_playback_releases_channel() {
        let p = pool(Arc::new(BrokenSink));
        let handle = p.play(1, vec![0]).await;
        assert!(matches!(
            finished(handle).await,
            Err(PlaybackError::Decode(_))
        ));
        assert!(!p.is_busy(1));
    }
}
