//! Dispatcher state machine and the status snapshot callers can read.
//!
//! [`DispatchState`] is the phase the dispatcher is in for the utterance it
//! is handling.  [`DispatchStatus`] bundles it with running counters and the
//! last error; [`SharedDispatchStatus`] is the `Arc<Mutex<_>>` handle the
//! dispatcher updates and anyone else may read.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// DispatchState
// ---------------------------------------------------------------------------

/// Phases of handling one utterance.
///
/// ```text
/// Idle ──dequeue──▶ CacheCheck ──hit──▶ Playing ──▶ Idle
///                              ──miss─▶ Rendering ──ok──▶ Playing ──▶ Idle
///                                                 ──err─▶ Idle (dropped)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Waiting on the speech queue.
    #[default]
    Idle,
    /// Looking for a primary or secondary render on disk.
    CacheCheck,
    /// A provider call is in flight.
    Rendering,
    /// Waiting for, or holding, a playback channel.
    Playing,
}

impl DispatchState {
    /// `true` while an utterance is being handled.
    ///
    /// ```
    /// use log_voices::speech::DispatchState;
    ///
    /// assert!(!DispatchState::Idle.is_busy());
    /// assert!(DispatchState::CacheCheck.is_busy());
    /// assert!(DispatchState::Rendering.is_busy());
    /// assert!(DispatchState::Playing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, DispatchState::Idle)
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchState::Idle => "Idle",
            DispatchState::CacheCheck => "Cache check",
            DispatchState::Rendering => "Rendering",
            DispatchState::Playing => "Playing",
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchStats
// ---------------------------------------------------------------------------

/// Running totals since the dispatcher started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Utterances taken off the queue.
    pub received: u64,
    pub cache_hits: u64,
    pub primary_renders: u64,
    pub secondary_renders: u64,
    /// Primary calls that answered `NeedsFallback`.
    pub fallbacks: u64,
    /// Utterances abandoned after an error.
    pub dropped: u64,
    pub played: u64,
}

// ---------------------------------------------------------------------------
// DispatchStatus / SharedDispatchStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DispatchStatus {
    pub state: DispatchState,
    pub stats: DispatchStats,
    /// Message of the most recent dropped utterance.
    pub last_error: Option<String>,
}

/// Cheap to clone.  Hold the lock only briefly, never across `.await`.
pub type SharedDispatchStatus = Arc<Mutex<DispatchStatus>>;

pub fn new_shared_status() -> SharedDispatchStatus {
    Arc::new(Mutex::new(DispatchStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(DispatchState::default(), DispatchState::Idle);
        assert!(!DispatchState::default().is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(DispatchState::CacheCheck.label(), "Cache check");
        assert_eq!(DispatchState::Rendering.label(), "Rendering");
        assert_eq!(DispatchState::Playing.label(), "Playing");
    }

    #[test]
    fn shared_status_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedDispatchStatus>();
    }

    #[test]
    fn shared_status_can_be_cloned_and_mutated() {
        let status = new_shared_status();
        let other = Arc::clone(&status);
        status.lock().unwrap().stats.cache_hits += 1;
        assert_eq!(other.lock().unwrap().stats.cache_hits, 1);
    }
}
