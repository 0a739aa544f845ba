//! Speech output: everything between a [`SpeechEvent`] and the speakers.
//!
//! This module provides:
//! * [`SpeechCache`]: rendered audio on disk, keyed by category/speaker/text.
//! * [`VoiceRenderer`] / [`ProviderRegistry`]: pluggable synthesis providers,
//!   with [`HttpVoiceRenderer`] as the stock implementation.
//! * [`EngineOverrideSet`]: providers degraded for the session.
//! * [`PlaybackChannelPool`]: per-speaker playback channels over an
//!   [`AudioSink`] ([`RodioSink`] by default).
//! * [`SynthesisDispatcher`]: the consumer loop tying them together.
//!
//! [`SpeechEvent`]: crate::classify::SpeechEvent

pub mod cache;
pub mod dispatcher;
pub mod http;
pub mod overrides;
pub mod playback;
pub mod renderer;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cache::{canonical_text, CacheError, CacheHit, CacheKey, Rank, SpeechCache};
pub use dispatcher::{AudioSource, DispatchError, Dispatched, SynthesisDispatcher};
pub use http::HttpVoiceRenderer;
pub use overrides::EngineOverrideSet;
pub use playback::{AudioSink, PlaybackChannelPool, PlaybackError, RodioSink, SYSTEM_CHANNEL};
pub use renderer::{FallbackReason, ProviderRegistry, RenderResult, VoiceRenderer};
pub use state::{DispatchState, DispatchStats, DispatchStatus, SharedDispatchStatus};
