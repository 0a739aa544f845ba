//! Synthesis dispatcher: drives SpeechEvent → cache / render → playback.
//!
//! [`SynthesisDispatcher`] is the sole consumer of the speech queue.  One
//! utterance is handled at a time; playback is started and left running so
//! the next utterance can proceed on another channel.
//!
//! # Flow
//!
//! ```text
//! SpeechEvent
//!   └─▶ resolve character + phrase (stores)                 [CacheCheck]
//!         ├─ cache hit (primary, then secondary) ─▶ play     [Playing]
//!         └─ miss ─▶ primary provider                        [Rendering]
//!               ├─ Rendered      ─▶ cache(primary)   ─▶ play
//!               ├─ NeedsFallback ─▶ degrade primary ─▶ secondary
//!               │     ├─ Rendered ─▶ cache(secondary) ─▶ play
//!               │     └─ else     ─▶ drop
//!               └─ Failed        ─▶ drop
//! ```
//!
//! A primary already in the [`EngineOverrideSet`] is never called again;
//! the secondary is used straight away.
//!
//! Store calls are file-backed and run on the blocking pool.

use std::sync::{Arc, MutexGuard};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::classify::{Category, SpeechEvent};
use crate::store::{Character, CharacterStore, PhraseStore, StoreError, Translated};

use super::cache::{CacheError, CacheKey, Rank, SpeechCache};
use super::overrides::EngineOverrideSet;
use super::playback::{PlaybackChannelPool, PlaybackError};
use super::renderer::{FallbackReason, ProviderRegistry, RenderResult, VoiceRenderer};
use super::state::{
    new_shared_status, DispatchState, DispatchStats, DispatchStatus, SharedDispatchStatus,
};

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Why an utterance was dropped.  Never fatal to the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A provider failed for a reason other than quota or auth.
    #[error("provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// A character names a provider that is not configured.
    #[error("unknown provider {0:?}")]
    UnknownProvider(String),

    /// The secondary also asked for a fallback; there is nowhere left to go.
    #[error("secondary provider {provider} unusable: {reason}")]
    FallbackExhausted {
        provider: String,
        reason: FallbackReason,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// A blocking store task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Dispatched
// ---------------------------------------------------------------------------

/// Where the audio for an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    Cached(Rank),
    Rendered(Rank),
}

/// A successfully started utterance.
#[derive(Debug)]
pub struct Dispatched {
    pub channel: usize,
    pub source: AudioSource,
    /// Resolves when playback ends.
    pub playback: JoinHandle<Result<(), PlaybackError>>,
}

// ---------------------------------------------------------------------------
// SynthesisDispatcher
// ---------------------------------------------------------------------------

pub struct SynthesisDispatcher {
    phrases: Arc<dyn PhraseStore>,
    characters: Arc<dyn CharacterStore>,
    cache: SpeechCache,
    providers: ProviderRegistry,
    pool: PlaybackChannelPool,
    overrides: EngineOverrideSet,
    /// Speaker name used for events without one.
    narrator: String,
    status: SharedDispatchStatus,
}

impl SynthesisDispatcher {
    pub fn new(
        phrases: Arc<dyn PhraseStore>,
        characters: Arc<dyn CharacterStore>,
        cache: SpeechCache,
        providers: ProviderRegistry,
        pool: PlaybackChannelPool,
        narrator: impl Into<String>,
    ) -> Self {
        Self {
            phrases,
            characters,
            cache,
            providers,
            pool,
            overrides: EngineOverrideSet::new(),
            narrator: narrator.into(),
            status: new_shared_status(),
        }
    }

    /// Handle for reading state and counters from elsewhere.
    pub fn status(&self) -> SharedDispatchStatus {
        Arc::clone(&self.status)
    }

    pub fn stats(&self) -> DispatchStats {
        self.lock_status().stats
    }

    pub fn overrides(&self) -> &EngineOverrideSet {
        &self.overrides
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Consume `rx` until every sender is dropped.  Returns the final
    /// counters.
    pub async fn run(mut self, mut rx: UnboundedReceiver<SpeechEvent>) -> DispatchStats {
        log::info!(
            "dispatcher: started with providers {:?}, {} playback channels",
            self.providers,
            self.pool.channel_count()
        );

        while let Some(event) = rx.recv().await {
            let speaker = event.speaker.clone();
            if let Err(e) = self.handle(event).await {
                log::error!(
                    "dispatcher: dropped utterance from {}: {e}",
                    speaker.as_deref().unwrap_or(&self.narrator)
                );
                let mut status = self.lock_status();
                status.stats.dropped += 1;
                status.last_error = Some(e.to_string());
            }
            self.set_state(DispatchState::Idle);
        }

        let stats = self.stats();
        log::info!("dispatcher: queue closed, {stats:?}");
        stats
    }

    /// Take one utterance from lookup to started playback.
    pub async fn handle(&mut self, event: SpeechEvent) -> Result<Dispatched, DispatchError> {
        self.set_state(DispatchState::CacheCheck);
        self.lock_status().stats.received += 1;

        let speaker = event.speaker.unwrap_or_else(|| self.narrator.clone());
        let category = event.category;

        let (character, translated) = self.resolve(&speaker, category, event.text).await?;

        let key = CacheKey::new(category, &speaker, &translated.text);
        let (audio, source) = match self.cache.lookup(&key) {
            Some(hit) => {
                let bytes = tokio::fs::read(&hit.path).await.map_err(|source| CacheError::Io {
                    path: hit.path.clone(),
                    source,
                })?;
                log::debug!("dispatcher: cache hit {}", hit.path.display());
                self.lock_status().stats.cache_hits += 1;
                (bytes, AudioSource::Cached(hit.rank))
            }
            None => {
                self.set_state(DispatchState::Rendering);
                let (rank, bytes) = self.render(&character, &translated.text).await?;
                if let Err(e) = self.cache.put(&key, rank, &bytes) {
                    log::warn!("dispatcher: could not cache render, playing anyway: {e}");
                }
                (bytes, AudioSource::Rendered(rank))
            }
        };

        self.set_state(DispatchState::Playing);
        let channel = self.pool.channel_for(category, &speaker);
        let playback = self.pool.play(channel, audio).await;
        self.lock_status().stats.played += 1;

        let characters = Arc::clone(&self.characters);
        let id = character.id;
        match tokio::task::spawn_blocking(move || characters.record_last_spoke(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("dispatcher: could not record last spoke for {speaker}: {e}")
            }
            Err(e) => log::warn!("dispatcher: last-spoke task failed for {speaker}: {e}"),
        }

        Ok(Dispatched {
            channel,
            source,
            playback,
        })
    }

    /// Character record and the text to speak, from the stores.
    async fn resolve(
        &self,
        speaker: &str,
        category: Category,
        text: String,
    ) -> Result<(Character, Translated), DispatchError> {
        let phrases = Arc::clone(&self.phrases);
        let characters = Arc::clone(&self.characters);
        let speaker = speaker.to_string();

        let resolved = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
            let character = characters.get_or_create_character(&speaker, category)?;
            let phrase = phrases.get_or_create_phrase_id(&speaker, category, &text)?;
            let translated = phrases.get_translated(phrase)?;
            if translated.was_translated {
                log::debug!("dispatcher: {phrase} translated");
            }
            Ok((character, translated))
        })
        .await
        .map_err(|e| DispatchError::Internal(e.to_string()))??;
        Ok(resolved)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    async fn render(
        &mut self,
        character: &Character,
        text: &str,
    ) -> Result<(Rank, Vec<u8>), DispatchError> {
        let primary_id = character.primary_provider.as_str();

        if self.overrides.is_degraded(primary_id) {
            log::debug!(
                "dispatcher: {primary_id} degraded, using secondary for {}",
                character.name
            );
        } else {
            let primary = self.provider(primary_id)?;
            match primary.render(character, text, &character.effects).await {
                RenderResult::Rendered(bytes) => {
                    self.lock_status().stats.primary_renders += 1;
                    return Ok((Rank::Primary, bytes));
                }
                RenderResult::NeedsFallback(reason) => {
                    self.lock_status().stats.fallbacks += 1;
                    self.overrides.degrade(primary_id, reason);
                }
                RenderResult::Failed(message) => {
                    return Err(DispatchError::Provider {
                        provider: primary_id.to_string(),
                        message,
                    });
                }
            }
        }

        let secondary_id = character.secondary_provider.as_str();
        let secondary = self.provider(secondary_id)?;
        match secondary.render(character, text, &character.effects).await {
            RenderResult::Rendered(bytes) => {
                self.lock_status().stats.secondary_renders += 1;
                Ok((Rank::Secondary, bytes))
            }
            RenderResult::NeedsFallback(reason) => {
                self.overrides.degrade(secondary_id, reason);
                Err(DispatchError::FallbackExhausted {
                    provider: secondary_id.to_string(),
                    reason,
                })
            }
            RenderResult::Failed(message) => Err(DispatchError::Provider {
                provider: secondary_id.to_string(),
                message,
            }),
        }
    }

    fn provider(&self, id: &str) -> Result<Arc<dyn VoiceRenderer>, DispatchError> {
        self.providers
            .get(id)
            .ok_or_else(|| DispatchError::UnknownProvider(id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    fn lock_status(&self) -> MutexGuard<'_, DispatchStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: DispatchState) {
        let mut status = self.lock_status();
        if status.state != state {
            log::trace!("dispatcher: {} -> {}", status.state.label(), state.label());
            status.state = state;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
