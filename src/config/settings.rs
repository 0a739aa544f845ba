//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::classify::{default_channels, ChannelConfig};

// ---------------------------------------------------------------------------
// TailMode
// ---------------------------------------------------------------------------

/// Where the tailer starts reading the active log file.
///
/// | Variant | Start position | Use                               |
/// |---------|----------------|-----------------------------------|
/// | Live    | end of file    | normal play: only new activity   |
/// | Replay  | start of file  | diagnostics / regression runs     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TailMode {
    Live,
    Replay,
}

impl Default for TailMode {
    fn default() -> Self {
        Self::Live
    }
}

// ---------------------------------------------------------------------------
// TailerConfig
// ---------------------------------------------------------------------------

/// Settings for log discovery and the read loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailerConfig {
    /// Directory holding the game's chat logs.  `None` until configured (or
    /// passed with `--log-dir`).
    pub log_dir: Option<PathBuf>,
    /// Extension of log files, without the dot.
    pub extension: String,
    /// Initial read position.
    pub mode: TailMode,
    /// Sleep between read passes.  Values below 10 ms are raised to 10.
    pub poll_interval_ms: u64,
    /// How often to look for a newer log file (new game session).
    pub rotation_check_secs: u64,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            extension: "txt".into(),
            mode: TailMode::default(),
            poll_interval_ms: 250,
            rotation_check_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// What gets vocalised, and how narration is voiced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak beneficial effects ("You are hasted").
    pub speak_buffs: bool,
    /// Speak control effects ("You are held!").
    pub speak_debuffs: bool,
    /// Speak badge announcements.
    pub speak_badges: bool,
    /// Speak level-up announcements.
    pub speak_level_ups: bool,
    /// Speak "<power> is recharged".
    pub speak_recharges: bool,
    /// Character used for utterances that have no speaker.
    pub narrator: String,
    /// Locale phrases are spoken in.
    pub locale: String,
    /// Locale the game writes its log in.
    pub source_locale: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            speak_buffs: false,
            speak_debuffs: true,
            speak_badges: true,
            speak_level_ups: true,
            speak_recharges: false,
            narrator: "Narrator".into(),
            locale: "en".into(),
            source_locale: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Audio output channel pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Total channels, including the reserved narration channel 0.
    /// Must be at least 2.
    pub channels: usize,
    /// Poll interval while waiting for a busy channel.
    pub backoff_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            backoff_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Rendered-audio cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Override for the cache root.  `None` → `AppPaths::cache_dir`.
    pub dir: Option<PathBuf>,
    /// Extension of cached audio files (matches what providers return).
    pub extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            extension: "mp3".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceDefaults
// ---------------------------------------------------------------------------

/// Providers assigned to characters the store has never seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceDefaults {
    pub primary_provider: String,
    pub secondary_provider: String,
}

impl Default for VoiceDefaults {
    fn default() -> Self {
        Self {
            primary_provider: "primary".into(),
            secondary_provider: "secondary".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// One HTTP speech-synthesis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier characters refer to (`primary_provider = "…"`).
    pub id: String,
    /// Endpoint receiving `POST {text, voice, effects}`.
    pub base_url: String,
    /// Bearer token: `None` for local engines.
    pub api_key: Option<String>,
    /// Client-side cap on a render, in seconds.  Unset by default: the
    /// provider decides how long a render may take.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "primary".into(),
            base_url: "http://localhost:5002/api/tts".into(),
            api_key: None,
            timeout_secs: None,
        },
        ProviderConfig {
            id: "secondary".into(),
            base_url: "http://localhost:5003/api/tts".into(),
            api_key: None,
            timeout_secs: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use log_voices::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log discovery / read loop.
    pub tailer: TailerConfig,
    /// Speech toggles and narration.
    pub speech: SpeechConfig,
    /// Channel tag table.
    pub channels: BTreeMap<String, ChannelConfig>,
    /// Output channel pool.
    pub playback: PlaybackConfig,
    /// Rendered-audio cache.
    pub cache: CacheConfig,
    /// Providers for newly created characters.
    pub defaults: VoiceDefaults,
    /// Configured synthesis endpoints.
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tailer: TailerConfig::default(),
            speech: SpeechConfig::default(),
            channels: default_channels(),
            playback: PlaybackConfig::default(),
            cache: CacheConfig::default(),
            defaults: VoiceDefaults::default(),
            providers: default_providers(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Cache root: the configured override or the platform default.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().cache_dir)
    }

    /// Provider definition by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
