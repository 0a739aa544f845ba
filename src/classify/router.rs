//! Channel routing: maps a bracketed log channel tag to its parser and
//! output category.
//!
//! The table is plain data held in [`AppConfig`](crate::config::AppConfig) so
//! channels can be enabled, disabled or added without touching the
//! classifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::event::Category;

// ---------------------------------------------------------------------------
// ParserKind
// ---------------------------------------------------------------------------

/// Which sub-parser handles a channel's body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// `Speaker: text`
    Direct,
    /// `[Tell]`: inbound `Name: text` or outbound `-->Name: text`.
    PrivateMessage,
    /// `[Caption]`: speaker inferred from color memory / intro phrases.
    Caption,
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// One row of the channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Disabled channels are recognised but produce no events.
    pub enabled: bool,
    pub category: Category,
    pub parser: ParserKind,
}

impl ChannelConfig {
    const fn new(enabled: bool, category: Category, parser: ParserKind) -> Self {
        Self {
            enabled,
            category,
            parser,
        }
    }
}

/// Built-in channel table used when `settings.toml` does not override it.
pub fn default_channels() -> BTreeMap<String, ChannelConfig> {
    use Category::*;
    use ParserKind::*;

    [
        ("NPC", ChannelConfig::new(true, Npc, Direct)),
        ("Team", ChannelConfig::new(true, Player, Direct)),
        ("Tell", ChannelConfig::new(true, Player, PrivateMessage)),
        ("Caption", ChannelConfig::new(true, Npc, Caption)),
        ("Local", ChannelConfig::new(false, Player, Direct)),
        ("Broadcast", ChannelConfig::new(false, Player, Direct)),
        ("League", ChannelConfig::new(false, Player, Direct)),
    ]
    .into_iter()
    .map(|(tag, cfg)| (tag.to_string(), cfg))
    .collect()
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Outcome of looking a tag up in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Dispatch(&'a ChannelConfig),
    Disabled,
    Unknown,
}

// ---------------------------------------------------------------------------
// ChannelRouter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelRouter {
    channels: BTreeMap<String, ChannelConfig>,
}

impl ChannelRouter {
    pub fn new(channels: BTreeMap<String, ChannelConfig>) -> Self {
        Self { channels }
    }

    /// Look up `tag` (without brackets).
    pub fn route(&self, tag: &str) -> Route<'_> {
        match self.channels.get(tag) {
            Some(cfg) if cfg.enabled => Route::Dispatch(cfg),
            Some(_) => Route::Disabled,
            None => Route::Unknown,
        }
    }

    /// Split `[Tag] body` into `("Tag", "body")`.
    ///
    /// Tags may contain spaces (`[Looking For Group]`).  Returns `None` when
    /// `rest` does not open with a complete bracket pair.
    pub fn split_tag(rest: &str) -> Option<(&str, &str)> {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let tag = inner[..close].trim();
        if tag.is_empty() {
            return None;
        }
        Some((tag, inner[close + 1..].trim_start()))
    }
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new(default_channels())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
