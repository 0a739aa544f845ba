//! [`VoiceRenderer`] trait, its [`RenderResult`] and the [`ProviderRegistry`]
//! the dispatcher resolves provider ids through.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::store::Character;

use super::http::HttpVoiceRenderer;

// ---------------------------------------------------------------------------
// RenderResult
// ---------------------------------------------------------------------------

/// Why a provider asks for the secondary to take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    QuotaExceeded,
    AuthFailed,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FallbackReason::QuotaExceeded => "quota exceeded",
            FallbackReason::AuthFailed => "authentication failed",
        })
    }
}

/// Outcome of one render call.
///
/// Providers never raise: transport errors, bad responses and timeouts all
/// come back as `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Encoded audio, ready for the cache and the decoder.
    Rendered(Vec<u8>),
    /// The provider is unusable for the rest of the session.
    NeedsFallback(FallbackReason),
    /// This utterance could not be rendered.
    Failed(String),
}

// ---------------------------------------------------------------------------
// VoiceRenderer
// ---------------------------------------------------------------------------

/// A speech synthesis provider.
///
/// Implementors must be `Send + Sync`; the dispatcher holds them as
/// `Arc<dyn VoiceRenderer>`.
#[async_trait]
pub trait VoiceRenderer: Send + Sync {
    /// Stable provider id, matched against `Character::primary_provider` and
    /// `Character::secondary_provider`.
    fn id(&self) -> &str;

    async fn render(&self, character: &Character, text: &str, effects: &[String]) -> RenderResult;
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Provider id → renderer.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn VoiceRenderer>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`HttpVoiceRenderer`] per configured provider.
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        let mut registry = Self::new();
        for cfg in providers {
            registry.register(Arc::new(HttpVoiceRenderer::from_config(cfg)));
        }
        registry
    }

    /// Add or replace the renderer under its own id.
    pub fn register(&mut self, renderer: Arc<dyn VoiceRenderer>) {
        let id = renderer.id().to_string();
        if self.providers.insert(id.clone(), renderer).is_some() {
            log::warn!("provider {id} registered twice, keeping the latest");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn VoiceRenderer>> {
        self.providers.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl VoiceRenderer for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        async fn render(&self, _: &Character, text: &str, _: &[String]) -> RenderResult {
            RenderResult::Rendered(text.as_bytes().to_vec())
        }
    }

    #[test]
    fn registry_resolves_by_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Fixed("a")));
        registry.register(Arc::new(Fixed("b")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().id(), "a");
        assert!(registry.get("c").is_none());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn from_config_registers_every_provider() {
        let providers = crate::config::AppConfig::default().providers;
        let registry = ProviderRegistry::from_config(&providers);
        assert!(registry.get("primary").is_some());
        assert!(registry.get("secondary").is_some());
    }

    #[test]
    fn renderer_is_object_safe() {
        let _: Arc<dyn VoiceRenderer> = Arc::new(Fixed("x"));
    }
}
