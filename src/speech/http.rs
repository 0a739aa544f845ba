//! [`HttpVoiceRenderer`]: a provider reached over HTTP.
//!
//! `POST <base_url>` with a JSON body, audio bytes back:
//!
//! ```json
//! { "text": "Stay sharp", "voice": "Positron", "category": "npc",
//!   "effects": ["robot"], "attributes": { "gender": "male" } }
//! ```
//!
//! | Status        | Result                              |
//! |---------------|-------------------------------------|
//! | 2xx, non-empty| `Rendered(body)`                    |
//! | 401, 403      | `NeedsFallback(AuthFailed)`         |
//! | 402, 429      | `NeedsFallback(QuotaExceeded)`      |
//! | anything else | `Failed(…)`                         |

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::store::Character;

use super::renderer::{FallbackReason, RenderResult, VoiceRenderer};

pub struct HttpVoiceRenderer {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpVoiceRenderer {
    /// Requests wait as long as the provider takes unless
    /// `config.timeout_secs` is set.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

/// Statuses that mean "this provider is done for the session".
pub(crate) fn fallback_for_status(status: u16) -> Option<FallbackReason> {
    match status {
        401 | 403 => Some(FallbackReason::AuthFailed),
        402 | 429 => Some(FallbackReason::QuotaExceeded),
        _ => None,
    }
}

#[async_trait]
impl VoiceRenderer for HttpVoiceRenderer {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn render(&self, character: &Character, text: &str, effects: &[String]) -> RenderResult {
        let body = serde_json::json!({
            "text":       text,
            "voice":      character.name,
            "category":   character.category,
            "effects":    effects,
            "attributes": character.attributes,
        });

        let mut req = self.client.post(&self.config.base_url).json(&body);

        // Local engines take no key.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return RenderResult::Failed(format!("{}: request timed out", self.config.id))
            }
            Err(e) => return RenderResult::Failed(format!("{}: {e}", self.config.id)),
        };

        let status = response.status();
        if let Some(reason) = fallback_for_status(status.as_u16()) {
            log::warn!("{}: {reason} (HTTP {status})", self.config.id);
            return RenderResult::NeedsFallback(reason);
        }
        if !status.is_success() {
            return RenderResult::Failed(format!("{}: HTTP {status}", self.config.id));
        }

        match response.bytes().await {
            Ok(bytes) if bytes.is_empty() => {
                RenderResult::Failed(format!("{}: empty audio response", self.config.id))
            }
            Ok(bytes) => RenderResult::Rendered(bytes.to_vec()),
            Err(e) => RenderResult::Failed(format!("{}: {e}", self.config.id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
