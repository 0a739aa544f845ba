//! Providers degraded to their secondary for the rest of the process.

use std::collections::HashMap;

use super::renderer::FallbackReason;

/// Provider id → reason it was degraded.
///
/// Grows monotonically: there is no way to un-degrade a provider short of
/// restarting the process.  Owned by the dispatcher task.
#[derive(Debug, Default, Clone)]
pub struct EngineOverrideSet {
    degraded: HashMap<String, FallbackReason>,
}

impl EngineOverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `provider` as degraded.  Returns `true` the first time; later
    /// calls keep the original reason.
    pub fn degrade(&mut self, provider: &str, reason: FallbackReason) -> bool {
        if self.degraded.contains_key(provider) {
            return false;
        }
        log::warn!("provider {provider} degraded to secondary for this session: {reason}");
        self.degraded.insert(provider.to_string(), reason);
        true
    }

    pub fn is_degraded(&self, provider: &str) -> bool {
        self.degraded.contains_key(provider)
    }

    pub fn reason(&self, provider: &str) -> Option<FallbackReason> {
        self.degraded.get(provider).copied()
    }

    pub fn len(&self) -> usize {
        self.degraded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degraded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_sticks() {
        let mut set = EngineOverrideSet::new();
        assert!(!set.is_degraded("p"));
        assert!(set.degrade("p", FallbackReason::QuotaExceeded));
        assert!(!set.degrade("p", FallbackReason::AuthFailed));
        assert_eq!(set.reason("p"), Some(FallbackReason::QuotaExceeded));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn providers_are_independent() {
        let mut set = EngineOverrideSet::new();
        set.degrade("p", FallbackReason::AuthFailed);
        assert!(set.is_degraded("p"));
        assert!(!set.is_degraded("s"));
    }
}
