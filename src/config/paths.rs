//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\log-voices\
//!   macOS:   ~/Library/Application Support/log-voices/
//!   Linux:   ~/.config/log-voices/
//!
//! Data dir (character / phrase store):
//!   Windows: %LOCALAPPDATA%\log-voices\
//!   macOS:   ~/Library/Application Support/log-voices/
//!   Linux:   ~/.local/share/log-voices/
//!
//! Cache dir (rendered audio):
//!   Windows: %LOCALAPPDATA%\log-voices\
//!   macOS:   ~/Library/Caches/log-voices/
//!   Linux:   ~/.cache/log-voices/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `store.json` (characters, phrases, translations).
    pub store_file: PathBuf,
    /// Root of the rendered-audio cache.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "log-voices";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME)
            .join("speech");

        let settings_file = config_dir.join("settings.toml");
        let store_file = data_dir.join("store.json");

        Self {
            config_dir,
            settings_file,
            store_file,
            cache_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.cache_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .store_file
            .file_name()
            .is_some_and(|n| n == "store.json"));
        assert!(paths.cache_dir.ends_with("speech"));
    }
}
