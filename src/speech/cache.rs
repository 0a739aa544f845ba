//! Rendered-audio cache on disk.
//!
//! ```text
//! <root>/<category>/<speaker>/<slug>-<hash>[-secondary].<ext>
//! ```
//!
//! The hash covers category, speaker and the canonical text, so lines that
//! differ only in punctuation or spacing share a file while different
//! utterances never do.  The slug only makes the tree browsable.  Writes go to a sibling
//! `.part` file which is renamed into place, so `lookup` never sees a
//! half-written render.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::classify::Category;

/// Max words / chars of the utterance kept in the file name.
const SLUG_WORDS: usize = 6;
const SLUG_CHARS: usize = 40;
/// Hex digits of the content hash kept in the file name.
const HASH_CHARS: usize = 16;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which provider slot produced a cached render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    Primary,
    Secondary,
}

impl Rank {
    fn suffix(self) -> &'static str {
        match self {
            Rank::Primary => "",
            Rank::Secondary => "-secondary",
        }
    }
}

/// Identity of one cacheable utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub category: Category,
    pub speaker: &'a str,
    pub text: &'a str,
}

impl<'a> CacheKey<'a> {
    pub fn new(category: Category, speaker: &'a str, text: &'a str) -> Self {
        Self {
            category,
            speaker,
            text,
        }
    }

    fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.category.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.speaker.as_bytes());
        hasher.update([0]);
        hasher.update(canonical_text(self.text).as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..HASH_CHARS].to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub path: PathBuf,
    pub rank: Rank,
}

// ---------------------------------------------------------------------------
// SpeechCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpeechCache {
    root: PathBuf,
    extension: String,
}

impl SpeechCache {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location for `key` at `rank`.  Does not touch the disk.
    pub fn path_for(&self, key: &CacheKey<'_>, rank: Rank) -> PathBuf {
        let file = format!(
            "{}-{}{}.{}",
            slug(key.text),
            key.hash(),
            rank.suffix(),
            self.extension
        );
        self.root
            .join(key.category.as_str())
            .join(sanitize(key.speaker))
            .join(file)
    }

    /// Existing render for `key`, primary before secondary.
    pub fn lookup(&self, key: &CacheKey<'_>) -> Option<CacheHit> {
        [Rank::Primary, Rank::Secondary]
            .into_iter()
            .map(|rank| CacheHit {
                path: self.path_for(key, rank),
                rank,
            })
            .find(|hit| hit.path.is_file())
    }

    /// Store `bytes` for `key` at `rank` and return the final path.
    pub fn put(&self, key: &CacheKey<'_>, rank: Rank, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key, rank);
        let io = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let mut part = path.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        std::fs::write(&part, bytes).map_err(io)?;
        if let Err(source) = std::fs::rename(&part, &path) {
            let _ = std::fs::remove_file(&part);
            return Err(io(source));
        }
        log::debug!("cache: stored {}", path.display());
        Ok(path)
    }
}

/// `text` with punctuation removed and whitespace runs collapsed to a single
/// space.  Case is kept.
pub fn canonical_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, hyphen-joined first words of `text`.
fn slug(text: &str) -> String {
    let mut out = String::new();
    for word in canonical_text(text).split(' ').take(SLUG_WORDS) {
        if word.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('-');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    if out.is_empty() {
        out.push_str("utterance");
    }
    out.chars().take(SLUG_CHARS).collect()
}

/// Speaker name as a single safe path component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(text: &str) -> CacheKey<'_> {
        CacheKey::new(Category::Npc, "Positron", text)
    }

    #[test]
    fn layout_is_category_speaker_slug_hash() {
        let cache = SpeechCache::new("/cache", "mp3");
        let path = cache.path_for(&key("Stay sharp, hero!"), Rank::Primary);
        let rel = path.strip_prefix("/cache").unwrap();
        let parts: Vec<_> = rel.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(parts[0], "npc");
        assert_eq!(parts[1], "Positron");
        assert!(parts[2].starts_with("stay-sharp-hero-"), "{}", parts[2]);
        assert!(parts[2].ends_with(".mp3"));
    }

    #[test]
    fn path_is_deterministic_and_rank_specific() {
        let cache = SpeechCache::new("/cache", "mp3");
        let k = key("Stay sharp");
        assert_eq!(
            cache.path_for(&k, Rank::Primary),
            cache.path_for(&k, Rank::Primary)
        );
        let secondary = cache.path_for(&k, Rank::Secondary);
        assert!(secondary.to_string_lossy().ends_with("-secondary.mp3"));
        assert_ne!(cache.path_for(&k, Rank::Primary), secondary);
    }

    #[test]
    fn different_speakers_never_collide() {
        let cache = SpeechCache::new("/cache", "mp3");
        let a = CacheKey::new(Category::Npc, "Positron", "hi");
        let b = CacheKey::new(Category::Npc, "Synapse", "hi");
        let c = CacheKey::new(Category::Player, "Positron", "hi");
        assert_ne!(cache.path_for(&a, Rank::Primary), cache.path_for(&b, Rank::Primary));
        assert_ne!(cache.path_for(&a, Rank::Primary), cache.path_for(&c, Rank::Primary));
    }

    #[test]
    fn put_then_lookup_returns_same_bytes() {
        let dir = tempdir().unwrap();
        let cache = SpeechCache::new(dir.path(), "mp3");
        let k = key("Stay sharp");
        assert_eq!(cache.lookup(&k), None);

        let path = cache.put(&k, Rank::Primary, b"ID3audio").unwrap();
        let hit = cache.lookup(&k).unwrap();
        assert_eq!(hit.rank, Rank::Primary);
        assert_eq!(hit.path, path);
        assert_eq!(std::fs::read(&hit.path).unwrap(), b"ID3audio");
    }

    #[test]
    fn primary_preferred_over_secondary() {
        let dir = tempdir().unwrap();
        let cache = SpeechCache::new(dir.path(), "mp3");
        let k = key("Stay sharp");

        cache.put(&k, Rank::Secondary, b"backup").unwrap();
        assert_eq!(cache.lookup(&k).unwrap().rank, Rank::Secondary);

        cache.put(&k, Rank::Primary, b"best").unwrap();
        assert_eq!(cache.lookup(&k).unwrap().rank, Rank::Primary);
    }

    #[test]
    fn no_part_files_left_behind() {
        let dir = tempdir().unwrap();
        let cache = SpeechCache::new(dir.path(), "mp3");
        let path = cache.put(&key("Stay sharp"), Rank::Primary, b"x").unwrap();
        let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|e| e.file_name())
            .collect();
        assert_eq!(siblings.len(), 1);
    }

    #[test]
    fn hostile_speaker_names_stay_inside_root() {
        let cache = SpeechCache::new("/cache", "mp3");
        let k = CacheKey::new(Category::Player, "../../etc", "hi");
        let path = cache.path_for(&k, Rank::Primary);
        assert!(path.starts_with("/cache/player"));
        assert_eq!(path.components().count(), "/cache/player/x/file".split('/').count());
    }

    #[test]
    fn slug_of_punctuation_only_text() {
        assert_eq!(slug("..."), "utterance");
        assert_eq!(
            slug("Hello, World! How are you today friend?"),
            "hello-world-how-are-you-today"
        );
    }

    #[test]
    fn canonical_text_drops_punctuation_and_extra_spaces() {
        assert_eq!(canonical_text("  Stay   sharp, hero!  "), "Stay sharp hero");
        assert_eq!(canonical_text("Stay\tsharp..."), "Stay sharp");
        assert_eq!(canonical_text("?!"), "");
    }

    #[test]
    fn cosmetic_variants_share_one_entry() {
        let dir = tempdir().unwrap();
        let cache = SpeechCache::new(dir.path(), "mp3");
        let path = cache
            .put(&key("Hello there"), Rank::Primary, b"audio")
            .unwrap();

        for variant in ["Hello  there", "Hello there!", " Hello, there. ", "Hello\tthere?"] {
            let hit = cache.lookup(&key(variant));
            assert_eq!(hit.map(|h| h.path), Some(path.clone()), "{variant:?}");
        }
        assert_eq!(cache.lookup(&key("Hello where")), None);
    }
}
