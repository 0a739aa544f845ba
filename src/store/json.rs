//! [`JsonStore`]: phrases and characters in a single JSON document.
//!
//! The whole document is held in memory behind a mutex.  New phrases,
//! characters and attributes are written through immediately; `last_spoke`
//! timestamps only mark the document dirty and ride along with the next
//! write or an explicit [`JsonStore::flush`].
//!
//! Writes go to a sibling `.part` file that is renamed over the document, so
//! an interrupted write leaves the previous version intact.
//!
//! ```json
//! {
//!   "next_phrase": 3,
//!   "next_character": 2,
//!   "phrases": [ { "id": 1, "speaker": "Positron", "category": "npc",
//!                  "text": "Stay sharp", "translations": { "fr": "…" } } ],
//!   "characters": [ { "id": 1, "name": "Positron", … } ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::config::VoiceDefaults;

use super::{
    Character, CharacterId, CharacterStore, PhraseId, PhraseStore, StoreError, Translated,
};

// ---------------------------------------------------------------------------
// On-disk document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhraseRecord {
    id: PhraseId,
    speaker: String,
    category: Category,
    text: String,
    /// locale → translated text
    #[serde(default)]
    translations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    next_phrase: u64,
    #[serde(default)]
    next_character: u64,
    #[serde(default)]
    phrases: Vec<PhraseRecord>,
    #[serde(default)]
    characters: Vec<Character>,
}

impl Document {
    fn phrase_id(&mut self) -> PhraseId {
        self.next_phrase += 1;
        PhraseId(self.next_phrase)
    }

    fn character_id(&mut self) -> CharacterId {
        self.next_character += 1;
        CharacterId(self.next_character)
    }
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

pub struct JsonStore {
    path: PathBuf,
    defaults: VoiceDefaults,
    /// Locale utterances are spoken in.
    locale: String,
    /// Locale the game log is written in.
    source_locale: String,
    doc: Mutex<Document>,
    /// Set by changes not yet written to disk.
    dirty: AtomicBool,
}

impl JsonStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, defaults: VoiceDefaults) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            Document::default()
        };
        log::debug!("store: opened {}", path.display());
        Ok(Self {
            path,
            defaults,
            locale: "en".to_string(),
            source_locale: "en".to_string(),
            doc: Mutex::new(doc),
            dirty: AtomicBool::new(false),
        })
    }

    /// Builder: speak in `locale`, treating `source_locale` as untranslated.
    pub fn with_locales(
        mut self,
        locale: impl Into<String>,
        source_locale: impl Into<String>,
    ) -> Self {
        self.locale = locale.into();
        self.source_locale = source_locale.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a translation of phrase `id` into `locale`.
    pub fn set_translation(
        &self,
        id: PhraseId,
        locale: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut doc = self.lock();
        let record = doc
            .phrases
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownPhrase(id))?;
        record.translations.insert(locale.to_string(), text.to_string());
        self.persist(&doc)
    }

    /// Character by name, across categories.
    pub fn character_named(&self, name: &str) -> Option<Character> {
        self.lock().characters.iter().find(|c| c.name == name).cloned()
    }

    /// Write pending changes, if any.
    pub fn flush(&self) -> Result<(), StoreError> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        let doc = self.lock();
        self.persist(&doc)
    }

    /// Whether changes are waiting for [`flush`](Self::flush).
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Document> {
        // A panic while holding the lock cannot leave the document half
        // written in a way later readers care about.
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        // Anything that fails below leaves the change pending for a retry.
        self.dirty.store(true, Ordering::Release);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(doc)?;

        let mut part = self.path.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        std::fs::write(&part, data)?;
        if let Err(e) = std::fs::rename(&part, &self.path) {
            let _ = std::fs::remove_file(&part);
            return Err(e.into());
        }
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    fn new_character(&self, doc: &mut Document, name: &str, category: Category) -> Character {
        Character {
            id: doc.character_id(),
            name: name.to_string(),
            category,
            primary_provider: self.defaults.primary_provider.clone(),
            secondary_provider: self.defaults.secondary_provider.clone(),
            effects: Vec::new(),
            attributes: BTreeMap::new(),
            last_spoke: None,
        }
    }
}

impl Drop for JsonStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("store: could not save {}: {e}", self.path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// PhraseStore
// ---------------------------------------------------------------------------

impl PhraseStore for JsonStore {
    fn get_or_create_phrase_id(
        &self,
        speaker: &str,
        category: Category,
        text: &str,
    ) -> Result<PhraseId, StoreError> {
        let mut doc = self.lock();
        if let Some(existing) = doc
            .phrases
            .iter()
            .find(|p| p.speaker == speaker && p.category == category && p.text == text)
        {
            return Ok(existing.id);
        }

        let id = doc.phrase_id();
        doc.phrases.push(PhraseRecord {
            id,
            speaker: speaker.to_string(),
            category,
            text: text.to_string(),
            translations: BTreeMap::new(),
        });
        self.persist(&doc)?;
        Ok(id)
    }

    fn get_translated(&self, id: PhraseId) -> Result<Translated, StoreError> {
        let doc = self.lock();
        let record = doc
            .phrases
            .iter()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownPhrase(id))?;

        if self.locale != self.source_locale {
            if let Some(text) = record.translations.get(&self.locale) {
                return Ok(Translated {
                    text: text.clone(),
                    was_translated: true,
                });
            }
        }
        Ok(Translated {
            text: record.text.clone(),
            was_translated: false,
        })
    }
}

// ---------------------------------------------------------------------------
// CharacterStore
// ---------------------------------------------------------------------------

impl CharacterStore for JsonStore {
    fn get_or_create_character(
        &self,
        name: &str,
        category: Category,
    ) -> Result<Character, StoreError> {
        let mut doc = self.lock();
        if let Some(existing) = doc
            .characters
            .iter()
            .find(|c| c.name == name && c.category == category)
        {
            return Ok(existing.clone());
        }

        let character = self.new_character(&mut doc, name, category);
        log::info!(
            "store: new character {} ({}) voiced by {}",
            character.name,
            character.category,
            character.primary_provider
        );
        doc.characters.push(character.clone());
        self.persist(&doc)?;
        Ok(character)
    }

    fn record_last_spoke(&self, id: CharacterId) -> Result<(), StoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut doc = self.lock();
        let character = doc
            .characters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::UnknownCharacter(id))?;
        character.last_spoke = Some(now);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn set_attribute(&self, name: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let mut doc = self.lock();
        if !doc.characters.iter().any(|c| c.name == name) {
            let character = self.new_character(&mut doc, name, Category::Player);
            doc.characters.push(character);
        }

        for character in doc.characters.iter_mut().filter(|c| c.name == name) {
            match key {
                "primary" => character.primary_provider = value.to_string(),
                "secondary" => character.secondary_provider = value.to_string(),
                "effects" => {
                    character.effects = value
                        .split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {
                    character.attributes.insert(key.to_string(), value.to_string());
                }
            }
        }
        log::debug!("store: {name}.{key} = {value}");
        self.persist(&doc)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
