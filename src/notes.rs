use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("note file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("note file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Durable backing for per-page notes, keyed by (document id, page).
pub trait NotePersistence {
    fn load(&self, document_id: &str) -> Result<HashMap<u32, String>, NoteError>;

    /// Store `text` for the page; empty text removes the entry.
    fn save(&self, document_id: &str, page: u32, text: &str) -> Result<(), NoteError>;
}

/// Per-page note text for one document. Missing and empty notes are the same.
/// Edits stay in memory until `flush`, which also runs on drop.
pub struct NoteStore {
    document_id: String,
    notes: HashMap<u32, String>,
    dirty: HashSet<u32>,
    persistence: Option<Box<dyn NotePersistence>>,
}

impl NoteStore {
    pub fn in_memory(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            notes: HashMap::new(),
            dirty: HashSet::new(),
            persistence: None,
        }
    }

    /// Load existing notes; a broken backing store leaves the map empty.
    pub fn with_persistence(document_id: impl Into<String>, persistence: Box<dyn NotePersistence>) -> Self {
        let document_id = document_id.into();
        let notes = match persistence.load(&document_id) {
            Ok(notes) => {
                log::info!("Loaded {} note(s) for {}", notes.len(), document_id);
                notes
            }
            Err(e) => {
                log::warn!("Failed to load notes for {}: {}", document_id, e);
                HashMap::new()
            }
        };
        Self {
            document_id,
            notes,
            dirty: HashSet::new(),
            persistence: Some(persistence),
        }
    }

    pub fn get(&self, page: u32) -> &str {
        self.notes.get(&page).map(String::as_str).unwrap_or("")
    }

    pub fn has_note(&self, page: u32) -> bool {
        !self.get(page).is_empty()
    }

    /// Returns false when the text was already stored.
    pub fn set(&mut self, page: u32, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.get(page) == text {
            return false;
        }
        if text.is_empty() {
            self.notes.remove(&page);
        } else {
            self.notes.insert(page, text);
        }
        if self.persistence.is_some() {
            self.dirty.insert(page);
        }
        true
    }

    pub fn clear(&mut self, page: u32) -> bool {
        self.set(page, String::new())
    }

    pub fn has_unsaved(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Write every edited page to the backing store. Failed pages stay
    /// dirty for the next attempt.
    pub fn flush(&mut self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let mut pages: Vec<u32> = self.dirty.iter().copied().collect();
        pages.sort_unstable();
        for page in pages {
            let text = self.notes.get(&page).map(String::as_str).unwrap_or("");
            match persistence.save(&self.document_id, page, text) {
                Ok(()) => {
                    self.dirty.remove(&page);
                }
                Err(e) => log::warn!("Failed to save note for page {}: {}", page, e),
            }
        }
    }
}

impl Drop for NoteStore {
    fn drop(&mut self) {
        self.flush();
    }
}

type NoteFileContents = BTreeMap<String, BTreeMap<u32, String>>;

/// All documents' notes in one JSON file: `{document_id: {page: text}}`.
pub struct JsonNoteFile {
    path: PathBuf,
}

impl JsonNoteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `notes.json` in the platform config directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::config_dir().join("notes.json"))
    }

    fn read_all(&self) -> Result<NoteFileContents, NoteError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NoteFileContents::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl NotePersistence for JsonNoteFile {
    fn load(&self, document_id: &str) -> Result<HashMap<u32, String>, NoteError> {
        let mut all = self.read_all()?;
        Ok(all
            .remove(document_id)
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .collect())
    }

    fn save(&self, document_id: &str, page: u32, text: &str) -> Result<(), NoteError> {
        let mut all = self.read_all()?;
        let doc = all.entry(document_id.to_string()).or_default();
        if text.is_empty() {
            doc.remove(&page);
        } else {
            doc.insert(page, text.to_string());
        }
        if doc.is_empty() {
            all.remove(document_id);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_note_reads_empty() {
        let notes = NoteStore::in_memory("doc");
        assert_eq!(notes.get(3), "");
        assert!(!notes.has_note(3));
    }

    #[test]
    fn test_set_replace_and_clear() {
        let mut notes = NoteStore::in_memory("doc");
        notes.set(2, "first");
        notes.set(2, "second");
        assert_eq!(notes.get(2), "second");
        assert!(notes.has_note(2));
        notes.clear(2);
        assert!(!notes.has_note(2));
        assert!(!notes.clear(2));
        assert!(!notes.has_unsaved());
    }

    #[test]
    fn test_json_file_round_trip_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.json");

        let mut a = NoteStore::with_persistence("a", Box::new(JsonNoteFile::new(&path)));
        a.set(1, "intro");
        a.set(5, "proof sketch");
        a.flush();
        let mut b = NoteStore::with_persistence("b", Box::new(JsonNoteFile::new(&path)));
        b.set(1, "other doc");
        drop(b);
        a.clear(1);
        drop(a);

        let reloaded = NoteStore::with_persistence("a", Box::new(JsonNoteFile::new(&path)));
        assert!(!reloaded.has_note(1));
        assert_eq!(reloaded.get(5), "proof sketch");
        let reloaded_b = NoteStore::with_persistence("b", Box::new(JsonNoteFile::new(&path)));
        assert_eq!(reloaded_b.get(1), "other doc");
    }

    #[test]
    fn test_edits_reach_disk_only_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let mut notes = NoteStore::with_persistence("a", Box::new(JsonNoteFile::new(&path)));
        for text in ["l", "le", "lem", "lemma"] {
            notes.set(3, text);
        }
        assert!(notes.has_unsaved());
        assert!(!path.exists());

        notes.flush();
        assert!(!notes.has_unsaved());
        let reloaded = NoteStore::with_persistence("a", Box::new(JsonNoteFile::new(&path)));
        assert_eq!(reloaded.get(3), "lemma");
    }

    #[test]
    fn test_corrupt_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut notes = NoteStore::with_persistence("a", Box::new(JsonNoteFile::new(&path)));
        assert!(!notes.has_note(1));
        notes.set(1, "kept in memory");
        notes.flush();
        assert_eq!(notes.get(1), "kept in memory");
        assert!(notes.has_unsaved());
    }
}
