//! Prompt presets — named, reusable instruction strings with their own
//! lifecycle, stored as JSON in the app data directory. Presets survive
//! across sessions even though the editable scene does not.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{log_err, log_info};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PromptPreset {
    pub id: Uuid,
    pub name: String,
    pub text: String,
}

/// Collection of presets bound to a JSON file. Every mutation saves
/// immediately; the file is small and the operations are user-paced.
pub struct PresetStore {
    path: PathBuf,
    presets: Vec<PromptPreset>,
}

impl PresetStore {
    /// Load from the default location in the app data dir.
    pub fn load_default() -> Self {
        Self::load(crate::io::app_data_dir().join("presets.json"))
    }

    /// Load from an explicit path. A missing or unreadable file yields an
    /// empty store (first launch).
    pub fn load(path: PathBuf) -> Self {
        let presets = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(presets) => presets,
                Err(e) => {
                    log_err!("presets file {:?} is corrupt ({}), starting empty", path, e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, presets }
    }

    pub fn all(&self) -> &[PromptPreset] {
        &self.presets
    }

    pub fn get(&self, id: Uuid) -> Option<&PromptPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn add(&mut self, name: &str, text: &str) -> Uuid {
        let preset = PromptPreset {
            id: Uuid::new_v4(),
            name: name.to_string(),
            text: text.to_string(),
        };
        let id = preset.id;
        self.presets.push(preset);
        self.save();
        log_info!("preset added: {}", name);
        id
    }

    pub fn update(&mut self, id: Uuid, name: &str, text: &str) {
        if let Some(preset) = self.presets.iter_mut().find(|p| p.id == id) {
            preset.name = name.to_string();
            preset.text = text.to_string();
            self.save();
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        if self.presets.len() != before {
            self.save();
        }
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&self.presets) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    log_err!("could not save presets to {:?}: {}", self.path, e);
                }
            }
            Err(e) => log_err!("could not serialize presets: {}", e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");

        let mut store = PresetStore::load(path.clone());
        let id = store.add("Scandi", "bright scandinavian style, light wood");
        store.add("Industrial", "exposed brick, steel fixtures");
        store.update(id, "Scandi v2", "bright scandinavian style, oak floors");

        let reloaded = PresetStore::load(path);
        assert_eq!(reloaded.all().len(), 2);
        let p = reloaded.get(id).unwrap();
        assert_eq!(p.name, "Scandi v2");
        assert!(p.text.contains("oak floors"));
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");

        let mut store = PresetStore::load(path.clone());
        let id = store.add("temp", "x");
        store.remove(id);

        assert!(PresetStore::load(path).all().is_empty());
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::load(dir.path().join("nope.json"));
        assert!(store.all().is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(&path, "{{{ not json").unwrap();
        assert!(PresetStore::load(path).all().is_empty());
    }
}
