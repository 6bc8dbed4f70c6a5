//! Durable client-side storage and the favorites set

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key under which favorites are persisted
pub const FAVORITES_KEY: &str = "favorites";

/// String key-value store that survives restarts
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()>;
}

/// Store backed by a JSON object on disk, rewritten on every `set`
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed store {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    /// Default location next to the config file
    pub fn open_default() -> Self {
        Self::open(crate::config::config_dir().join("storage.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
    }
}

/// In-memory store; clones share the same entries
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Favorite channel numbers, loaded once and saved on every change
pub struct Favorites {
    store: Box<dyn KeyValueStore>,
    numbers: BTreeSet<i64>,
}

impl Favorites {
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let numbers = store
            .get(FAVORITES_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<i64>>(&raw) {
                Ok(list) => Some(list.into_iter().collect()),
                Err(e) => {
                    log::warn!("Ignoring malformed favorites: {}", e);
                    None
                }
            })
            .unwrap_or_default();
        Self { store, numbers }
    }

    pub fn contains(&self, ch_number: i64) -> bool {
        self.numbers.contains(&ch_number)
    }

    /// Add or remove; returns whether the channel is now a favorite
    pub fn toggle(&mut self, ch_number: i64) -> bool {
        let added = if self.numbers.remove(&ch_number) {
            false
        } else {
            self.numbers.insert(ch_number);
            true
        };
        self.persist();
        added
    }

    pub fn numbers(&self) -> &BTreeSet<i64> {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    fn persist(&mut self) {
        let list: Vec<i64> = self.numbers.iter().copied().collect();
        match serde_json::to_string(&list) {
            Ok(raw) => {
                if let Err(e) = self.store.set(FAVORITES_KEY, &raw) {
                    log::error!("Error saving favorites: {}", e);
                }
            }
            Err(e) => log::error!("Error encoding favorites: {}", e),
        }
    }
}
