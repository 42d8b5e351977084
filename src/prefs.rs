//! Durable user preferences.
//!
//! Only settings that should survive a restart live here. Dialog state, expanded panels and
//! the like belong to whichever component owns them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::warn;

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        MemoryPreferences::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Preferences kept as a flat JSON object in a file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FilePreferences {
    /// Opens the file at `path`. A missing file starts empty; an unreadable one is logged
    /// and ignored so a corrupt preference file never blocks startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!("ignoring malformed preferences in {}: {}", path.display(), err);
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("could not read preferences from {}: {}", path.display(), err);
                BTreeMap::new()
            }
        };
        FilePreferences { path, values }
    }

    fn flush(&self) -> io::Result<()> {
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, text)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Width of the canvas side panel in pixels.
pub struct SidebarWidth;

impl SidebarWidth {
    pub const KEY: &'static str = "sidebar.width";
    pub const MIN: u32 = 200;
    pub const MAX: u32 = 600;
    pub const DEFAULT: u32 = 320;

    pub fn load(store: &impl PreferenceStore) -> u32 {
        store
            .get(Self::KEY)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map_or(Self::DEFAULT, |w| w.clamp(Self::MIN, Self::MAX))
    }

    /// Stores the width clamped to the allowed range and returns what was stored.
    pub fn save(store: &mut impl PreferenceStore, width: u32) -> io::Result<u32> {
        let width = width.clamp(Self::MIN, Self::MAX);
        store.set(Self::KEY, &width.to_string())?;
        Ok(width)
    }
}
