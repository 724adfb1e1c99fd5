//! Local key-value preferences.
//!
//! The only key the app writes is [`SAVED_CITY_KEY`], set when the user opens
//! the details of a search result and read back on the next start.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::project_dirs;

pub const SAVED_CITY_KEY: &str = "saved_city";

/// String key-value persistence.
pub trait PreferenceStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn saved_city(&self) -> Result<Option<String>> {
        self.get(SAVED_CITY_KEY)
    }

    fn save_city(&self, city: &str) -> Result<()> {
        self.set(SAVED_CITY_KEY, city)
    }
}

/// Preferences kept in a flat TOML table on disk.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Store located in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("preferences.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_contents(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&self.path)
            .map(Some)
            .with_context(|| format!("Failed to read preferences file: {}", self.path.display()))
    }

    fn parse(&self, contents: &str) -> Result<BTreeMap<String, String>> {
        toml::from_str(contents)
            .with_context(|| format!("Failed to parse preferences file: {}", self.path.display()))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match self.read_contents()? {
            Some(contents) => self.parse(&contents),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Like [`Self::read_all`], but an unparsable file is replaced rather than
    /// blocking every later write.
    fn read_for_update(&self) -> Result<BTreeMap<String, String>> {
        let Some(contents) = self.read_contents()? else {
            return Ok(BTreeMap::new());
        };

        Ok(self.parse(&contents).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "discarding unreadable preferences");
            BTreeMap::new()
        }))
    }

    /// Write through a temp file in the same directory and rename it over the
    /// target, so readers never see a half-written file.
    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create preferences directory: {}", parent.display())
        })?;

        let toml = toml::to_string_pretty(values).context("Failed to serialize preferences")?;

        let mut tmp = NamedTempFile::new_in(parent).with_context(|| {
            format!("Failed to create temporary preferences file in {}", parent.display())
        })?;
        tmp.write_all(toml.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .context("Failed to write temporary preferences file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write preferences file: {}", self.path.display()))?;

        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        let mut values = self.read_for_update()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }
}

/// Process-local preferences; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saved_city(city: &str) -> Self {
        let values = BTreeMap::from([(SAVED_CITY_KEY.to_string(), city.to_string())]);
        Self { values: Mutex::new(values) }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
