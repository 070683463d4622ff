use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;

use crate::error::Result;
use crate::models::NewsEntry;

/// One JSON array of [`NewsEntry`] per ticker, kept under a single directory.
pub struct TickerStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TickerStore {
    /// A store over `dir` without touching the filesystem. Suitable for reading.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// A store over `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir)?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(ticker)))
    }

    /// Entries filed under `ticker`. A missing or unreadable file reads as empty.
    pub fn load(&self, ticker: &str) -> Vec<NewsEntry> {
        let path = self.path_for(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable ticker file, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt ticker file, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the whole collection for `ticker`.
    pub fn save(&self, ticker: &str, entries: &[NewsEntry]) -> Result<()> {
        let path = self.path_for(ticker);
        let mut content = serde_json::to_string_pretty(entries)?;
        content.push('\n');

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    /// Append `entry` unless an entry with the same headline and timestamp is
    /// already filed under `ticker`. Returns whether it was added.
    pub fn append_if_new(&self, ticker: &str, entry: NewsEntry) -> Result<bool> {
        let lock = self.lock_for(ticker);
        let _guard = relock(&lock);

        let path = self.path_for(ticker);
        let mut entries: Vec<NewsEntry> = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    let aside = set_aside(&path)?;
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "corrupt ticker file set aside, starting a new one"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            // Never overwrite a file that could not be read.
            Err(e) => return Err(e.into()),
        };
        if entries
            .iter()
            .any(|existing| existing.same_story(&entry.headline, &entry.timestamp))
        {
            return Ok(false);
        }

        entries.push(entry);
        self.save(ticker, &entries)?;
        Ok(true)
    }

    /// Tickers with a file in the store, sorted by file name.
    pub fn tickers(&self) -> Result<Vec<String>> {
        let listing = match fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut tickers = Vec::new();
        for dir_entry in listing {
            let path = dir_entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tickers.push(stem.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }

    fn lock_for(&self, ticker: &str) -> Arc<Mutex<()>> {
        let mut locks = relock(&self.locks);
        Arc::clone(locks.entry(file_stem(ticker)).or_default())
    }
}

/// A panic while holding a lock leaves nothing half-written in memory, so a
/// poisoned lock is still usable.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Move an unparsable ticker file to `<TICKER>.json.corrupt`.
fn set_aside(path: &Path) -> Result<PathBuf> {
    let aside = path.with_extension("json.corrupt");
    fs::rename(path, &aside)
        .with_context(|| format!("could not set aside corrupt file {}", path.display()))?;
    Ok(aside)
}

fn file_stem(ticker: &str) -> String {
    ticker
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'A'..='Z' | '0'..='9' | '.' | '-' | '^' | '=' => c,
            _ => '_',
        })
        .collect()
}
