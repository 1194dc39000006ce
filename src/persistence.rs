//! Persisted control state: last effect, power, brightness and presets.
//!
//! Loaded once at startup; rewritten after every externally triggered
//! change. Writes are atomic (temp file + rename) and never block the
//! caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, ScalesError};
use crate::models::presets::Preset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub power_state: bool,
    pub effect_name: Option<String>,
    pub brightness: f64,
    pub presets: Vec<Preset>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            power_state: true,
            effect_name: None,
            brightness: 1.0,
            presets: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct StateStore {
    path: PathBuf,
    generation: Arc<AtomicU64>,
    /// Generation of the last document written.
    written: Arc<Mutex<u64>>,
    /// Held while a snapshot is taken and numbered.
    snapshot: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            generation: Arc::new(AtomicU64::new(0)),
            written: Arc::new(Mutex::new(0)),
            snapshot: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing or unreadable file yields defaults.
    pub fn load(&self) -> PersistedState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[persistence] No saved state at {}, starting fresh",
                    self.path.display()
                );
                return PersistedState::default();
            }
            Err(e) => {
                log::warn!(
                    "[persistence] Failed to read {}: {}",
                    self.path.display(),
                    e
                );
                return PersistedState::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                log::warn!(
                    "[persistence] Ignoring corrupt state in {}: {}",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    /// Write synchronously.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.write_generation(generation, state)
    }

    fn write_generation(&self, generation: u64, state: &PersistedState) -> Result<()> {
        let mut written = self.written.lock().expect("state store poisoned");
        if generation < *written {
            return Ok(());
        }
        write_atomic(&self.path, state)?;
        *written = generation;
        Ok(())
    }

    /// Write in the background. A later save always wins over an earlier one
    /// that finishes after it.
    pub fn save_detached(&self, state: PersistedState) {
        self.save_detached_with(|| state);
    }

    /// As `save_detached`, building the document under the same lock that
    /// numbers it, so a snapshot taken later always carries the higher
    /// generation.
    pub fn save_detached_with<F>(&self, snapshot: F)
    where
        F: FnOnce() -> PersistedState,
    {
        let (generation, state) = {
            let _guard = self.snapshot.lock().expect("state store poisoned");
            let state = snapshot();
            (self.generation.fetch_add(1, Ordering::SeqCst) + 1, state)
        };
        let store = self.clone();
        let job = move || {
            if let Err(e) = store.write_generation(generation, &state) {
                log::warn!(
                    "[persistence] Failed to save {}: {}",
                    store.path.display(),
                    e
                );
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }
}

fn write_atomic(path: &Path, state: &PersistedState) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, state)?;
    file.persist(path)
        .map_err(|e| ScalesError::Persistence(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}
