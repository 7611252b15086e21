use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use svcwatch_shared::run_state::StateMap;
use tracing::debug;

/// Durable service name -> state mapping, loaded at the start of a run and
/// saved at the end.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<StateMap>;
    fn save(&self, state: &StateMap) -> Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<StateMap> {
        if !self.path.exists() {
            debug!("No state file at {:?}, starting empty", self.path);
            return Ok(StateMap::new());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(StateMap::new());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))
    }

    fn save(&self, state: &StateMap) -> Result<()> {
        let contents = serde_json::to_vec_pretty(state).context("Failed to serialize state")?;
        write_atomic(&self.path, &contents)
    }
}

/// Writes to a sibling temp file, syncs it and renames it over `path`, so
/// readers see either the old or the new file, never a truncated one.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create state directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(data).context("write tmp")?;
    tmp.as_file().sync_all().context("sync tmp")?;
    tmp.persist(path)
        .with_context(|| format!("atomic rename tmp->{}", path.display()))?;
    Ok(())
}

/// In-memory store for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StateMap>,
}

impl MemoryStore {
    pub fn new(initial: StateMap) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> StateMap {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<StateMap> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &StateMap) -> Result<()> {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = state.clone();
        Ok(())
    }
}
