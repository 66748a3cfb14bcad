use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::table::PathTable;
use crate::StoreError;

/// Storage behind a [`PathStore`](crate::PathStore).
///
/// The store always hands over the complete table; repositories never see
/// partial updates.
pub trait PathRepository: Send + Sync {
    /// Load the persisted table. A repository with nothing saved yet returns
    /// an empty table.
    fn load(&self) -> Result<PathTable, StoreError>;

    /// Replace the persisted table. On return the data must survive a crash.
    fn save_atomic(&self, table: &PathTable) -> Result<(), StoreError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Selects a repository implementation.
///
/// ```
/// use pathstore::RepositoryConfig;
///
/// let ephemeral = RepositoryConfig::in_memory();
/// let on_disk = RepositoryConfig::json_file("/var/lib/captcha/path_db.json");
/// # let _ = (ephemeral, on_disk);
/// ```
#[derive(Clone, Debug, Default)]
pub enum RepositoryConfig {
    /// Single pretty-printed JSON document, rewritten on every observation.
    JsonFile { path: PathBuf },
    /// Nothing leaves the process.
    #[default]
    InMemory,
}

impl RepositoryConfig {
    pub fn in_memory() -> Self {
        RepositoryConfig::InMemory
    }

    pub fn json_file<P: Into<PathBuf>>(path: P) -> Self {
        RepositoryConfig::JsonFile { path: path.into() }
    }

    pub fn build(&self) -> Box<dyn PathRepository> {
        match self {
            RepositoryConfig::InMemory => Box::new(InMemoryRepository::new()),
            RepositoryConfig::JsonFile { path } => Box::new(JsonFileRepository::new(path)),
        }
    }
}

/// JSON document on local disk, replaced by write-to-temp-then-rename.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "path_db.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl PathRepository for JsonFileRepository {
    fn load(&self) -> Result<PathTable, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no path database yet, starting empty");
                return Ok(PathTable::new());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save_atomic(&self, table: &PathTable) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_vec_pretty(table).map_err(|e| StoreError::Encode(e.to_string()))?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        if let Some(dir) = &parent {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }

        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&encoded)
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        // Make the rename itself durable.
        #[cfg(unix)]
        if let Some(dir) = &parent {
            if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
                debug!(dir = %dir.display(), error = %e, "directory fsync failed");
            }
        }

        debug!(path = %self.path.display(), bytes = encoded.len(), "path database saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Keeps the last saved table in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    saved: Mutex<PathTable>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository that starts with `table` already persisted.
    pub fn with_table(table: PathTable) -> Self {
        Self {
            saved: Mutex::new(table),
        }
    }
}

impl PathRepository for InMemoryRepository {
    fn load(&self) -> Result<PathTable, StoreError> {
        Ok(self.saved.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save_atomic(&self, table: &PathTable) -> Result<(), StoreError> {
        *self.saved.lock().map_err(|_| StoreError::Poisoned)? = table.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
