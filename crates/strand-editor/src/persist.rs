//! Project files, the auto-save slot and SVG exports.
//!
//! Layout under the documents directory:
//!
//! ```text
//! <documents>/projects/<name>.oss   pretty JSON canvas
//! <documents>/exports/<name>.svg
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! cancelled or failed save never leaves a truncated file behind.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use strand_core::CanvasState;
use thiserror::Error;
use tokio::fs;

pub const PROJECT_EXTENSION: &str = "oss";
pub const AUTOSAVE_KEY: &str = "@OpenStrand:autosave";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid project data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project {0:?} does not exist")]
    NotFound(String),

    #[error("invalid project name {0:?}")]
    InvalidName(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Reject names that would escape the projects directory.
fn check_name(name: &str) -> PersistResult<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(PersistError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn write_atomic(path: &Path, contents: &[u8]) -> PersistResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

// ─── JSON ───────────────────────────────────────────────────────────────

pub fn export_json(canvas: &CanvasState) -> PersistResult<String> {
    Ok(serde_json::to_string_pretty(canvas)?)
}

/// Parse and repair a project document. Invalid input yields `None`.
pub fn import_json(input: &str) -> Option<CanvasState> {
    match serde_json::from_str::<CanvasState>(input) {
        Ok(canvas) => Some(canvas.repaired()),
        Err(e) => {
            log::warn!("rejecting project JSON: {e}");
            None
        }
    }
}

// ─── Named projects ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// `root` is the documents directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn project_path(&self, name: &str) -> PathBuf {
        self.projects_dir().join(format!("{name}.{PROJECT_EXTENSION}"))
    }

    pub async fn initialize(&self) -> PersistResult<()> {
        fs::create_dir_all(self.projects_dir()).await?;
        Ok(())
    }

    pub async fn save(&self, name: &str, canvas: &CanvasState) -> PersistResult<PathBuf> {
        check_name(name)?;
        let json = export_json(canvas)?;
        self.initialize().await?;
        let path = self.project_path(name);
        write_atomic(&path, json.as_bytes()).await?;
        log::info!("saved project {name:?} to {}", path.display());
        Ok(path)
    }

    pub async fn load(&self, name: &str) -> PersistResult<CanvasState> {
        check_name(name)?;
        let path = self.project_path(name);
        let data = match fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let canvas: CanvasState = serde_json::from_str(&data)?;
        Ok(canvas.repaired())
    }

    /// Project names without extension, sorted. A missing directory lists
    /// as empty.
    pub async fn list(&self) -> PersistResult<Vec<String>> {
        let mut entries = match fs::read_dir(self.projects_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == PROJECT_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deleting a project that does not exist succeeds.
    pub async fn delete(&self, name: &str) -> PersistResult<()> {
        check_name(name)?;
        match fs::remove_file(self.project_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rename(&self, old: &str, new: &str) -> PersistResult<()> {
        check_name(old)?;
        check_name(new)?;
        if !self.exists(old).await {
            return Err(PersistError::NotFound(old.to_string()));
        }
        fs::rename(self.project_path(old), self.project_path(new)).await?;
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && fs::try_exists(self.project_path(name)).await.unwrap_or(false)
    }

    /// File size in bytes.
    pub async fn size(&self, name: &str) -> PersistResult<u64> {
        check_name(name)?;
        match fs::metadata(self.project_path(name)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_svg(&self, name: &str, svg: &str) -> PersistResult<PathBuf> {
        check_name(name)?;
        fs::create_dir_all(self.exports_dir()).await?;
        let path = self.exports_dir().join(format!("{name}.svg"));
        write_atomic(&path, svg.as_bytes()).await?;
        log::info!("exported {}", path.display());
        Ok(path)
    }
}

// ─── Key-value slot ─────────────────────────────────────────────────────

/// Minimal async key-value store backing the auto-save slot.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = PersistResult<Option<String>>> + Send;
    fn set(&self, key: &str, value: String) -> impl Future<Output = PersistResult<()>> + Send;
    fn remove(&self, key: &str) -> impl Future<Output = PersistResult<()>> + Send;
}

/// In-process store for tests and headless sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PersistResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> PersistResult<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PersistResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> PersistResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> PersistResult<()> {
        fs::create_dir_all(&self.dir).await?;
        write_atomic(&self.path_for(key), value.as_bytes()).await
    }

    async fn remove(&self, key: &str) -> PersistResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Store the canvas in the auto-save slot.
pub async fn auto_save<S: KeyValueStore>(store: &S, canvas: &CanvasState) -> PersistResult<()> {
    let json = serde_json::to_string(canvas)?;
    store.set(AUTOSAVE_KEY, json).await
}

/// Read back the auto-save slot. Corrupt data counts as absent.
pub async fn load_auto_save<S: KeyValueStore>(store: &S) -> PersistResult<Option<CanvasState>> {
    Ok(store.get(AUTOSAVE_KEY).await?.and_then(|json| import_json(&json)))
}

pub async fn clear_auto_save<S: KeyValueStore>(store: &S) -> PersistResult<()> {
    store.remove(AUTOSAVE_KEY).await
}
