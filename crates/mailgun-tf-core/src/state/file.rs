// # File State Store
//
// JSON state file shared by every invocation of the host binary.
//
// ## Crash Recovery
//
// - Atomic writes: the document is written to `<file>.tmp`, then renamed
// - Backup: the previous document is copied to `<file>.backup` before each
//   rename
// - Recovery: a file that no longer parses is replaced by its backup; with
//   no usable backup the store refuses to open
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "resources": {
//     "mailgun_domain.main": {
//       "resource_type": "mailgun_domain",
//       "id": "mg.example.com",
//       "attributes": { "name": "mg.example.com", "...": "..." },
//       "last_updated": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

type Resources = BTreeMap<String, StateRecord>;

/// File-backed state store
///
/// Every mutation is written through immediately; [`StateStore::flush`] only
/// has work to do after a failed write.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

#[derive(Debug)]
struct FileState {
    resources: Resources,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: String,
    #[serde(default)]
    resources: Resources,
}

impl FileStateStore {
    /// Open the state file at `path`, creating parent directories as needed
    ///
    /// A missing file is an empty state. A corrupted file is recovered from
    /// its backup; without a usable backup opening fails, since an empty
    /// state would make the next apply create duplicate remote objects.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let resources = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                resources,
                dirty: false,
            }),
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<Resources, Error> {
        match Self::load(path).await {
            Ok(resources) => {
                debug!("Loaded state from {}: {} resources", path.display(), resources.len());
                Ok(resources)
            }
            Err(Error::Json(e)) => {
                warn!(
                    "State file {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup = Self::backup_path(path);
                if !backup.exists() {
                    return Err(Error::state_store(format!(
                        "state file {} is corrupted ({}) and has no backup",
                        path.display(),
                        e
                    )));
                }

                match Self::load(&backup).await {
                    Ok(resources) => {
                        info!("Recovered state from backup: {} resources", resources.len());
                        if let Err(restore_err) = fs::copy(&backup, path).await {
                            error!("Failed to restore state file from backup: {}", restore_err);
                        }
                        Ok(resources)
                    }
                    Err(backup_err) => Err(Error::state_store(format!(
                        "state file {} is corrupted ({}) and its backup is unusable ({})",
                        path.display(),
                        e,
                        backup_err
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<Resources, Error> {
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(Resources::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;

        let file: StateFile = serde_json::from_str(&content)?;

        if file.version != STATE_FILE_VERSION {
            warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION, file.version
            );
        }

        Ok(file.resources)
    }

    async fn write(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let json = serde_json::to_string_pretty(&StateFile {
            version: STATE_FILE_VERSION.to_string(),
            resources: state.resources.clone(),
        })?;

        let temp = Self::sibling(&self.path, "tmp");
        {
            let mut file = fs::File::create(&temp).await.map_err(|e| {
                Error::state_store(format!("Failed to create {}: {}", temp.display(), e))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!("Failed to write {}: {}", temp.display(), e))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::state_store(format!("Failed to sync {}: {}", temp.display(), e))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                warn!("Failed to create state backup: {}", e);
            }
        }

        fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn backup_path(path: &Path) -> PathBuf {
        Self::sibling(path, "backup")
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, address: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.state.read().await.resources.get(address).cloned())
    }

    async fn put(&self, address: &str, record: &StateRecord) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state.resources.insert(address.to_string(), record.clone());
            state.dirty = true;
        }
        self.write().await
    }

    async fn delete(&self, address: &str) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if state.resources.remove(address).is_none() {
                return Ok(());
            }
            state.dirty = true;
        }
        self.write().await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.resources.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}
