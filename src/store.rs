use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::Builder;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::domain::{EntityKind, Species};
use crate::error::KiraError;
use crate::fs_util;
use crate::registry::{Adaptor, AdaptorKey, Connection, StorageBackend};
use crate::serializer::read_json_lines;

/// Fields checked, in order, when looking a record up by id.
const ID_FIELDS: [&str; 4] = ["id", "chunkId", "accession", "name"];

/// File-backed store serving the JSON-lines output of the build step.
///
/// Layout: `<root>/<species id>/<assembly>/<collection>.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStore;

impl JsonStore {
    pub fn new() -> Self {
        Self
    }

    pub fn key_dir(root: &Utf8Path, key: &AdaptorKey) -> Utf8PathBuf {
        root.join(&key.species).join(&key.assembly)
    }

    /// Copies the entity collections of a build output directory into the
    /// store for `key`, replacing what was there. Other `.json` files, such as
    /// `genome_info.json`, are left out. Returns the copied collection names.
    pub fn load(
        build_output: &Path,
        root: &Utf8Path,
        key: &AdaptorKey,
    ) -> Result<Vec<String>, KiraError> {
        let dest = Self::key_dir(root, key);
        let parent = dest
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid store path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        let temp_dir = Builder::new()
            .prefix("kira-rb-load")
            .tempdir_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        let mut collections = Vec::new();
        for source in json_files(build_output)? {
            let Some(name) = source.file_name() else {
                continue;
            };
            fs::copy(&source, temp_dir.path().join(name))
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            if let Some(stem) = source.file_stem() {
                collections.push(stem.to_string_lossy().to_string());
            }
        }
        collections.sort();

        atomic_rename_dir(temp_dir.path(), dest.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        info!(key = %key, collections = collections.len(), "build output loaded");
        Ok(collections)
    }
}

impl StorageBackend for JsonStore {
    fn connect(
        &self,
        config: &RegistryConfig,
        _species: &Species,
        key: &AdaptorKey,
    ) -> Result<Arc<dyn Connection>, KiraError> {
        let dir = Self::key_dir(&config.root, key);
        if !dir.as_std_path().is_dir() {
            return Err(KiraError::StoreUnavailable(format!(
                "{dir} is not a directory"
            )));
        }
        Ok(Arc::new(JsonConnection {
            dir,
            key: key.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct JsonConnection {
    dir: Utf8PathBuf,
    key: AdaptorKey,
    closed: Arc<AtomicBool>,
}

impl Connection for JsonConnection {
    fn adaptor(&self, kind: EntityKind) -> Result<Arc<dyn Adaptor>, KiraError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KiraError::StoreUnavailable(format!("{} is closed", self.key)));
        }
        Ok(Arc::new(JsonAdaptor {
            kind,
            key: self.key.clone(),
            path: self.dir.join(format!("{}.json", kind.collection())),
            closed: Arc::clone(&self.closed),
            rows: Mutex::new(None),
        }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct JsonAdaptor {
    kind: EntityKind,
    key: AdaptorKey,
    path: Utf8PathBuf,
    closed: Arc<AtomicBool>,
    rows: Mutex<Option<Arc<Vec<Value>>>>,
}

impl JsonAdaptor {
    /// Loads the collection on first use. A missing file is an empty collection.
    fn rows(&self) -> Result<Arc<Vec<Value>>, KiraError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KiraError::StoreUnavailable(format!("{} is closed", self.key)));
        }
        let mut guard = self
            .rows
            .lock()
            .map_err(|_| KiraError::StoreUnavailable("adaptor cache poisoned".to_string()))?;
        if let Some(rows) = guard.as_ref() {
            return Ok(Arc::clone(rows));
        }
        let rows = if self.path.as_std_path().exists() {
            read_json_lines(self.path.as_std_path())?
        } else {
            Vec::new()
        };
        debug!(path = %self.path, rows = rows.len(), "collection loaded");
        let rows = Arc::new(rows);
        *guard = Some(Arc::clone(&rows));
        Ok(rows)
    }
}

impl Adaptor for JsonAdaptor {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn key(&self) -> &AdaptorKey {
        &self.key
    }

    fn count(&self) -> Result<usize, KiraError> {
        Ok(self.rows()?.len())
    }

    fn get_by_id(&self, id: &str) -> Result<Vec<Value>, KiraError> {
        let rows = self.rows()?;
        Ok(rows
            .iter()
            .filter(|row| {
                ID_FIELDS
                    .iter()
                    .any(|field| row.get(field).and_then(Value::as_str) == Some(id))
            })
            .cloned()
            .collect())
    }

    fn get_all(&self, limit: Option<usize>) -> Result<Vec<Value>, KiraError> {
        let rows = self.rows()?;
        Ok(rows
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, KiraError> {
    Ok(fs_util::list_files(dir)?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(is_collection)
        })
        .collect())
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)
}

fn is_collection(stem: &str) -> bool {
    EntityKind::all().iter().any(|kind| kind.collection() == stem)
}
