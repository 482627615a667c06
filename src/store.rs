//! On-disk persistence for passage indexes.
//!
//! Each agent gets a directory under the processed root:
//!
//! ```text
//! processed/
//!   maaya/
//!     vectors.bin     little-endian f32 matrix, passage_count x dims
//!     passages.json   ordered passage list
//!     meta.json       IndexMeta
//!   maaya.lock        present while a build is running
//! ```
//!
//! Saves write a temporary sibling directory and rename it into place, so a
//! reader sees either the old index or the new one, never a mix. Loads
//! validate all three files against each other.
//!
//! The lock file holds the PID of the building process. A lock whose process
//! is gone (a killed build) is replaced on the next `lock` call, and
//! [`IndexStore::remove`] deletes it along with the index.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::IndexError;
use crate::index::{IndexMeta, PassageIndex};
use crate::models::Passage;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const PASSAGES_FILE: &str = "passages.json";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agent_dir(&self, agent: &str) -> PathBuf {
        self.root.join(agent)
    }

    /// True when all three artifacts are present. Says nothing about validity.
    pub fn exists(&self, agent: &str) -> bool {
        let dir = self.agent_dir(agent);
        [VECTORS_FILE, PASSAGES_FILE, META_FILE]
            .iter()
            .all(|f| dir.join(f).is_file())
    }

    pub fn save(&self, index: &PassageIndex) -> Result<(), IndexError> {
        let agent = index.meta().agent.as_str();
        fs::create_dir_all(&self.root).map_err(|e| IndexError::io(&self.root, e))?;
        self.sweep_leftovers(agent);

        let tmp = self.root.join(format!(".{}.tmp-{}", agent, Uuid::new_v4()));
        if let Err(e) = write_artifacts(&tmp, index) {
            let _ = fs::remove_dir_all(&tmp);
            return Err(e);
        }

        let target = self.agent_dir(agent);
        let old = self.root.join(format!(".{}.old-{}", agent, Uuid::new_v4()));
        let had_previous = target.exists();
        if had_previous {
            fs::rename(&target, &old).map_err(|e| IndexError::io(&target, e))?;
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            if had_previous {
                let _ = fs::rename(&old, &target);
            }
            let _ = fs::remove_dir_all(&tmp);
            return Err(IndexError::io(&target, e));
        }
        if had_previous {
            let _ = fs::remove_dir_all(&old);
        }
        debug!("saved index for {} to {}", agent, target.display());
        Ok(())
    }

    pub fn read_meta(&self, agent: &str) -> Result<IndexMeta, IndexError> {
        read_json(&self.agent_dir(agent).join(META_FILE))
    }

    pub fn load(&self, agent: &str) -> Result<PassageIndex, IndexError> {
        let dir = self.agent_dir(agent);
        let meta: IndexMeta = read_json(&dir.join(META_FILE))?;
        if meta.agent != agent {
            return Err(IndexError::Corrupt(format!(
                "{} belongs to agent '{}'",
                dir.display(),
                meta.agent
            )));
        }
        let passages: Vec<Passage> = read_json(&dir.join(PASSAGES_FILE))?;

        let vectors_path = dir.join(VECTORS_FILE);
        let bytes = match fs::read(&vectors_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::MissingArtifact(vectors_path))
            }
            Err(e) => return Err(IndexError::io(&vectors_path, e)),
        };
        if bytes.len() % 4 != 0 {
            return Err(IndexError::Corrupt(format!(
                "{} has {} bytes, not a whole number of f32 values",
                vectors_path.display(),
                bytes.len()
            )));
        }

        PassageIndex::from_parts(meta, passages, blob_to_vec(&bytes))
    }

    pub fn lock_path(&self, agent: &str) -> PathBuf {
        self.root.join(format!("{}.lock", agent))
    }

    /// Delete an agent's artifacts and any leftover build lock. Returns
    /// whether anything was removed.
    pub fn remove(&self, agent: &str) -> Result<bool, IndexError> {
        let mut removed = false;
        let dir = self.agent_dir(agent);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;
            removed = true;
        }
        let lock = self.lock_path(agent);
        match fs::remove_file(&lock) {
            Ok(()) => removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IndexError::io(&lock, e)),
        }
        Ok(removed)
    }

    /// Take the per-agent build lock. Fails fast if a live build holds it.
    pub fn lock(&self, agent: &str) -> Result<BuildLock, IndexError> {
        fs::create_dir_all(&self.root).map_err(|e| IndexError::io(&self.root, e))?;
        let path = self.lock_path(agent);
        match try_create_lock(&path)? {
            Some(lock) => Ok(lock),
            None if holder_is_gone(&path) => {
                warn!("replacing stale build lock {}", path.display());
                let _ = fs::remove_file(&path);
                try_create_lock(&path)?.ok_or_else(|| IndexError::BuildInProgress {
                    agent: agent.to_string(),
                    lock: path.clone(),
                })
            }
            None => Err(IndexError::BuildInProgress {
                agent: agent.to_string(),
                lock: path,
            }),
        }
    }

    /// Remove temp and old directories left behind by an interrupted save.
    fn sweep_leftovers(&self, agent: &str) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        let tmp_prefix = format!(".{}.tmp-", agent);
        let old_prefix = format!(".{}.old-", agent);
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&tmp_prefix) || name.starts_with(&old_prefix) {
                debug!("removing leftover {}", name);
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }
}

/// `Ok(None)` when the lock file already exists.
fn try_create_lock(path: &Path) -> Result<Option<BuildLock>, IndexError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => {
            let _ = writeln!(f, "{}", std::process::id());
            Ok(Some(BuildLock {
                path: path.to_path_buf(),
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

/// True when the lock names a process that no longer exists. Locks that
/// cannot be read or parsed are treated as live.
#[cfg(target_os = "linux")]
fn holder_is_gone(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    match contents.trim().parse::<u32>() {
        Ok(pid) => !Path::new(&format!("/proc/{}", pid)).exists(),
        Err(_) => false,
    }
}

#[cfg(not(target_os = "linux"))]
fn holder_is_gone(_path: &Path) -> bool {
    false
}

/// Held for the duration of a build; removes the lock file on drop.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn write_artifacts(dir: &Path, index: &PassageIndex) -> Result<(), IndexError> {
    fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

    let vectors_path = dir.join(VECTORS_FILE);
    fs::write(&vectors_path, vec_to_blob(index.vectors()))
        .map_err(|e| IndexError::io(&vectors_path, e))?;

    write_json(&dir.join(PASSAGES_FILE), index.passages(), false)?;
    write_json(&dir.join(META_FILE), index.meta(), true)?;
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), IndexError> {
    let file = File::create(path).map_err(|e| IndexError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let result = if pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    };
    result.map_err(|source| IndexError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| IndexError::io(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, IndexError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::MissingArtifact(path.to_path_buf()))
        }
        Err(e) => return Err(IndexError::io(path, e)),
    };
    serde_json::from_reader(BufReader::new(file)).map_err(|source| IndexError::Json {
        path: path.to_path_buf(),
        source,
    })
}
