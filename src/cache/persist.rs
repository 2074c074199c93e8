//! Durable persistence backends for cache stores.
//!
//! Persistence is strictly best-effort: a store logs and ignores every
//! backend failure, degrading to an in-memory cache. Entries are snapshotted
//! as JSON so a store can be rehydrated across process restarts.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Serialized form of a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry<T> {
    pub key: String,
    pub data: T,
    pub stored_at: SystemTime,
    pub ttl: Duration,
    pub last_accessed: SystemTime,
}

/// A durable mirror of a cache store's entries.
pub trait Persistence<T>: Send + Sync {
    fn load(&self) -> io::Result<Vec<PersistedEntry<T>>>;
    fn save(&self, entries: &[PersistedEntry<T>]) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
    fn name(&self) -> &'static str;
}

/// Single-file JSON persistence.
///
/// The whole entry set is rewritten on each save; stores are capacity-bounded
/// so snapshots stay small. The write goes through a sibling temp file and a
/// rename so a crash mid-write cannot leave a torn snapshot.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<T> Persistence<T> for JsonFilePersistence
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn load(&self) -> io::Result<Vec<PersistedEntry<T>>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        serde_json::from_slice(&raw).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn save(&self, entries: &[PersistedEntry<T>]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec(entries)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

/// No-op persistence for purely in-memory stores.
pub struct NullPersistence;

impl NullPersistence {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Persistence<T> for NullPersistence {
    fn load(&self) -> io::Result<Vec<PersistedEntry<T>>> {
        Ok(Vec::new())
    }

    fn save(&self, _entries: &[PersistedEntry<T>]) -> io::Result<()> {
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> PathBuf {
        std::env::temp_dir().join(format!("cachefetch-persist-{}.json", uuid::Uuid::new_v4()))
    }

    fn entry(key: &str, value: i64) -> PersistedEntry<i64> {
        let now = SystemTime::now();
        PersistedEntry {
            key: key.to_string(),
            data: value,
            stored_at: now,
            ttl: Duration::from_secs(60),
            last_accessed: now,
        }
    }

    #[test]
    fn save_then_load_round_trips_entries() {
        let persist = JsonFilePersistence::new(scratch_file());
        persist.save(&[entry("a", 1), entry("b", 2)]).unwrap();

        let loaded: Vec<PersistedEntry<i64>> = persist.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].key, "a");
        assert_eq!(loaded[1].data, 2);

        Persistence::<i64>::clear(&persist).unwrap();
        let empty: Vec<PersistedEntry<i64>> = persist.load().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn loading_a_missing_file_is_an_empty_set() {
        let persist = JsonFilePersistence::new(scratch_file());
        let loaded: Vec<PersistedEntry<i64>> = persist.load().unwrap();
        assert!(loaded.is_empty());
    }
}
