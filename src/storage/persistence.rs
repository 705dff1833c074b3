//! Cache store: atomic write (temp file, rename), bincode serialization.
//! One file per repo, keyed by repo name, with a magic number and schema
//! version prefix so format changes can be detected as corruption rather
//! than silently misparsed.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};
use crate::storage::RepoSnapshot;

const MAGIC: &[u8; 4] = b"CTRC";
const SCHEMA_VERSION: u8 = 1;

pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn path_for(&self, repo_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{repo_name}.bin"))
    }

    pub fn exists(&self, repo_name: &str) -> bool {
        self.path_for(repo_name).exists()
    }

    /// Atomic write: serialize, write to a sibling temp file, fsync, rename
    /// over the final path.
    pub fn save(&self, snapshot: &RepoSnapshot) -> StorageResult<()> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| StorageError::Write { path: self.cache_dir.clone(), source: e })?;

        let payload = bincode::serialize(snapshot).map_err(|e| StorageError::Write {
            path: self.path_for(&snapshot.repo_name),
            source: std::io::Error::other(e),
        })?;

        let mut buf = Vec::with_capacity(payload.len() + 5);
        buf.extend_from_slice(MAGIC);
        buf.push(SCHEMA_VERSION);
        buf.extend_from_slice(&payload);

        let final_path = self.path_for(&snapshot.repo_name);
        let temp_path = final_path.with_extension("bin.tmp");

        let file = fs::File::create(&temp_path)
            .map_err(|e| StorageError::Write { path: temp_path.clone(), source: e })?;
        {
            let mut writer = std::io::BufWriter::new(&file);
            writer
                .write_all(&buf)
                .map_err(|e| StorageError::Write { path: temp_path.clone(), source: e })?;
        }
        file.sync_all().map_err(|e| StorageError::Write { path: temp_path.clone(), source: e })?;

        fs::rename(&temp_path, &final_path)
            .map_err(|e| StorageError::Write { path: final_path.clone(), source: e })?;

        Ok(())
    }

    /// On magic/version mismatch or decode failure, reports "not present"
    /// (`Ok(None)`) and logs a corruption notice rather than surfacing an
    /// error — the engine re-indexes.
    pub fn load(&self, repo_name: &str) -> StorageResult<Option<RepoSnapshot>> {
        let path = self.path_for(repo_name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| StorageError::Read { path: path.clone(), source: e })?;
        match decode(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(reason) => {
                tracing::warn!(path = %path.display(), reason, "cache corrupted, treating as miss");
                Ok(None)
            }
        }
    }

    pub fn clear(&self, repo_name: &str) -> std::io::Result<()> {
        let path = self.path_for(repo_name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<RepoSnapshot, String> {
    if bytes.len() < 5 || &bytes[0..4] != MAGIC {
        return Err("magic number mismatch".to_string());
    }
    if bytes[4] != SCHEMA_VERSION {
        return Err(format!("unsupported schema version {}", bytes[4]));
    }
    bincode::deserialize(&bytes[5..]).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(repo: &str) -> RepoSnapshot {
        RepoSnapshot::new(repo.to_string(), Vec::new(), Default::default())
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let snap = snapshot("repo-a");
        store.save(&snap).unwrap();
        assert!(store.exists("repo-a"));

        let loaded = store.load("repo-a").unwrap().unwrap();
        assert_eq!(loaded.repo_name, "repo-a");
    }

    #[test]
    fn missing_cache_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn corrupted_cache_is_treated_as_miss() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let snap = snapshot("repo-b");
        store.save(&snap).unwrap();

        fs::write(dir.path().join("repo-b.bin"), b"not a valid snapshot").unwrap();
        let result = store.load("repo-b").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn clear_removes_cache_file() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        store.save(&snapshot("repo-c")).unwrap();
        store.clear("repo-c").unwrap();
        assert!(!store.exists("repo-c"));
    }
}
