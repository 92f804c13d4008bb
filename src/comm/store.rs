use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

/// Opaque string key/value storage. Values are JSON text.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !key.starts_with('.')
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !valid_key(key) {
            anyhow::bail!("invalid store key: {key:?}");
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        // Write beside the target and rename so readers never see a torn payload.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .with_context(|| format!("failed to stage write in {}", self.root.display()))?;
        tmp.write_all(value.as_bytes())
            .with_context(|| format!("failed to stage {}", path.display()))?;
        tmp.persist(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_roundtrip_and_remove() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path().join("local"));

        assert_eq!(store.get("commHistoryV1").expect("get"), None);
        store.set("commHistoryV1", "[]").expect("set");
        assert_eq!(store.get("commHistoryV1").expect("get").as_deref(), Some("[]"));

        store.remove("commHistoryV1").expect("remove");
        store.remove("commHistoryV1").expect("remove twice");
        assert_eq!(store.get("commHistoryV1").expect("get"), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        assert!(store.set("../escape", "{}").is_err());
        assert!(store.get("").is_err());
    }
}
