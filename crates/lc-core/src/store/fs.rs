//! Filesystem object store.
//!
//! Keys map to files beneath a root directory. Writes land in a sibling
//! temp file first and are renamed over the target, so readers never see a
//! half-written artifact.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use super::{ObjectStore, StoreError};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    pub root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path for `key`; keys may not escape the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if key.is_empty() || key.ends_with('/') {
            return Err(invalid("key must name an object"));
        }
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => return Err(invalid("key must be a relative path without '..'")),
            }
        }
        Ok(self.root.join(relative))
    }

    fn io_error(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key has no parent directory".to_string(),
            })?;
        fs::create_dir_all(parent).map_err(|e| Self::io_error(key, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(
            ".{}.tmp-{}",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(body)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(Self::io_error(key, e));
        }

        tracing::trace!(key, bytes = body.len(), "object written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        let key = "collated/current/call_log/user=100/logs";

        store.put(key, b"payload").unwrap();
        assert_eq!(store.get(key).unwrap(), b"payload");
        assert!(dir.path().join(key).is_file());

        store.put(key, b"second").unwrap();
        assert_eq!(store.get(key).unwrap(), b"second");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.put("a/b", b"x").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path().join("a"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        let err = store.get("collated/diff/x/logs").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let store = FsObjectStore::new("/tmp/lc-store");
        assert!(matches!(
            store.path_for("../etc/passwd"),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.path_for("/etc/passwd"),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.path_for(""),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(store.path_for("user-1/device-2/sms_log").is_ok());
    }
}
