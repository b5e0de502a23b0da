//! Object store abstraction.
//!
//! The collator only needs whole-object `get` and `put` on string keys, with
//! a "not found" outcome that callers can tell apart from every other
//! failure.

pub mod fs;
pub mod keys;
pub mod memory;

pub use fs::FsObjectStore;
pub use keys::ArtifactKeys;
pub use memory::MemoryObjectStore;

use thiserror::Error;

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no object at key {0}")]
    NotFound(String),

    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("I/O error at key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Key the failure refers to, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::NotFound(key)
            | StoreError::InvalidKey { key, .. }
            | StoreError::Io { key, .. } => Some(key),
            StoreError::Unavailable(_) => None,
        }
    }
}

impl From<StoreError> for lc_common::Error {
    fn from(err: StoreError) -> Self {
        lc_common::Error::Storage {
            key: err.key().unwrap_or_default().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Whole-object byte storage addressed by `/`-separated keys.
pub trait ObjectStore: Send + Sync {
    /// Fetch the object at `key`, or `StoreError::NotFound`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the object at `key`.
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// `get` with absence folded into `None`.
    fn get_optional(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.get(key) {
            Ok(body) => Ok(Some(body)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_optional_folds_not_found() {
        let store = MemoryObjectStore::new();
        assert_eq!(store.get_optional("a/b").unwrap(), None);
        store.put("a/b", b"x").unwrap();
        assert_eq!(store.get_optional("a/b").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_store_error_maps_to_storage() {
        let err: lc_common::Error = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.code(), 30);
        let err: lc_common::Error = StoreError::NotFound("k".into()).into();
        assert!(err.to_string().contains("k"));
    }
}
