//! A single open database.

use std::ops::Bound;
use std::path::Path;

use super::errors::StorageError;

/// Handle to one embedded engine instance.
///
/// Handles are shared as `Arc<Database>`. Key-level operations go straight to
/// the engine; the registry only serializes opening and dropping.
#[derive(Debug)]
pub struct Database {
    tree: sled::Db,
}

/// Key/value pair returned by range scans.
pub type Entry = (String, String);

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self, StorageError> {
        let tree = sled::Config::new().path(path).open()?;
        Ok(Self { tree })
    }

    /// Fetches the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.tree
            .get(key.as_bytes())?
            .map(|value| decode_text(key, &value))
            .transpose()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.tree.remove(key.as_bytes())?.is_some())
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.tree.contains_key(key.as_bytes())?)
    }

    /// Collects up to `limit` entries within `bounds`, in key order.
    pub fn range(
        &self,
        bounds: (Bound<&str>, Bound<&str>),
        limit: Option<usize>,
    ) -> Result<Vec<Entry>, StorageError> {
        let bounds = (
            bounds.0.map(str::as_bytes),
            bounds.1.map(str::as_bytes),
        );
        let limit = limit.unwrap_or(usize::MAX);
        let mut entries = Vec::new();
        for item in self.tree.range::<&[u8], _>(bounds).take(limit) {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec()).map_err(|error| StorageError::InvalidUtf8 {
                key: String::from_utf8_lossy(error.as_bytes()).into_owned(),
            })?;
            let value = decode_text(&key, &value)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Writes dirty buffers to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}

fn decode_text(key: &str, bytes: &[u8]) -> Result<String, StorageError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| StorageError::InvalidUtf8 {
            key: key.to_owned(),
        })
}
