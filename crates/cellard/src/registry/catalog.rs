//! Persisted list of known database names.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{REGISTRY_TARGET, validate_name};
use super::errors::RegistryError;
use crate::files::atomic_write;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    databases: BTreeSet<String>,
}

/// Names of every database the daemon has created.
#[derive(Debug)]
pub(crate) struct Catalog {
    path: PathBuf,
    names: BTreeSet<String>,
}

impl Catalog {
    /// Loads the catalog, treating a missing file as empty.
    pub(crate) fn load(path: &Path) -> Result<Self, RegistryError> {
        let names = match fs::read(path) {
            Ok(bytes) => {
                let file: CatalogFile = serde_json::from_slice(&bytes)
                    .map_err(|error| RegistryError::catalog(path, "malformed catalog", error))?;
                valid_names(path, file.databases)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(target: REGISTRY_TARGET, path = %path.display(), "no catalog yet");
                BTreeSet::new()
            }
            Err(error) => {
                return Err(RegistryError::catalog(path, "failed to read catalog", error));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            names,
        })
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    /// Adds a name and persists. Returns false if it was already present.
    pub(crate) fn insert(&mut self, name: &str) -> Result<bool, RegistryError> {
        if !self.names.insert(name.to_owned()) {
            return Ok(false);
        }
        if let Err(error) = self.persist() {
            self.names.remove(name);
            return Err(error);
        }
        Ok(true)
    }

    /// Removes a name and persists. On failure the name stays registered.
    pub(crate) fn remove(&mut self, name: &str) -> Result<(), RegistryError> {
        if !self.names.remove(name) {
            return Ok(());
        }
        if let Err(error) = self.persist() {
            self.names.insert(name.to_owned());
            return Err(error);
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|error| {
                RegistryError::catalog(&self.path, "failed to create catalog directory", error)
            })?;
        }
        let file = CatalogFile {
            databases: self.names.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|error| RegistryError::catalog(&self.path, "failed to encode catalog", error))?;
        atomic_write(&self.path, &bytes)
            .map_err(|error| RegistryError::catalog(&self.path, "failed to write catalog", error))
    }
}

/// Drops entries that could not have been created through the registry.
fn valid_names(path: &Path, names: BTreeSet<String>) -> BTreeSet<String> {
    names
        .into_iter()
        .filter(|name| match validate_name(name) {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    target: REGISTRY_TARGET,
                    path = %path.display(),
                    %error,
                    "ignoring catalog entry"
                );
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_catalog() {
        let dir = tempfile::tempdir().expect("temp dir");
        let catalog = Catalog::load(&dir.path().join("databases.json")).expect("load");
        assert_eq!(catalog.names().count(), 0);
    }

    #[test]
    fn insertions_survive_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("databases.json");
        let mut catalog = Catalog::load(&path).expect("load");
        assert!(catalog.insert("users").expect("insert"));
        assert!(!catalog.insert("users").expect("insert twice"));
        catalog.insert("orders").expect("insert");
        catalog.remove("users").expect("remove");

        let reloaded = Catalog::load(&path).expect("reload");
        let names: Vec<_> = reloaded.names().cloned().collect();
        assert_eq!(names, ["orders"]);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("databases.json");
        fs::write(&path, b"not json").expect("write");
        let error = Catalog::load(&path).expect_err("malformed");
        assert!(matches!(error, RegistryError::Catalog { .. }));
    }

    #[test]
    fn invalid_entries_are_ignored_on_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("databases.json");
        fs::write(&path, br#"{"databases": ["../escape", "", "orders", "a/b"]}"#).expect("write");
        let catalog = Catalog::load(&path).expect("load");
        let names: Vec<_> = catalog.names().cloned().collect();
        assert_eq!(names, ["orders"]);
    }

    #[test]
    fn failed_removal_keeps_the_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("databases.json");
        let mut catalog = Catalog::load(&path).expect("load");
        catalog.insert("users").expect("insert");

        fs::remove_file(&path).expect("remove catalog file");
        fs::create_dir(&path).expect("occupy catalog path");
        fs::write(path.join("occupant"), b"").expect("fill directory");

        catalog.remove("users").expect_err("write must fail");
        assert!(catalog.contains("users"));
    }
}
