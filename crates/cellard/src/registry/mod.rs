//! Named database registry shared by every worker.
//!
//! The registry maps database names to open engine handles rooted at
//! `storage_root/<name>`. Handles are opened lazily on first use and cached, so
//! each name has at most one open engine instance at a time. Structural
//! changes (open, drop, close) are serialized behind a single `RwLock`; reads
//! of the handle table take the shared side of the lock and release it before
//! any key-level work begins.
//!
//! Known names are persisted to a JSON catalog so a restarted daemon still
//! lists databases created by an earlier run. The configured default database
//! is always present and cannot be dropped.

mod catalog;
mod database;
mod errors;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use self::catalog::Catalog;
pub use self::database::{Database, Entry};
pub use self::errors::{RegistryError, StorageError};

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Suffix of directories awaiting deletion. `~` never appears in a valid name.
const TOMBSTONE_SUFFIX: &str = "~dropped";

#[derive(Debug)]
struct State {
    open: HashMap<String, Arc<Database>>,
    catalog: Catalog,
}

/// Thread-safe table of named databases.
#[derive(Debug)]
pub struct Registry {
    storage_root: PathBuf,
    default_database: String,
    state: RwLock<State>,
}

impl Registry {
    /// Loads the catalog and makes sure the default database is registered.
    ///
    /// # Errors
    ///
    /// Fails if the default name is invalid, the storage root cannot be
    /// created, or the catalog cannot be read or written.
    pub fn open(
        storage_root: impl Into<PathBuf>,
        database_store: &Path,
        default_database: &str,
    ) -> Result<Self, RegistryError> {
        validate_name(default_database)?;
        let storage_root = storage_root.into();
        std::fs::create_dir_all(&storage_root).map_err(|source| RegistryError::StorageRoot {
            path: storage_root.clone(),
            source,
        })?;

        sweep_tombstones(&storage_root);
        let mut catalog = Catalog::load(database_store)?;
        if catalog.insert(default_database)? {
            info!(
                target: REGISTRY_TARGET,
                database = default_database,
                "registered default database"
            );
        }

        Ok(Self {
            storage_root,
            default_database: default_database.to_owned(),
            state: RwLock::new(State {
                open: HashMap::new(),
                catalog,
            }),
        })
    }

    /// Name used when a request omits the database.
    #[must_use]
    pub fn default_database(&self) -> &str {
        self.default_database.as_str()
    }

    /// Directory containing one subdirectory per database.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        self.storage_root.as_path()
    }

    /// Returns the open handle for `name`, opening and registering the
    /// database first if needed.
    ///
    /// Concurrent first-time callers all receive the same handle.
    ///
    /// # Errors
    ///
    /// Fails for invalid names, engine open failures and catalog write
    /// failures.
    pub fn resolve_or_open(&self, name: &str) -> Result<Arc<Database>, RegistryError> {
        validate_name(name)?;
        if let Some(handle) = self.read()?.open.get(name) {
            return Ok(Arc::clone(handle));
        }

        let mut state = self.write()?;
        if let Some(handle) = state.open.get(name) {
            return Ok(Arc::clone(handle));
        }
        // The catalog entry is written before the engine creates a directory.
        let registered = state.catalog.insert(name)?;
        let handle = match self.open_database(name) {
            Ok(database) => Arc::new(database),
            Err(error) => {
                if registered && let Err(rollback) = state.catalog.remove(name) {
                    warn!(target: REGISTRY_TARGET, database = name, %rollback, "failed to unregister database");
                }
                return Err(error);
            }
        };
        if registered {
            info!(target: REGISTRY_TARGET, database = name, "created database");
        }
        state.open.insert(name.to_owned(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Explicitly creates (or reopens) a database.
    ///
    /// # Errors
    ///
    /// See [`Registry::resolve_or_open`].
    pub fn create(&self, name: &str) -> Result<Arc<Database>, RegistryError> {
        self.resolve_or_open(name)
    }

    /// Returns whether `name` is a known database.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn contains(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.read()?.catalog.contains(name))
    }

    /// Destroys a database and forgets its name.
    ///
    /// The directory is first moved aside, then the catalog is updated, and
    /// only then are the files deleted. If the catalog cannot be written the
    /// directory is moved back and the database stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown names,
    /// [`RegistryError::DefaultDatabase`] for the default database and
    /// [`RegistryError::InUse`] while any request still holds the handle. In
    /// those cases nothing is changed.
    pub fn drop_database(&self, name: &str) -> Result<(), RegistryError> {
        validate_name(name)?;
        if name == self.default_database {
            return Err(RegistryError::DefaultDatabase {
                name: name.to_owned(),
            });
        }
        let mut state = self.write()?;
        if !state.catalog.contains(name) {
            return Err(RegistryError::NotFound {
                name: name.to_owned(),
            });
        }

        if let Some(handle) = state.open.get(name) {
            if Arc::strong_count(handle) > 1 {
                debug!(target: REGISTRY_TARGET, database = name, "drop refused, handle in use");
                return Err(RegistryError::InUse {
                    name: name.to_owned(),
                });
            }
            if let Err(error) = handle.flush() {
                warn!(target: REGISTRY_TARGET, database = name, %error, "flush before drop failed");
            }
        }
        // The engine releases its files once the last handle is gone.
        state.open.remove(name);

        let path = self.database_path(name);
        let tombstone = self.tombstone_path(name);
        if let Err(error) = std::fs::remove_dir_all(&tombstone)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(target: REGISTRY_TARGET, database = name, %error, "stale dropped files remain");
        }
        let moved = match std::fs::rename(&path, &tombstone) {
            Ok(()) => true,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => false,
            Err(source) => {
                return Err(RegistryError::storage(
                    name,
                    StorageError::Destroy { path, source },
                ));
            }
        };

        if let Err(error) = state.catalog.remove(name) {
            if moved && let Err(restore) = std::fs::rename(&tombstone, &path) {
                warn!(
                    target: REGISTRY_TARGET,
                    database = name,
                    %restore,
                    "failed to restore database directory"
                );
            }
            return Err(error);
        }

        if moved && let Err(error) = std::fs::remove_dir_all(&tombstone) {
            warn!(
                target: REGISTRY_TARGET,
                database = name,
                path = %tombstone.display(),
                %error,
                "failed to delete dropped database files"
            );
        }
        info!(target: REGISTRY_TARGET, database = name, "dropped database");
        Ok(())
    }

    /// Snapshot of the known database names, sorted.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn list(&self) -> Result<std::vec::IntoIter<String>, RegistryError> {
        let names: Vec<String> = self.read()?.catalog.names().cloned().collect();
        Ok(names.into_iter())
    }

    /// Flushes and releases every open handle.
    ///
    /// Handles still held elsewhere stay usable; they close when their last
    /// clone is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure after attempting every database.
    pub fn close_all(&self) -> Result<(), RegistryError> {
        let handles: Vec<(String, Arc<Database>)> = self.write()?.open.drain().collect();
        let mut first_error = None;
        for (name, handle) in handles {
            match handle.flush() {
                Ok(()) => debug!(target: REGISTRY_TARGET, database = %name, "closed database"),
                Err(error) => {
                    warn!(target: REGISTRY_TARGET, database = %name, %error, "flush on close failed");
                    if first_error.is_none() {
                        first_error = Some(RegistryError::storage(name, error));
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Number of currently open handles.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.read().map(|state| state.open.len()).unwrap_or_default()
    }

    fn open_database(&self, name: &str) -> Result<Database, RegistryError> {
        let path = self.database_path(name);
        debug!(target: REGISTRY_TARGET, database = name, path = %path.display(), "opening database");
        Database::open(&path).map_err(|error| RegistryError::storage(name, error))
    }

    fn database_path(&self, name: &str) -> PathBuf {
        self.storage_root.join(name)
    }

    fn tombstone_path(&self, name: &str) -> PathBuf {
        self.storage_root.join(format!("{name}{TOMBSTONE_SUFFIX}"))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RegistryError> {
        self.state.read().map_err(|_| RegistryError::Internal)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RegistryError> {
        self.state.write().map_err(|_| RegistryError::Internal)
    }
}

/// Deletes directories left behind by a drop that was interrupted.
fn sweep_tombstones(storage_root: &Path) {
    let Ok(entries) = std::fs::read_dir(storage_root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tombstone = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(TOMBSTONE_SUFFIX));
        if !is_tombstone {
            continue;
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => debug!(target: REGISTRY_TARGET, path = %path.display(), "removed dropped database files"),
            Err(error) => {
                warn!(target: REGISTRY_TARGET, path = %path.display(), %error, "failed to remove dropped database files");
            }
        }
    }
}

/// Rejects names that would escape the storage root or collide with
/// filesystem conventions.
pub(super) fn validate_name(name: &str) -> Result<(), RegistryError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is reserved")
    } else if !name
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'))
    {
        Some("only ASCII letters, digits, '-', '_' and '.' are allowed")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RegistryError::InvalidName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}
