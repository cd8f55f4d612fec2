//! Crash-safe file replacement for the catalog and the runtime snapshots.

use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Replaces the file at `path` with `contents` in a single rename.
///
/// The payload is staged in a hidden sibling file and fsync'd before the
/// rename, so readers see either the old or the new contents.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut staged = staging_builder().tempfile_in(staging_directory(path)?)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}

fn staging_directory(path: &Path) -> io::Result<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )),
    }
}

fn staging_builder() -> Builder<'static, 'static> {
    let mut builder = Builder::new();
    builder.prefix(".cellard-").suffix(".staged");
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o600));
    }
    builder
}
