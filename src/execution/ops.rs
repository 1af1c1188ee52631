//! Filesystem primitives used by the executor and the undo manager.
//!
//! Every helper returns a human-readable reason on failure; callers put it
//! into the audit log and the execution result as-is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recoverable delete. Implementations must never unlink permanently.
pub trait RecoverableTrash: Send + Sync {
    fn send_to_trash(&self, path: &Path) -> Result<(), String>;

    /// Short name used in logs and undo reasons
    fn name(&self) -> &'static str {
        "Trash"
    }
}

/// The desktop trash of the host OS (Trash on macOS, Recycle Bin on
/// Windows, the freedesktop.org trash on Linux).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTrash;

impl RecoverableTrash for SystemTrash {
    fn send_to_trash(&self, path: &Path) -> Result<(), String> {
        trash::delete(path).map_err(|e| {
            let err_str = e.to_string();
            // macOS reports iCloud placeholders as error -8013
            if err_str.contains("-8013") || err_str.contains("needs to be downloaded") {
                format!(
                    "{} is stored in iCloud and must be downloaded before it can be moved to Trash",
                    path.display()
                )
            } else {
                format!("Failed to move {} to Trash: {}", path.display(), err_str)
            }
        })
    }

    #[cfg(target_os = "windows")]
    fn name(&self) -> &'static str {
        "Recycle Bin"
    }
}

/// Whether anything (file, directory or symlink) occupies `path`
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Create a folder and all of its parents. Existing folders are fine.
///
/// Returns `true` only when the folder did not exist before the call.
pub fn create_dir_all(path: &Path) -> Result<bool, String> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)
        .map(|_| true)
        .map_err(|e| format!("Failed to create folder {}: {}", path.display(), e))
}

/// Move `source` to `destination`, creating the destination's parent.
///
/// Uses an atomic rename, falling back to copy+remove only when the rename
/// crosses volumes. Refuses to overwrite an existing destination. On error
/// the source is left where it was and no partial copy remains, except
/// when a directory source could only be partly removed; then the complete
/// copy at `destination` is kept and named in the error.
pub fn move_path(source: &Path, destination: &Path) -> Result<(), String> {
    if !path_exists(source) {
        return Err(format!("Source file not found: {}", source.display()));
    }
    if path_exists(destination) {
        return Err(format!(
            "Destination already exists: {}",
            destination.display()
        ));
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create destination directory: {}", e))?;
        }
    }

    let rename_err = match fs::rename(source, destination) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if !is_cross_device(&rename_err) {
        return Err(format!(
            "Failed to move {} to {}: {}",
            source.display(),
            destination.display(),
            rename_err
        ));
    }

    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        error = %rename_err,
        "Rename crosses volumes, falling back to copy"
    );

    let is_dir = source.is_dir();
    let copied = if is_dir {
        copy_dir_all(source, destination)
    } else {
        fs::copy(source, destination)
            .map(|_| ())
            .map_err(|e| format!("Failed to copy: {}", e))
    };

    if let Err(copy_err) = copied {
        // Leave the source as the only copy
        discard_copy(destination);
        return Err(format!(
            "Failed to move {} to {}: {} ({})",
            source.display(),
            destination.display(),
            rename_err,
            copy_err
        ));
    }

    if is_dir {
        fs::remove_dir_all(source).map_err(|e| {
            format!(
                "Failed to remove source {}: {}. Complete copy kept at {}",
                source.display(),
                e,
                destination.display()
            )
        })
    } else {
        fs::remove_file(source).map_err(|e| {
            discard_copy(destination);
            format!("Failed to remove source {}: {}", source.display(), e)
        })
    }
}

fn discard_copy(destination: &Path) {
    let removed = if destination.is_dir() {
        fs::remove_dir_all(destination)
    } else {
        fs::remove_file(destination)
    };
    if let Err(e) = removed {
        tracing::warn!(path = %destination.display(), error = %e, "Failed to remove partial copy");
    }
}

/// Whether a rename failed only because source and destination sit on
/// different volumes
fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18; // EXDEV
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17; // ERROR_NOT_SAME_DEVICE

    #[cfg(any(unix, windows))]
    {
        err.raw_os_error() == Some(CROSS_DEVICE)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Remove `path` only if it is an empty directory.
///
/// Returns `Ok(false)` when there is nothing to remove or the directory is
/// not empty.
pub fn remove_empty_dir(path: &Path) -> Result<bool, String> {
    if !is_empty_dir(path) {
        return Ok(false);
    }
    fs::remove_dir(path)
        .map(|_| true)
        .map_err(|e| format!("Failed to remove folder {}: {}", path.display(), e))
}

pub fn is_empty_dir(path: &Path) -> bool {
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
}

/// Helper function to copy a directory recursively
fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), String> {
    fs::create_dir_all(dst).map_err(|e| format!("Failed to create directory: {}", e))?;

    for entry in fs::read_dir(src).map_err(|e| format!("Failed to read directory: {}", e))? {
        let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
        let ty = entry
            .file_type()
            .map_err(|e| format!("Failed to get file type: {}", e))?;

        let src_path = entry.path();
        let dst_path: PathBuf = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| format!("Failed to copy file: {}", e))?;
        }
    }

    Ok(())
}

/// Run a blocking filesystem operation on tokio's blocking pool
pub(crate) async fn run_blocking<F, T>(op: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| format!("Task failed: {}", e))?
}
