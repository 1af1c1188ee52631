//! Path safety: protected-path tables, path resolution and plan validation.

mod protected;
mod validator;

use std::path::{Component, Path, PathBuf};

pub use protected::{Platform, ProtectedPaths};
pub use validator::{
    PathRole, SafetyIssue, SafetyValidationResult, SafetyValidator,
    DEFAULT_DELETION_WARNING_THRESHOLD,
};

/// Normalize a path by resolving `.` and `..` components without requiring
/// the path to exist.
///
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Never pops past the root or prefix
                if normalized.file_name().is_some() {
                    normalized.pop();
                }
            }
            Component::CurDir => {}
            Component::Normal(name) => normalized.push(name),
            Component::RootDir => normalized.push(Component::RootDir),
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
        }
    }

    normalized
}

/// Resolve a path to its canonical absolute form, even when its tail does
/// not exist yet.
///
/// The longest existing ancestor is canonicalized by the OS (following
/// symlinks, with `..` applied after link resolution), and the remaining
/// components are appended lexically. Relative paths are taken relative to
/// `base`.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }

    let components: Vec<Component> = absolute.components().collect();
    for split in (1..components.len()).rev() {
        let head: PathBuf = components[..split].iter().collect();
        if let Ok(canonical) = head.canonicalize() {
            let mut resolved = canonical;
            for component in &components[split..] {
                match component {
                    Component::ParentDir => {
                        if resolved.file_name().is_some() {
                            resolved.pop();
                        }
                    }
                    Component::CurDir => {}
                    other => resolved.push(other.as_os_str()),
                }
            }
            return resolved;
        }
    }

    normalize_path(&absolute)
}

/// Check if `path` equals or is contained in `parent`
pub fn is_subpath(path: &Path, parent: &Path) -> bool {
    path.starts_with(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_folds_parent_refs() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_path(Path::new("/../../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn test_resolve_missing_tail() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();

        let resolved = resolve_path(&dir.path().join("new/sub/../file.txt"), dir.path());
        assert_eq!(resolved, root.join("new/file.txt"));
    }

    #[test]
    fn test_resolve_escape_via_parent_refs() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        std::fs::create_dir(&scope).unwrap();

        let resolved = resolve_path(&scope.join("../outside.txt"), &scope);
        assert!(!is_subpath(&resolved, &scope.canonicalize().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_follows_symlinks() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        let outside = dir.path().join("outside");
        std::fs::create_dir(&scope).unwrap();
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, scope.join("link")).unwrap();

        let resolved = resolve_path(&scope.join("link/file.txt"), &scope);
        assert!(resolved.starts_with(outside.canonicalize().unwrap()));
        assert!(!is_subpath(&resolved, &scope.canonicalize().unwrap()));
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let dir = tempdir().unwrap();
        let resolved = resolve_path(Path::new("docs/a.txt"), dir.path());
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("docs/a.txt"));
    }
}
