// src/utils/fs.rs
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{UtilResult, UtilError};

/// Make `path` absolute and resolve `.`/`..` lexically, without touching the filesystem
pub fn normalize_path(path: &Path) -> UtilResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| UtilError::PathError {
                path: path.to_path_buf(),
                message: format!("Failed to resolve current directory: {}", e),
            })?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Create a directory and all its missing parents. Calling it again is a no-op.
///
/// When the last component has an extension (`out/report.txt`) the path is
/// treated as a file: its parents are created and an empty file is created if
/// none exists yet. Existing files are never truncated.
pub fn make_dirs(path: &Path) -> UtilResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(UtilError::PathError {
            path: path.to_path_buf(),
            message: "Empty path".to_string(),
        });
    }

    let target = normalize_path(path)?;
    let is_file = target.extension().is_some() && !target.is_dir();

    let dir = if is_file {
        target.parent().map(Path::to_path_buf).unwrap_or_else(|| target.clone())
    } else {
        target.clone()
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| UtilError::PathError {
            path: dir.clone(),
            message: format!("Failed to create directory: {}", e),
        })?;

    if is_file && !target.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .map_err(|e| UtilError::PathError {
                path: target.clone(),
                message: format!("Failed to create file: {}", e),
            })?;
    }

    debug!("Ensured {} exists", target.display());
    Ok(target)
}

/// Remove a directory tree. Returns `false` when there was nothing to remove.
///
/// The filesystem root is refused.
pub fn remove_dirs(path: &Path) -> UtilResult<bool> {
    if path.as_os_str().is_empty() {
        return Err(UtilError::PathError {
            path: path.to_path_buf(),
            message: "Empty path".to_string(),
        });
    }

    let target = normalize_path(path)?;
    if target.parent().is_none() {
        warn!("Refusing to remove filesystem root {}", target.display());
        return Err(UtilError::PathError {
            path: target,
            message: "Refusing to remove the filesystem root".to_string(),
        });
    }

    if !target.exists() {
        debug!("Nothing to remove at {}", target.display());
        return Ok(false);
    }

    let result = if target.is_dir() {
        std::fs::remove_dir_all(&target)
    } else {
        std::fs::remove_file(&target)
    };
    result.map_err(|e| UtilError::PathError {
        path: target.clone(),
        message: format!("Failed to remove: {}", e),
    })?;

    debug!("Removed {}", target.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resolves_parent_dirs() {
        let normalized = normalize_path(Path::new("/tmp/one/../mydir/./x")).unwrap();
        assert_eq!(normalized, PathBuf::from("/tmp/mydir/x"));
        assert!(normalize_path(Path::new("rel")).unwrap().is_absolute());
    }

    #[test]
    fn test_make_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ztmp3/ztmp4");

        make_dirs(&nested).unwrap();
        make_dirs(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_make_dirs_skips_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let created = make_dirs(&dir.path().join("one/../mydir/")).unwrap();

        assert!(created.is_dir());
        assert!(dir.path().join("mydir").is_dir());
        assert!(!dir.path().join("one").exists());
    }

    #[test]
    fn test_make_dirs_with_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ztmp2/myfile.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "keep").unwrap();

        make_dirs(&file).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "keep");

        let fresh = dir.path().join("other/new.txt");
        make_dirs(&fresh).unwrap();
        assert!(fresh.is_file());
    }

    #[test]
    fn test_remove_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ztmp/ztmp2");
        make_dirs(&nested.join("deep")).unwrap();

        assert!(remove_dirs(&nested).unwrap());
        assert!(!nested.exists());
        assert!(!remove_dirs(&nested).unwrap());
    }

    #[test]
    fn test_remove_dirs_refuses_root() {
        let err = remove_dirs(Path::new("/")).unwrap_err();
        assert!(matches!(err, UtilError::PathError { .. }));
        assert!(remove_dirs(Path::new("")).is_err());
    }
}
