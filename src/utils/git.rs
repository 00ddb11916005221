// src/utils/git.rs
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::UtilResult;
use super::shell::command_stdout;

fn git_command(dir: Option<&Path>, args: &str) -> String {
    match dir {
        Some(dir) => format!("git -C '{}' {}", dir.display().to_string().replace('\'', r"'\''"), args),
        None => format!("git {}", args),
    }
}

/// Top-level directory of the repository containing `dir` (or the current directory)
pub async fn repo_root(dir: Option<&Path>) -> UtilResult<PathBuf> {
    let root = command_stdout(&git_command(dir, "rev-parse --show-toplevel"), false).await?;
    debug!("Git repository root: {}", root);
    Ok(PathBuf::from(root))
}

/// Hash of the commit checked out in the repository containing `dir`
pub async fn current_hash(dir: Option<&Path>, short: bool) -> UtilResult<String> {
    let args = if short { "rev-parse --short HEAD" } else { "rev-parse HEAD" };
    let hash = command_stdout(&git_command(dir, args), false).await?;
    debug!("Git HEAD: {}", hash);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UtilError;

    #[test]
    fn test_git_command_quotes_dir() {
        assert_eq!(git_command(None, "status"), "git status");
        assert_eq!(
            git_command(Some(Path::new("/tmp/it's")), "status"),
            r"git -C '/tmp/it'\''s' status"
        );
    }

    #[tokio::test]
    async fn test_outside_repository_is_error() {
        let dir = tempfile::tempdir().unwrap();
        match repo_root(Some(dir.path())).await {
            // A temp dir nested in a checkout still resolves
            Ok(root) => assert!(dir.path().starts_with(&root)),
            Err(err) => assert!(matches!(err, UtilError::ExternalToolError { .. })),
        }
    }
}
