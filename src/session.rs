// src/session.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::{info, debug};

use crate::error::{UtilResult, UtilError};
use crate::table::Table;

/// A saved variable: either a table or any JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Variable {
    Table(Table),
    Value(serde_json::Value),
}

impl From<Table> for Variable {
    fn from(table: Table) -> Self {
        Variable::Table(table)
    }
}

impl From<serde_json::Value> for Variable {
    fn from(value: serde_json::Value) -> Self {
        Variable::Value(value)
    }
}

/// Named variables captured together
pub type Snapshot = BTreeMap<String, Variable>;

/// One saved snapshot on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub name: String,
    pub tag: String,
    pub path: PathBuf,
    pub variables: Vec<String>,
}

/// Saves and restores snapshots under `<root>/<name>_<tag>/<variable>.json`
#[derive(Debug, Clone)]
pub struct Session {
    root: PathBuf,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save every variable of `snapshot`.
    ///
    /// An explicit tag overwrites an earlier save with the same tag. Without a
    /// tag, a millisecond UTC timestamp is used and a fresh directory is always
    /// created, so two quick saves never merge. Tags may not contain `_`,
    /// which separates them from the session name on disk.
    pub fn save(&self, name: &str, snapshot: &Snapshot, tag: Option<&str>) -> UtilResult<PathBuf> {
        validate_component(name, "session name")?;

        let create_error = |dir: &Path, e: std::io::Error| UtilError::PathError {
            path: dir.to_path_buf(),
            message: format!("Failed to create directory: {}", e),
        };

        let dir = match tag {
            Some(tag) => {
                validate_tag(tag)?;
                let dir = self.root.join(format!("{}_{}", name, tag));
                std::fs::create_dir_all(&dir).map_err(|e| create_error(dir.as_path(), e))?;
                dir
            }
            None => {
                std::fs::create_dir_all(&self.root).map_err(|e| create_error(self.root.as_path(), e))?;
                let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
                let mut attempt = 1;
                loop {
                    let tag = if attempt == 1 { stamp.clone() } else { format!("{}-{}", stamp, attempt) };
                    let dir = self.root.join(format!("{}_{}", name, tag));
                    match std::fs::create_dir(&dir) {
                        Ok(()) => break dir,
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                        Err(e) => return Err(create_error(dir.as_path(), e)),
                    }
                }
            }
        };

        for (var, value) in snapshot {
            validate_component(var, "variable name")?;
            let path = dir.join(format!("{}.json", var));
            let content = serde_json::to_vec(value)
                .map_err(|e| UtilError::SerializationError(format!("Failed to serialize {}: {}", var, e)))?;
            std::fs::write(&path, content)
                .map_err(|e| UtilError::FileError {
                    path: path.clone(),
                    message: format!("Failed to write file: {}", e),
                })?;
            debug!("Saved variable {} to {}", var, path.display());
        }

        info!("Saved session {} ({} variables) to {}", name, snapshot.len(), dir.display());
        Ok(dir)
    }

    /// Load a snapshot. Without a tag, the latest tag saved under `name` is used.
    pub fn load(&self, name: &str, tag: Option<&str>) -> UtilResult<Snapshot> {
        if let Some(tag) = tag {
            validate_tag(tag)?;
        }
        let entry = {
            let mut candidates: Vec<SessionEntry> = self.list()?
                .into_iter()
                .filter(|e| e.name == name && tag.map_or(true, |t| e.tag == t))
                .collect();
            candidates.sort_by(|a, b| a.tag.cmp(&b.tag));
            candidates.pop().ok_or_else(|| UtilError::PathError {
                path: self.root.join(format!("{}_{}", name, tag.unwrap_or("*"))),
                message: "No saved session found".to_string(),
            })?
        };

        let mut snapshot = Snapshot::new();
        for var in &entry.variables {
            let path = entry.path.join(format!("{}.json", var));
            let content = std::fs::read(&path)
                .map_err(|e| UtilError::FileError {
                    path: path.clone(),
                    message: format!("Failed to read file: {}", e),
                })?;
            let value: Variable = serde_json::from_slice(&content)
                .map_err(|e| UtilError::SerializationError(format!("Failed to parse {}: {}", path.display(), e)))?;
            snapshot.insert(var.clone(), value);
        }

        info!("Loaded session {} tag {} ({} variables)", entry.name, entry.tag, snapshot.len());
        Ok(snapshot)
    }

    /// List saved snapshots, sorted by name then tag
    pub fn list(&self) -> UtilResult<Vec<SessionEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let read_error = |e: std::io::Error| UtilError::PathError {
            path: self.root.clone(),
            message: format!("Failed to read session directory: {}", e),
        };

        let mut entries = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root).map_err(read_error)? {
            let path = dir_entry.map_err(read_error)?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((name, tag)) = split_dir_name(dir_name) else {
                continue;
            };

            let mut variables = Vec::new();
            for file in std::fs::read_dir(&path).map_err(read_error)? {
                let file = file.map_err(read_error)?.path();
                if file.extension().map_or(false, |ext| ext == "json") {
                    if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                        variables.push(stem.to_string());
                    }
                }
            }
            variables.sort();

            entries.push(SessionEntry {
                name: name.to_string(),
                tag: tag.to_string(),
                path,
                variables,
            });
        }

        entries.sort_by(|a, b| (&a.name, &a.tag).cmp(&(&b.name, &b.tag)));
        Ok(entries)
    }

    /// Log every saved snapshot
    pub fn show(&self) -> UtilResult<Vec<SessionEntry>> {
        let entries = self.list()?;
        info!("{} saved sessions under {}", entries.len(), self.root.display());
        for entry in &entries {
            info!("  {} [{}]: {}", entry.name, entry.tag, entry.variables.join(", "));
        }
        Ok(entries)
    }
}

fn validate_component(value: &str, what: &str) -> UtilResult<()> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(UtilError::InvalidInput(format!("Invalid {}: {:?}", what, value)));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> UtilResult<()> {
    validate_component(tag, "session tag")?;
    if tag.contains('_') {
        return Err(UtilError::InvalidInput(format!("Session tag may not contain '_': {:?}", tag)));
    }
    Ok(())
}

/// Split `<name>_<tag>`; the tag never contains '_'
fn split_dir_name(dir_name: &str) -> Option<(&str, &str)> {
    dir_name.rsplit_once('_').filter(|(name, tag)| !name.is_empty() && !tag.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn sample_table() -> Table {
        Table::from_rows(
            ["a", "b"],
            (0..10).map(|i| vec![Cell::Number(i as f64 * 0.1), Cell::from("x")]).collect(),
        ).unwrap()
    }

    #[test]
    fn test_save_then_load_restores_table() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path().join("session"));
        let df = sample_table();

        let mut snapshot = Snapshot::new();
        snapshot.insert("df".to_string(), df.clone().into());
        snapshot.insert("verbosity".to_string(), serde_json::json!(40).into());

        let saved = sess.save("mysess", &snapshot, Some("01")).unwrap();
        assert!(saved.join("df.json").exists());

        let loaded = sess.load("mysess", Some("01")).unwrap();
        match &loaded["df"] {
            Variable::Table(t) => {
                assert_eq!(t.n_rows(), df.n_rows());
                assert_eq!(t.checksum(), df.checksum());
            }
            other => panic!("unexpected variable: {:?}", other),
        }
        assert_eq!(loaded["verbosity"], Variable::Value(serde_json::json!(40)));
    }

    #[test]
    fn test_load_without_tag_uses_latest() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path());

        let mut first = Snapshot::new();
        first.insert("n".to_string(), serde_json::json!(1).into());
        let mut second = Snapshot::new();
        second.insert("n".to_string(), serde_json::json!(2).into());

        sess.save("mysess", &first, Some("01")).unwrap();
        sess.save("mysess", &second, Some("02")).unwrap();

        let latest = sess.load("mysess", None).unwrap();
        assert_eq!(latest["n"], Variable::Value(serde_json::json!(2)));

        let entries = sess.show().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.variables == vec!["n".to_string()]));
    }

    #[test]
    fn test_default_tag_is_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path());
        sess.save("my_sess", &Snapshot::new(), None).unwrap();

        let entries = sess.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "my_sess");
        let tag = &entries[0].tag;
        assert!(!tag.contains('_'));
        assert!(chrono::NaiveDateTime::parse_from_str(&tag[..15], "%Y%m%dT%H%M%S").is_ok());
    }

    #[test]
    fn test_quick_tagless_saves_stay_separate() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path());

        let mut first = Snapshot::new();
        first.insert("a".to_string(), serde_json::json!(1).into());
        let mut second = Snapshot::new();
        second.insert("b".to_string(), serde_json::json!(2).into());

        let first_dir = sess.save("mysess", &first, None).unwrap();
        let second_dir = sess.save("mysess", &second, None).unwrap();
        assert_ne!(first_dir, second_dir);

        let entries = sess.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.name == "mysess" && e.variables.len() == 1));
    }

    #[test]
    fn test_underscore_tags_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path());

        let err = sess.save("mysess", &Snapshot::new(), Some("run_1")).unwrap_err();
        assert!(matches!(err, UtilError::InvalidInput(_)));
        assert!(sess.list().unwrap().is_empty());

        let mut snapshot = Snapshot::new();
        snapshot.insert("n".to_string(), serde_json::json!(3).into());
        sess.save("my_sess", &snapshot, Some("run-1")).unwrap();
        let loaded = sess.load("my_sess", Some("run-1")).unwrap();
        assert_eq!(loaded["n"], Variable::Value(serde_json::json!(3)));
        assert!(sess.load("my", None).is_err());
    }

    #[test]
    fn test_missing_session_is_path_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::new(dir.path()).load("nothing", None).unwrap_err();
        assert!(matches!(err, UtilError::PathError { .. }));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let sess = Session::new(dir.path());
        assert!(sess.save("../escape", &Snapshot::new(), Some("01")).is_err());
        assert!(sess.save("dotted", &Snapshot::new(), Some("v1.2")).unwrap().is_dir());
    }
}
