//! Plugin script discovery

use crate::error::CliError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Recursively collect files with `extension` under `root`, sorted by path
pub fn discover(root: &Path, extension: &str) -> Result<Vec<PathBuf>, CliError> {
    if !root.is_dir() {
        return Err(CliError::InvalidDirectory(root.to_path_buf()));
    }

    let mut scripts = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            scripts.push(entry.into_path());
        }
    }

    scripts.sort();
    debug!("Discovered {} plugin script(s) under {}", scripts.len(), root.display());
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        std::fs::write(dir.path().join("b.rhai"), "()").unwrap();
        std::fs::write(dir.path().join("nested/a.rhai"), "()").unwrap();
        std::fs::write(dir.path().join("nested/deeper/c.RHAI"), "()").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover(dir.path(), "rhai").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("b.rhai"),
                PathBuf::from("nested/a.rhai"),
                PathBuf::from("nested/deeper/c.RHAI"),
            ]
        );
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            discover(Path::new("/definitely/not/here"), "rhai"),
            Err(CliError::InvalidDirectory(_))
        ));
    }
}
