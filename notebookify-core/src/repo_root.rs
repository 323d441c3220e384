//! Repository-Root Detector.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Version-control marker looked for in each ancestor directory.
pub const VCS_MARKER: &str = ".git";

/// Walk up from the directory containing `file_path` until a directory holding
/// [`VCS_MARKER`] is found. `None` once the filesystem root is passed.
pub fn detect_project_root(file_path: &Path) -> Option<PathBuf> {
    let absolute = fs::canonicalize(file_path).unwrap_or_else(|_| file_path.to_path_buf());
    let mut current = absolute.parent();
    while let Some(dir) = current {
        if dir.join(VCS_MARKER).exists() {
            debug!(root = %dir.display(), "[UPLOAD] Detected project root");
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Path of `file_path` relative to its project root, or just its base name
/// when no root is found.
pub fn relative_to_project_root(file_path: &Path) -> PathBuf {
    let absolute = fs::canonicalize(file_path).unwrap_or_else(|_| file_path.to_path_buf());
    if let Some(root) = detect_project_root(&absolute) {
        if let Ok(rel) = absolute.strip_prefix(&root) {
            return rel.to_path_buf();
        }
    }
    absolute
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| absolute.clone())
}

/// The folder components of a relative path, outermost first.
pub fn folder_components(relative: &Path) -> Vec<String> {
    relative
        .parent()
        .map(|dir| {
            dir.components()
                .filter_map(|c| match c {
                    std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_two_levels_up() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        let nested = root.join("docs").join("guides");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        let file = nested.join("intro.md");
        fs::write(&file, "x").unwrap();

        let found = detect_project_root(&file).unwrap();
        assert_eq!(found, fs::canonicalize(&root).unwrap());
        assert_eq!(
            relative_to_project_root(&file),
            PathBuf::from("docs").join("guides").join("intro.md")
        );
    }

    #[test]
    fn falls_back_to_base_name_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lonely.md");
        fs::write(&file, "x").unwrap();
        // A temp dir may itself sit inside a checkout; only assert when it does not.
        if detect_project_root(&file).is_none() {
            assert_eq!(relative_to_project_root(&file), PathBuf::from("lonely.md"));
        }
    }

    #[test]
    fn components_exclude_file_name() {
        let rel = Path::new("a").join("b").join("c.md");
        assert_eq!(folder_components(&rel), vec!["a".to_string(), "b".to_string()]);
        assert!(folder_components(Path::new("c.md")).is_empty());
    }
}
