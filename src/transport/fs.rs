use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::LoadError;

/// True if the path extension matches one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
        .unwrap_or(false)
}

/// Regular files directly under `dir` with one of `extensions`, sorted by name.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| LoadError::Io(std::io::Error::other(err)))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted by name. Hidden directories are skipped.
pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| LoadError::Io(std::io::Error::other(err)))?;
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'));
        if entry.file_type().is_dir() && !hidden {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// First existing `<dir>/<stem>.<ext>` in `extensions` order.
pub fn find_with_stem(dir: &Path, stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// Return `path` if it is a file, otherwise a `MissingInput` error.
pub fn require_file(dataset: &str, path: PathBuf) -> Result<PathBuf, LoadError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(LoadError::MissingInput {
            dataset: dataset.to_string(),
            path,
        })
    }
}

/// Final path component as UTF-8, or an empty string.
pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn listings_are_sorted_and_filtered() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("b.csv"), b"").unwrap();
        fs::write(root.join("a.TSV"), b"").unwrap();
        fs::write(root.join("notes.txt"), b"").unwrap();
        fs::create_dir(root.join("de_train")).unwrap();
        fs::create_dir(root.join("en_train")).unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join("en_train/nested.csv"), b"").unwrap();

        let files = list_files(root, &["csv", "tsv"]).unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name_str(p)).collect();
        assert_eq!(names, vec!["a.TSV", "b.csv"]);

        let dirs = subdirectories(root).unwrap();
        let names: Vec<_> = dirs.iter().map(|p| file_name_str(p)).collect();
        assert_eq!(names, vec!["de_train", "en_train"]);
    }

    #[test]
    fn stem_lookup_prefers_extension_order() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("products.csv"), b"").unwrap();
        fs::write(temp.path().join("products.parquet"), b"").unwrap();
        let found = find_with_stem(temp.path(), "products", &["parquet", "csv"]).unwrap();
        assert_eq!(file_name_str(&found), "products.parquet");
        assert!(find_with_stem(temp.path(), "missing", &["csv"]).is_none());
        assert!(matches!(
            require_file("esci", temp.path().join("missing.csv")),
            Err(LoadError::MissingInput { .. })
        ));
    }
}
