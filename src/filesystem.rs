//! In-memory staging area for generated files
//!
//! A component renders every include into a `MemoryFS` before anything
//! touches the disk. Only when all includes rendered successfully is the
//! staged tree committed (see `phases::write`), so a failing include never
//! leaves a half-updated component directory behind.
//!
//! Paths are relative to the cluster output directory, e.g.
//! `ingress/deployment.yaml` or `shared/crds.yaml` for a `dest_dir` include.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// A staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
}

impl File {
    /// Create a new file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }

    /// Get file size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// In-memory filesystem holding the output of one component
#[derive(Debug, Clone, Default)]
pub struct MemoryFS {
    /// Files stored as path -> content, ordered for deterministic commits
    files: BTreeMap<PathBuf, File>,
}

impl MemoryFS {
    /// Create a new empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a file.
    ///
    /// Fails when the path escapes the output root (absolute or `..`) or when
    /// two includes target the same output path.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, file: File) -> Result<()> {
        let path = path.as_ref();
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || path.as_os_str().is_empty() {
            return Err(Error::Filesystem {
                message: format!(
                    "Output path '{}' must be relative to the cluster directory",
                    path.display()
                ),
            });
        }
        if self.files.contains_key(path) {
            return Err(Error::Filesystem {
                message: format!("Two includes write to '{}'", path.display()),
            });
        }
        self.files.insert(path.to_path_buf(), file);
        Ok(())
    }

    /// Stage raw bytes
    pub fn add_file_content<P: AsRef<Path>>(&mut self, path: P, content: Vec<u8>) -> Result<()> {
        self.add_file(path, File::new(content))
    }

    /// Stage string content
    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) -> Result<()> {
        self.add_file(path, File::from_string(content))
    }

    /// Get a staged file
    pub fn get_file<P: AsRef<Path>>(&self, path: P) -> Option<&File> {
        self.files.get(path.as_ref())
    }

    /// Check whether a path is staged
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(path.as_ref())
    }

    /// Number of staged files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over staged files in path order
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.files.iter()
    }

    /// File names staged directly inside `dir`.
    pub fn names_in_dir<P: AsRef<Path>>(&self, dir: P) -> BTreeSet<String> {
        let dir = dir.as_ref();
        self.files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut fs = MemoryFS::new();
        fs.add_file_string("web/deployment.yaml", "kind: Deployment\n")
            .unwrap();
        assert!(fs.exists("web/deployment.yaml"));
        assert_eq!(
            fs.get_file("web/deployment.yaml").unwrap().content,
            b"kind: Deployment\n"
        );
        assert_eq!(fs.len(), 1);
        assert!(!fs.is_empty());
    }

    #[test]
    fn test_duplicate_destination_rejected() {
        let mut fs = MemoryFS::new();
        fs.add_file_string("web/a.yaml", "one").unwrap();
        let err = fs.add_file_string("web/a.yaml", "two").unwrap_err();
        assert!(err.to_string().contains("Two includes write to"));
    }

    #[test]
    fn test_escaping_paths_rejected() {
        let mut fs = MemoryFS::new();
        assert!(fs.add_file_string("../outside.yaml", "x").is_err());
        assert!(fs.add_file_string("/abs.yaml", "x").is_err());
        assert!(fs.add_file_string("", "x").is_err());
    }

    #[test]
    fn test_names_in_dir() {
        let mut fs = MemoryFS::new();
        fs.add_file_string("web/a.yaml", "a").unwrap();
        fs.add_file_string("web/b.json", "b").unwrap();
        fs.add_file_string("shared/c.yaml", "c").unwrap();

        let names = fs.names_in_dir("web");
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["a.yaml".to_string(), "b.json".to_string()]
        );
        assert!(fs.names_in_dir("missing").is_empty());
    }

    #[test]
    fn test_files_are_ordered() {
        let mut fs = MemoryFS::new();
        fs.add_file_string("b/z.yaml", "").unwrap();
        fs.add_file_string("a/y.yaml", "").unwrap();
        let order: Vec<_> = fs.files().map(|(p, _)| p.clone()).collect();
        assert_eq!(order, vec![PathBuf::from("a/y.yaml"), PathBuf::from("b/z.yaml")]);
    }

    #[test]
    fn test_file_size() {
        assert_eq!(File::from_string("abc").size(), 3);
    }
}
