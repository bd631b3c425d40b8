//! Source-text provider contract.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Read-only view of the files that make up an environment and its modules.
///
/// Loaders only reach the filesystem through this trait, and only on a cache
/// miss.
pub trait FileSystem {
    /// Reads a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O failure.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Returns `true` if a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Lists the files matching a glob pattern, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidInput`] for a malformed pattern and
    /// propagates failures while walking directories.
    fn list_matching(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Lists the immediate subdirectories of `path`, sorted.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O failure.
    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Escapes a path so it can prefix a glob pattern literally.
#[must_use]
pub fn escape_path(path: &Path) -> String {
    Pattern::escape(&path.to_string_lossy())
}

/// [`FileSystem`] backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_matching(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let entries = glob::glob_with(pattern, MATCH_OPTIONS)
            .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if path.is_file() {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

/// In-memory [`FileSystem`] keyed by absolute or relative paths.
///
/// Directories exist implicitly as ancestors of stored files.
#[derive(Clone, Debug, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFileSystem {
    /// Creates an empty file tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, returning the updated tree.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when no files are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.keys().any(|file| file.starts_with(path))
    }

    fn list_matching(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let pattern =
            Pattern::new(pattern).map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;
        Ok(self
            .files
            .keys()
            .filter(|file| pattern.matches_path_with(file, MATCH_OPTIONS))
            .cloned()
            .collect())
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.exists(path) {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }
        let directories: BTreeSet<PathBuf> = self
            .files
            .keys()
            .filter_map(|file| {
                let relative = file.strip_prefix(path).ok()?;
                let mut components = relative.components();
                let first = components.next()?;
                components.next()?;
                Some(path.join(first))
            })
            .collect();
        Ok(directories.into_iter().collect())
    }
}
