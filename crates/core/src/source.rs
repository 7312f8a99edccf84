//! File access for the include pass.
//!
//! [`SourceProvider`] is the only way the pipeline touches files, so a run
//! can be driven from disk ([`FileSystemProvider`]) or from a map of paths
//! to text ([`InMemoryProvider`], used by the tests).

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait SourceProvider {
    /// Read the full text of a source file.
    fn read_source(&self, path: &Path) -> io::Result<String>;

    /// Resolve an `$expand` target against the including file's directory.
    fn resolve_include(&self, base_dir: &Path, target: &str) -> PathBuf;

    /// Canonical form of a path, used as the inclusion-stack key.
    /// Fails with `NotFound` when the path does not name an existing file.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Reads from the real filesystem.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn resolve_include(&self, base_dir: &Path, target: &str) -> PathBuf {
        base_dir.join(target)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let canon = path.canonicalize()?;
        if canon.is_file() {
            Ok(canon)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file: {}", canon.display()),
            ))
        }
    }
}

/// Serves sources from memory. Paths are normalized lexically, so
/// `/src/../src/a.pyx` and `/src/a.pyx` name the same file.
#[derive(Default)]
pub struct InMemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file and return the provider.
    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), text.into());
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        let key = normalize_path(path);
        self.files.get(&key).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file in memory: {}", key.display()),
            )
        })
    }

    fn resolve_include(&self, base_dir: &Path, target: &str) -> PathBuf {
        normalize_path(&base_dir.join(target))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let key = normalize_path(path);
        if self.files.contains_key(&key) {
            Ok(key)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file in memory: {}", key.display()),
            ))
        }
    }
}
