//! Source files and the include-loading collaborator.
//!
//! The preprocessor does not resolve include search paths itself — that
//! policy lives behind [`FileLoader`]. The production loader reads from
//! the filesystem as written; tests substitute an in-memory map.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Loads the bytes of a source or include file.
pub trait FileLoader {
    fn load(&mut self, path: &Path) -> io::Result<String>;
}

/// Filesystem loader: paths are opened exactly as written.
#[derive(Debug, Default)]
pub struct FsLoader;

impl FileLoader for FsLoader {
    fn load(&mut self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory loader for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> MemoryLoader {
        MemoryLoader::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl FileLoader for MemoryLoader {
    fn load(&mut self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

/// One entry in the include stack.
#[derive(Debug)]
pub(crate) struct SourceFile {
    /// Path as loaded; also the default diagnostic path.
    pub path: PathBuf,
    /// Path reported in diagnostics (rewritten by `#line`).
    pub display_path: PathBuf,
    pub buf: String,
    pub offset: usize,
}

impl SourceFile {
    /// A missing final newline is synthesized so patterns that look
    /// ahead for one (line comments, directives) always find it.
    pub fn new(path: PathBuf, mut buf: String) -> SourceFile {
        if !buf.is_empty() && !buf.ends_with('\n') {
            buf.push('\n');
        }
        SourceFile {
            display_path: path.clone(),
            path,
            buf,
            offset: 0,
        }
    }
}
