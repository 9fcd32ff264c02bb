//! Script file systems.
//!
//! Module scripts and `run_file` sources are read through [`ScriptFs`]. Names
//! are looked up as given first, then with a `.star` suffix.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Read-only source of Starlark scripts.
pub trait ScriptFs: Send + Sync {
    /// Read the script stored under `name`.
    fn read_script(&self, name: &str) -> io::Result<String>;
}

/// Reads `name`, or `name.star` when `name` itself does not exist.
pub fn read_module_script(fs: &dyn ScriptFs, name: &str) -> io::Result<String> {
    match fs.read_script(name) {
        Err(err) if err.kind() == io::ErrorKind::NotFound && !name.ends_with(".star") => {
            fs.read_script(&format!("{}.star", name))
        }
        result => result,
    }
}

/// Scripts held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        MemoryFs {
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.files.insert(name.into(), source.into());
    }

    /// File names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ScriptFs for MemoryFs {
    fn read_script(&self, name: &str) -> io::Result<String> {
        self.files.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}: file does not exist", name))
        })
    }
}

/// Scripts read from a directory. Names may not leave the directory.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptFs for DirFs {
    fn read_script(&self, name: &str) -> io::Result<String> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: path outside of script directory", name),
            ));
        }
        fs::read_to_string(self.root.join(relative))
    }
}
