//! `path` module: host path manipulation and inspection.

use std::env;
use std::fs;
use std::path::Path;

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("path", || build::freeze_namespace("path", path_members));
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[starlark_module]
fn path_members(builder: &mut GlobalsBuilder) {
    fn abs(path: &str) -> anyhow::Result<String> {
        let path = Path::new(path);
        if path.is_absolute() {
            return Ok(lossy(path));
        }
        Ok(lossy(&env::current_dir()?.join(path)))
    }

    fn join(base: &str, child: &str) -> anyhow::Result<String> {
        Ok(lossy(&Path::new(base).join(child)))
    }

    fn exists(path: &str) -> anyhow::Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn is_file(path: &str) -> anyhow::Result<bool> {
        Ok(Path::new(path).is_file())
    }

    fn is_dir(path: &str) -> anyhow::Result<bool> {
        Ok(Path::new(path).is_dir())
    }

    fn basename(path: &str) -> anyhow::Result<String> {
        Ok(Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn dirname(path: &str) -> anyhow::Result<String> {
        Ok(Path::new(path).parent().map(lossy).unwrap_or_default())
    }

    /// The extension without the leading dot, or an empty string.
    fn ext(path: &str) -> anyhow::Result<String> {
        Ok(Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    /// Entry names of a directory, sorted.
    fn listdir(path: &str) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn getcwd() -> anyhow::Result<String> {
        Ok(lossy(&env::current_dir()?))
    }
}
