//! `file` module: whole-file reads and writes on the host file system.

use std::fs::{self, OpenOptions};
use std::io::Write;

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::none::NoneType;

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("file", || build::freeze_namespace("file", file_members));
}

fn lines_of(path: &str) -> anyhow::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::to_owned)
        .collect())
}

#[starlark_module]
fn file_members(builder: &mut GlobalsBuilder) {
    fn read_string(path: &str) -> anyhow::Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn read_lines(path: &str) -> anyhow::Result<Vec<String>> {
        lines_of(path)
    }

    fn count_lines(path: &str) -> anyhow::Result<i32> {
        Ok(lines_of(path)?.len() as i32)
    }

    /// The first `n` lines of the file.
    fn head_lines(path: &str, n: i32) -> anyhow::Result<Vec<String>> {
        let lines = lines_of(path)?;
        let n = n.max(0) as usize;
        Ok(lines.into_iter().take(n).collect())
    }

    /// The last `n` lines of the file.
    fn tail_lines(path: &str, n: i32) -> anyhow::Result<Vec<String>> {
        let lines = lines_of(path)?;
        let skip = lines.len().saturating_sub(n.max(0) as usize);
        Ok(lines.into_iter().skip(skip).collect())
    }

    fn write_string(path: &str, data: &str) -> anyhow::Result<NoneType> {
        fs::write(path, data)?;
        Ok(NoneType)
    }

    fn append_string(path: &str, data: &str) -> anyhow::Result<NoneType> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data.as_bytes())?;
        Ok(NoneType)
    }

    fn copyfile(src: &str, dst: &str) -> anyhow::Result<NoneType> {
        fs::copy(src, dst)?;
        Ok(NoneType)
    }
}
