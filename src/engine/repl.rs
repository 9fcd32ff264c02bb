//! Line sources for the interactive loop.

use std::collections::VecDeque;
use std::io;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Supplies input lines to a REPL. `None` ends the session.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Reads lines from the terminal.
pub struct Terminal {
    editor: DefaultEditor,
}

impl Terminal {
    pub fn new() -> io::Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Terminal { editor })
    }
}

impl LineReader for Terminal {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            // Ctrl-C drops the pending input.
            Err(ReadlineError::Interrupted) => Some(String::new()),
            Err(_) => None,
        }
    }
}

/// Replays a fixed list of lines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedLines {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineReader for ScriptedLines {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Whether an input chunk needs more lines before it can be evaluated.
///
/// A chunk opening a block (a line ending in `:`) continues until a blank
/// line; unbalanced brackets continue until they close.
pub(crate) fn needs_more(chunk: &str, last_line: &str) -> bool {
    let mut depth = 0i32;
    for c in chunk.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        return true;
    }
    let opens_block = chunk
        .lines()
        .any(|l| l.trim_end().ends_with(':') && !l.trim_start().starts_with('#'));
    opens_block && !last_line.trim().is_empty()
}
