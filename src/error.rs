//! Error type shared by the session, the resolver and the machine.

use std::fmt;
use std::io;

use crate::StringAnyMap;

/// Errors returned by module resolution and script execution.
///
/// Misusing a session (changing its configuration after it has executed) is
/// not represented here: that is a programming error and panics instead.
#[derive(Debug)]
pub enum Error {
    /// The selected module set has no definition.
    UnknownModuleSet(String),
    /// A name was handed to the built-in loader factory that it does not know.
    UnknownBuiltin(String),
    /// No source could provide a module requested by name.
    ModuleNotFound(String),
    /// The dynamic module loader failed for the given module.
    DynamicLoader {
        module: String,
        source: anyhow::Error,
    },
    /// The script failed to parse or raised an error while running.
    ///
    /// `output` holds the globals that were bound before the failure.
    Eval {
        error: anyhow::Error,
        output: StringAnyMap,
    },
    /// The execution deadline passed before the script finished.
    Timeout,
    /// The execution context was cancelled.
    Cancelled,
    /// A function was called before any script was executed.
    NotExecuted,
    /// The function to call is not defined by the executed script.
    FunctionNotFound(String),
    /// A run configuration was executed without a session.
    NoStarbox,
    /// There is neither script text nor a file system to read it from.
    NoScript,
    /// Reading a script or driving the terminal failed.
    Io(io::Error),
}

impl Error {
    /// Globals produced before an evaluation error, if any.
    pub fn output(&self) -> Option<&StringAnyMap> {
        match self {
            Error::Eval { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Whether this error was raised during module resolution.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownModuleSet(_)
                | Error::UnknownBuiltin(_)
                | Error::ModuleNotFound(_)
                | Error::DynamicLoader { .. }
        )
    }

    pub(crate) fn eval(error: anyhow::Error) -> Self {
        Error::Eval {
            error,
            output: StringAnyMap::new(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownModuleSet(name) => write!(f, "unknown module set: {}", name),
            Error::UnknownBuiltin(name) => write!(f, "unknown builtin module: {}", name),
            Error::ModuleNotFound(name) => write!(f, "module not found: {}", name),
            Error::DynamicLoader { module, source } => {
                write!(f, "failed to load module {}: {}", module, source)
            }
            Error::Eval { error, .. } => write!(f, "{}", error),
            Error::Timeout => write!(f, "execution timed out"),
            Error::Cancelled => write!(f, "execution cancelled"),
            Error::NotExecuted => write!(f, "no script has been executed"),
            Error::FunctionNotFound(name) => write!(f, "function not found: {}", name),
            Error::NoStarbox => write!(f, "no starbox instance"),
            Error::NoScript => write!(f, "no script to execute"),
            Error::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DynamicLoader { source, .. } => Some(source.as_ref()),
            Error::Eval { error, .. } => Some(error.as_ref()),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
