//! Fluent, reusable run requests.
//!
//! Every builder method returns a new [`RunConfig`] and leaves the receiver
//! untouched, so one partially filled configuration can be shared and
//! specialized:
//!
//! ```no_run
//! use starbox::{RunConfig, Starbox};
//!
//! let base = RunConfig::new().script("x = word.upper()").key_value("word", "star");
//! let b = Starbox::new("demo");
//! let out = base.starbox(&b).execute().unwrap();
//! assert_eq!(out["x"], "STAR");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as HostValue;

use crate::engine::context::Context;
use crate::engine::DEFAULT_SCRIPT_NAME;
use crate::error::{Error, Result};
use crate::starbox::{InspectCondFunc, RunRequest, Starbox};
use crate::StringAnyMap;

/// A run request, executed against a [`Starbox`].
#[derive(Clone, Default)]
pub struct RunConfig<'a> {
    starbox: Option<&'a Starbox>,
    file_name: Option<String>,
    script: Option<String>,
    context: Option<Context>,
    timeout: Option<Duration>,
    inspect: Option<Arc<InspectCondFunc>>,
    repl_input: Option<Vec<String>>,
    extras: StringAnyMap,
}

impl<'a> RunConfig<'a> {
    pub fn new() -> Self {
        RunConfig::default()
    }

    fn with(&self, f: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        f(&mut next);
        next
    }

    /// The session to run in.
    pub fn starbox(&self, starbox: &'a Starbox) -> Self {
        self.with(|c| c.starbox = Some(starbox))
    }

    /// Name of the script, also the file read when no script text is given.
    /// Defaults to `box.star`.
    pub fn file_name(&self, name: &str) -> Self {
        self.with(|c| c.file_name = Some(name.to_owned()))
    }

    /// Script text. Empty text means the script is read from the session's
    /// file system by file name.
    pub fn script(&self, source: &str) -> Self {
        self.with(|c| c.script = Some(source.to_owned()).filter(|s| !s.is_empty()))
    }

    pub fn context(&self, ctx: Context) -> Self {
        self.with(|c| c.context = Some(ctx))
    }

    /// Bounds the run. A zero timeout means none.
    pub fn timeout(&self, timeout: Duration) -> Self {
        self.with(|c| c.timeout = Some(timeout).filter(|t| !t.is_zero()))
    }

    /// Opens the inspection REPL after every run, or never.
    pub fn inspect(&self, enabled: bool) -> Self {
        self.with(|c| {
            c.inspect = if enabled {
                Some(Arc::new(|_: &Result<StringAnyMap>| true))
            } else {
                None
            }
        })
    }

    /// Opens the inspection REPL when `cond` accepts the outcome.
    pub fn inspect_cond<F>(&self, cond: F) -> Self
    where
        F: Fn(&Result<StringAnyMap>) -> bool + Send + Sync + 'static,
    {
        self.with(|c| c.inspect = Some(Arc::new(cond)))
    }

    /// Feeds the inspection REPL from `lines` instead of the terminal.
    pub fn repl_input<I, S>(&self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        self.with(|c| c.repl_input = Some(lines))
    }

    /// Binds a global for this run only, overwriting an earlier one.
    pub fn key_value(&self, key: &str, value: impl Into<HostValue>) -> Self {
        let value = value.into();
        self.with(|c| {
            c.extras.insert(key.to_owned(), value);
        })
    }

    pub fn key_value_map(&self, values: &StringAnyMap) -> Self {
        self.with(|c| c.extras.extend(values.clone()))
    }

    /// Runs the request and returns the globals the script bound.
    ///
    /// The session resolves its modules first if it has not executed yet.
    pub fn execute(&self) -> Result<StringAnyMap> {
        let starbox = self.starbox.ok_or(Error::NoStarbox)?;
        let base = self.context.clone().unwrap_or_default();
        let context = match self.timeout {
            Some(timeout) => base.with_timeout(timeout),
            None => base,
        };
        starbox.execute(RunRequest {
            file_name: self.file_name.as_deref().unwrap_or(DEFAULT_SCRIPT_NAME),
            script: self.script.as_deref(),
            context,
            extras: self.extras.clone(),
            inspect: self.inspect.as_deref(),
            repl_input: self.repl_input.as_deref(),
        })
    }
}

impl fmt::Display for RunConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let starbox = match self.starbox {
            Some(b) => b.to_string(),
            None => "<nil>".to_owned(),
        };
        write!(
            f,
            "🚀Runner{{box:{},file:{},script:{},timeout:{:?},inspect:{},vars:{}}}",
            starbox,
            self.file_name.as_deref().unwrap_or(DEFAULT_SCRIPT_NAME),
            self.script.as_ref().map_or(0, String::len),
            self.timeout,
            self.inspect.is_some(),
            self.extras.len()
        )
    }
}

impl fmt::Debug for RunConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_leave_receiver_untouched() {
        let base = RunConfig::new().key_value("a", 1);
        let more = base.key_value("b", 2).file_name("mine.star");
        assert_eq!(base.extras.len(), 1);
        assert_eq!(more.extras.len(), 2);
        assert!(base.file_name.is_none());
    }

    #[test]
    fn test_empty_script_and_zero_timeout_are_unset() {
        let cfg = RunConfig::new().script("").timeout(Duration::ZERO);
        assert!(cfg.script.is_none());
        assert!(cfg.timeout.is_none());
    }

    #[test]
    fn test_inspect_toggles_condition() {
        let cfg = RunConfig::new().inspect(true);
        assert!(cfg.inspect.is_some());
        assert!(cfg.inspect(false).inspect.is_none());
    }
}
