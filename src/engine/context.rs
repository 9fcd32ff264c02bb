//! Execution deadlines and cancellation.
//!
//! A [`Context`] carries an optional deadline and a chain of cancellation
//! flags. Derived contexts share the flags of their parent, so cancelling a
//! parent also cancels every context derived from it, but not the reverse.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    flags: Vec<Arc<AtomicBool>>,
}

impl Context {
    /// A context that is never done unless cancelled.
    pub fn background() -> Self {
        Context {
            deadline: None,
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// Derive a context that can be cancelled on its own.
    pub fn with_cancel(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Context {
            deadline: self.deadline,
            flags,
        }
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`, or earlier if the parent
    /// expires first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.with_cancel();
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        child
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        if let Some(flag) = self.flags.last() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// The error describing why the context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if self.is_cancelled() {
            Some(Error::Cancelled)
        } else if self.is_expired() {
            Some(Error::Timeout)
        } else {
            None
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Context>> = RefCell::new(None);
}

/// Installs `ctx` as the context of evaluations on this thread.
pub(crate) fn enter(ctx: Context) {
    CURRENT.with(|current| *current.borrow_mut() = Some(ctx));
}

/// Whether the context installed on this thread is done.
pub(crate) fn current_is_done() -> bool {
    CURRENT.with(|current| current.borrow().as_ref().map_or(false, Context::is_done))
}
