//! One-shot change notification tokens.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type FireCallback = Box<dyn FnOnce() + Send>;

/// A single-shot signal that the underlying configuration data has changed.
///
/// A token is handed out by [`ConfigurationSource::watch`] and fired by the
/// source on the next mutation. Once fired it is spent: callers that want to
/// observe further changes must obtain a fresh token with another `watch`
/// call. Clones share the same state, so a source can keep one clone in its
/// registry and hand the other to the watcher.
///
/// Registering a callback on a token that has already fired invokes the
/// callback immediately. This keeps the watch/re-arm sequence lossless: a
/// mutation landing between `watch()` and `on_fire` is still delivered.
///
/// [`ConfigurationSource::watch`]: crate::source::ConfigurationSource::watch
#[derive(Clone)]
pub struct ChangeToken {
    state: Arc<TokenState>,
}

struct TokenState {
    fired: AtomicBool,
    callbacks: Mutex<Vec<FireCallback>>,
}

impl ChangeToken {
    /// Create a fresh, unfired token.
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                fired: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether this token has already fired.
    pub fn has_fired(&self) -> bool {
        self.state.fired.load(Ordering::Acquire)
    }

    /// Register a callback invoked at most once, when the token fires.
    ///
    /// If the token has already fired the callback runs immediately on the
    /// calling thread; otherwise it runs on the thread that fires the token.
    /// No ordering is guaranteed between multiple callbacks on one token.
    pub fn on_fire<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.state.callbacks.lock();
            // The fired flag must be re-checked under the lock: a concurrent
            // fire() that won the race has already drained the list, and a
            // callback pushed now would never run.
            if !self.state.fired.load(Ordering::Acquire) {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Fire the token, delivering every registered callback exactly once.
    ///
    /// Firing an already-fired token does nothing. Producers (configuration
    /// sources) call this; consumers only register callbacks.
    pub fn fire(&self) {
        if self.state.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.state.callbacks.lock());
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for ChangeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeToken")
            .field("fired", &self.has_fired())
            .finish()
    }
}
