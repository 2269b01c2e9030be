//! Configuration sources
//!
//! A configuration source is a raw mapping from dotted key paths (such as
//! `Metrics.HostName`) to string values, together with a change-notification
//! hook. Two implementations ship with the crate: [`MemorySource`] for
//! programmatic and test use, and [`FileSource`] for TOML/JSON files with
//! optional filesystem watching. Anything that can answer `get` and hand out
//! watch tokens can act as a source.

pub mod file;
pub mod memory;
pub mod token;

pub use file::FileSource;
pub use memory::MemorySource;
pub use token::ChangeToken;

/// Read access to a raw key/value configuration mapping plus change
/// notification.
///
/// Implementations must tolerate concurrent `get` calls; the options layer
/// never mutates a source. Absent keys are not an error: they resolve to
/// `None` and typed fields keep their defaults.
pub trait ConfigurationSource: Send + Sync {
    /// Look up the value for a dotted key path, `None` when absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Register interest in the next mutation of the underlying data.
    ///
    /// The returned token is single-fire: once spent, observing further
    /// changes requires another `watch` call. Outstanding tokens are
    /// independent; firing one never consumes another watcher's
    /// registration.
    fn watch(&self) -> ChangeToken;
}
