//! # OptWatch
//!
//! Typed, hot-reloading options resolution with a staged validation
//! pipeline.
//!
//! A [`ConfigurationSource`] serves raw string values under dotted key paths
//! and fires a [`ChangeToken`] when the underlying data mutates. An
//! [`OptionsPipeline`] turns that raw data into a strongly-typed value in
//! three fixed stages (Configure, Validate, PostConfigure), and an
//! [`OptionsMonitor`] keeps the pipeline's output current: it re-resolves on
//! every change, publishes only values that passed validation, and keeps
//! serving the last good value when an update is rejected.
//!
//! ## Quick Start
//!
//! ```rust
//! use optwatch::{
//!     ConfigurationSource, MemorySource, OptionsMonitor, OptionsPipeline, ValidationOutcome,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct MetricsOptions {
//!     application_version: String,
//!     host_name: String,
//! }
//!
//! fn main() -> optwatch::Result<()> {
//!     let source = Arc::new(MemorySource::new());
//!     source.set("ApplicationVersion", "2.0");
//!     source.set("Metrics.HostName", "host-a");
//!
//!     let reader = Arc::clone(&source);
//!     let pipeline = OptionsPipeline::new()
//!         .configure(move |options: &mut MetricsOptions| {
//!             options.application_version =
//!                 reader.get("ApplicationVersion").unwrap_or_default();
//!             options.host_name = reader.get("Metrics.HostName").unwrap_or_default();
//!         })
//!         .validate(|_, options| {
//!             if options.application_version == "1.1" {
//!                 ValidationOutcome::failure("Application version 1.1 is not allowed")
//!             } else {
//!                 ValidationOutcome::Success
//!             }
//!         });
//!
//!     let monitor = OptionsMonitor::new(source.clone(), pipeline)?;
//!     assert_eq!(monitor.current().host_name, "host-a");
//!
//!     // Accepted updates swap the published value...
//!     source.set("Metrics.HostName", "host-b");
//!     assert_eq!(monitor.current().host_name, "host-b");
//!
//!     // ...rejected ones leave it untouched.
//!     source.set("ApplicationVersion", "1.1");
//!     assert_eq!(monitor.current().application_version, "2.0");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`source`]: configuration sources and change tokens, including the
//!   in-memory [`MemorySource`] and the file-backed, watchable [`FileSource`]
//! - [`options`]: the staged pipeline and the monitor
//! - [`error`]: error types and result handling
//! - [`prelude`]: common imports for convenient usage
//!
//! Everything is wired by explicit construction: build a source, assemble a
//! pipeline from stage closures or trait implementations, hand both to
//! [`OptionsMonitor::new`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod options;
pub mod prelude;
pub mod source;

pub use crate::{
    error::{Error, Result},
    options::{
        ChangeSubscription, ConfigureOptions, CycleStats, DeriveValidator, OptionsMonitor,
        OptionsPipeline, PostConfigureOptions, ValidateOptions, ValidationOutcome, DEFAULT_NAME,
    },
    source::{ChangeToken, ConfigurationSource, FileSource, MemorySource},
};
