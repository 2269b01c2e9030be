//! Typed options resolution
//!
//! This module owns the two halves of the resolver: the staged
//! [`OptionsPipeline`] (Configure → Validate → PostConfigure) and the
//! [`OptionsMonitor`] that keeps a pipeline's output current as the
//! underlying configuration source changes.

pub mod monitor;
pub mod pipeline;
pub mod validate;

pub use monitor::{ChangeSubscription, CycleStats, OptionsMonitor};
pub use pipeline::{
    ConfigureOptions, OptionsPipeline, PostConfigureOptions, ValidateOptions, ValidationOutcome,
    DEFAULT_NAME,
};
pub use validate::{format_validation_errors, DeriveValidator};
