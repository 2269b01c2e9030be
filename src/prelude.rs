//! # Prelude
//!
//! Convenient access to the commonly used types of the optwatch library.

pub use crate::{
    error::{Error, Result},
    options::{
        ChangeSubscription, DeriveValidator, OptionsMonitor, OptionsPipeline, ValidationOutcome,
    },
    source::{ChangeToken, ConfigurationSource, FileSource, MemorySource},
};
