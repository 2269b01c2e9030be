//! The staged options pipeline: Configure → Validate → PostConfigure.
//!
//! A pipeline turns raw configuration into a typed value in three fixed
//! stages, run synchronously once per resolution cycle:
//!
//! 1. **Configure** stages populate a freshly default-constructed value, in
//!    registration order, each seeing the previous stage's mutations.
//!    Configure cannot fail; an absent key simply leaves a field at its
//!    default.
//! 2. **Validate** stages are all evaluated against the fully-configured
//!    value. The cycle fails if any reports a failure; the first failure
//!    reason in registration order is surfaced.
//! 3. **PostConfigure** stages run only after validation succeeded, for
//!    cross-cutting adjustments that must see a validated value.
//!
//! Stages capture their own collaborators (typically an
//! `Arc<dyn ConfigurationSource>` for Configure), so a pipeline is wired by
//! plain construction, no registry involved.

use crate::error::{Error, Result};

/// Reserved name for unnamed pipelines.
pub const DEFAULT_NAME: &str = "";

/// Result of a single validator: success, or a failure with a reason.
///
/// A failure is a normal pipeline outcome, not a panic; the monitor reacts
/// by keeping the previously published value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The configured value is acceptable.
    Success,
    /// The configured value was rejected for the given reason.
    Failure(String),
}

impl ValidationOutcome {
    /// Build a failure outcome from any reason text.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

/// A Configure stage: populates a freshly constructed options value.
pub trait ConfigureOptions<T>: Send + Sync {
    /// Mutate the options value in place. Must not fail; problems surface
    /// at the Validate stage.
    fn configure(&self, options: &mut T);
}

/// A Validate stage: a deterministic, side-effect-free predicate over the
/// fully-configured value.
pub trait ValidateOptions<T>: Send + Sync {
    /// Judge the configured value. `name` is the pipeline's name,
    /// [`DEFAULT_NAME`] for unnamed pipelines.
    fn validate(&self, name: &str, options: &T) -> ValidationOutcome;
}

/// A PostConfigure stage: runs after validation succeeded.
pub trait PostConfigureOptions<T>: Send + Sync {
    /// Apply a cross-cutting adjustment to a validated value.
    fn post_configure(&self, name: &str, options: &mut T);
}

struct ConfigureFn<F>(F);

impl<T, F> ConfigureOptions<T> for ConfigureFn<F>
where
    F: Fn(&mut T) + Send + Sync,
{
    fn configure(&self, options: &mut T) {
        (self.0)(options);
    }
}

struct ValidateFn<F>(F);

impl<T, F> ValidateOptions<T> for ValidateFn<F>
where
    F: Fn(&str, &T) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, name: &str, options: &T) -> ValidationOutcome {
        (self.0)(name, options)
    }
}

struct PostConfigureFn<F>(F);

impl<T, F> PostConfigureOptions<T> for PostConfigureFn<F>
where
    F: Fn(&str, &mut T) + Send + Sync,
{
    fn post_configure(&self, name: &str, options: &mut T) {
        (self.0)(name, options);
    }
}

/// An ordered set of Configure/Validate/PostConfigure stages for one typed
/// options shape.
pub struct OptionsPipeline<T> {
    name: String,
    configure: Vec<Box<dyn ConfigureOptions<T>>>,
    validate: Vec<Box<dyn ValidateOptions<T>>>,
    post_configure: Vec<Box<dyn PostConfigureOptions<T>>>,
}

impl<T> OptionsPipeline<T> {
    /// Create an unnamed pipeline (name is [`DEFAULT_NAME`]).
    pub fn new() -> Self {
        Self::named(DEFAULT_NAME)
    }

    /// Create a named pipeline. The name distinguishes multiple
    /// configurations of the same options shape and is passed to Validate
    /// and PostConfigure stages.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configure: Vec::new(),
            validate: Vec::new(),
            post_configure: Vec::new(),
        }
    }

    /// This pipeline's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a Configure closure.
    pub fn configure<F>(self, stage: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.configure_with(ConfigureFn(stage))
    }

    /// Register a Configure stage implementation.
    pub fn configure_with(mut self, stage: impl ConfigureOptions<T> + 'static) -> Self {
        self.configure.push(Box::new(stage));
        self
    }

    /// Register a Validate closure.
    pub fn validate<F>(self, stage: F) -> Self
    where
        F: Fn(&str, &T) -> ValidationOutcome + Send + Sync + 'static,
    {
        self.validate_with(ValidateFn(stage))
    }

    /// Register a Validate stage implementation.
    pub fn validate_with(mut self, stage: impl ValidateOptions<T> + 'static) -> Self {
        self.validate.push(Box::new(stage));
        self
    }

    /// Register a PostConfigure closure.
    pub fn post_configure<F>(self, stage: F) -> Self
    where
        F: Fn(&str, &mut T) + Send + Sync + 'static,
    {
        self.post_configure_with(PostConfigureFn(stage))
    }

    /// Register a PostConfigure stage implementation.
    pub fn post_configure_with(mut self, stage: impl PostConfigureOptions<T> + 'static) -> Self {
        self.post_configure.push(Box::new(stage));
        self
    }
}

impl<T: Default> OptionsPipeline<T> {
    /// Run one resolution cycle: build a fresh value, configure, validate,
    /// post-configure.
    ///
    /// Every validator runs even after a failure has been seen, but the
    /// first failure in registration order decides the reported reason.
    /// PostConfigure stages are skipped entirely when validation failed.
    pub fn resolve(&self) -> Result<T> {
        let mut options = T::default();

        for stage in &self.configure {
            stage.configure(&mut options);
        }

        let mut failure: Option<String> = None;
        for stage in &self.validate {
            if let ValidationOutcome::Failure(reason) = stage.validate(&self.name, &options) {
                if failure.is_none() {
                    failure = Some(reason);
                }
            }
        }
        if let Some(reason) = failure {
            return Err(Error::Validation {
                name: self.name.clone(),
                reason,
            });
        }

        for stage in &self.post_configure {
            stage.post_configure(&self.name, &mut options);
        }

        Ok(options)
    }
}

impl<T> Default for OptionsPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}
