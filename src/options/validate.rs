//! Bridging declarative `validator` rules into the Validate stage.

use validator::{Validate, ValidationErrors};

use super::pipeline::{ValidateOptions, ValidationOutcome};

/// A Validate stage that runs the `#[derive(Validate)]` rules of the options
/// type.
///
/// Register it on a pipeline whose options type derives
/// [`validator::Validate`]; field-level constraints then gate publication
/// the same way hand-written validators do.
pub struct DeriveValidator;

impl<T> ValidateOptions<T> for DeriveValidator
where
    T: Validate + Send + Sync,
{
    fn validate(&self, _name: &str, options: &T) -> ValidationOutcome {
        match options.validate() {
            Ok(()) => ValidationOutcome::Success,
            Err(errors) => ValidationOutcome::Failure(format_validation_errors(&errors).join("; ")),
        }
    }
}

/// Format validation errors for user display.
pub fn format_validation_errors(errors: &ValidationErrors) -> Vec<String> {
    let mut formatted = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match error.code.as_ref() {
                "length" => {
                    if let Some(min) = error.params.get("min") {
                        format!("Value must be at least {min} characters")
                    } else if let Some(max) = error.params.get("max") {
                        format!("Value must be at most {max} characters")
                    } else {
                        "Invalid length".to_string()
                    }
                }
                "range" => {
                    if let Some(min) = error.params.get("min") {
                        if let Some(max) = error.params.get("max") {
                            format!("Value must be between {min} and {max}")
                        } else {
                            format!("Value must be at least {min}")
                        }
                    } else if let Some(max) = error.params.get("max") {
                        format!("Value must be at most {max}")
                    } else {
                        "Value out of range".to_string()
                    }
                }
                _ => error
                    .message
                    .clone()
                    .unwrap_or_else(|| "Invalid value".into())
                    .to_string(),
            };
            formatted.push(format!("{field}: {message}"));
        }
    }

    // field_errors() iterates a map; sort so reasons are deterministic.
    formatted.sort();
    formatted
}
