//! Input validation.
//!
//! Runs before the matching core. The core assumes every payload it sees
//! passed these checks.

use crate::config::RegistryConfig;
use crate::error::ValidationError;
use crate::identifier::IdentifierKind;
use crate::observation::{IdentifierEntry, ObservationPayload};

fn validate_optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    let Some(v) = value else { return Ok(()) };
    let trimmed = v.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be at least 1 character long".to_string(),
        });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::FieldTooLong {
            field: field.to_string(),
            max_length: max,
        });
    }
    Ok(())
}

fn validate_identifiers(
    kind: IdentifierKind,
    entries: &[IdentifierEntry],
    config: &RegistryConfig,
) -> Result<(), ValidationError> {
    if entries.len() > config.max_identifiers_per_kind {
        return Err(ValidationError::TooManyIdentifiers {
            kind,
            max: config.max_identifiers_per_kind,
        });
    }

    for (i, entry) in entries.iter().enumerate() {
        let number = entry.number.trim();
        if number.is_empty() {
            return Err(ValidationError::MissingField {
                field: format!("{kind}s[{i}].number"),
            });
        }
        if number.chars().count() > config.max_identifier_len {
            return Err(ValidationError::FieldTooLong {
                field: format!("{kind}s[{i}].number"),
                max_length: config.max_identifier_len,
            });
        }
    }
    Ok(())
}

impl ObservationPayload {
    /// Validates this payload against the configured limits.
    ///
    /// # Errors
    /// Returns the first `ValidationError` found, checking text fields, then
    /// measurements, then identifiers.
    pub fn validate(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        validate_optional_text("observer", self.observer.as_deref(), config.max_text_len)?;
        validate_optional_text("procedure", self.procedure.as_deref(), config.max_text_len)?;
        validate_optional_text("location", self.location.as_deref(), config.max_text_len)?;
        if let Some(comments) = &self.comments {
            if comments.chars().count() > config.max_text_len {
                return Err(ValidationError::FieldTooLong {
                    field: "comments".to_string(),
                    max_length: config.max_text_len,
                });
            }
        }

        if let Some(m) = &self.measurement {
            for (name, value) in m.values() {
                if let Some(v) = value {
                    if !v.is_finite() || v < 0.0 {
                        return Err(ValidationError::InvalidValue {
                            field: format!("measurement.{name}"),
                            reason: "must be a non-negative number".to_string(),
                        });
                    }
                }
            }
        }

        validate_identifiers(IdentifierKind::Mark, &self.marks, config)?;
        validate_identifiers(IdentifierKind::Tag, &self.tags, config)?;
        Ok(())
    }
}
