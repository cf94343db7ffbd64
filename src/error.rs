//! Error types for the seal registry.
//!
//! All errors are strongly typed using thiserror. Validation failures happen
//! before the matching core runs, rejections are decisions the core makes
//! about an observation, and storage errors come from the backing store.

use thiserror::Error;

use crate::identifier::IdentifierKind;
use crate::observation::Season;
use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("{field} is required")]
    MissingField {
        /// Wire path of the field.
        field: String,
    },

    /// A text field is longer than the configured limit.
    #[error("{field} exceeds maximum length of {max_length}")]
    FieldTooLong {
        /// Wire path of the field.
        field: String,
        /// Configured limit in characters.
        max_length: usize,
    },

    /// More marks or tags than one observation may carry.
    #[error("Too many {kind}s: at most {max} are allowed per observation")]
    TooManyIdentifiers {
        kind: IdentifierKind,
        max: usize,
    },

    /// A field holds a value outside its domain.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Wire path of the field.
        field: String,
        reason: String,
    },

    /// A [`RegistryConfig`](crate::config::RegistryConfig) limit is unusable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Decisions the matching core makes against an observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Neither complete nor partial identifiers were found.
    #[error("Bad mark or tag format.")]
    BadIdentifierFormat,

    /// A tag claimed as new is already registered.
    #[error("A tag that is listed as new already exists in the database: {number}")]
    NewTagExists {
        number: String,
    },

    /// A mark claimed as new is already registered in the same season.
    #[error("A mark that is listed as new already exists in the database: {number} (season {season})")]
    NewMarkExists {
        number: String,
        season: Season,
    },

    /// A commit was attempted without any marks or tags.
    #[error("Could not add seal to database. No marks or tags found in observation")]
    MissingIdentifiers,
}

impl Rejection {
    /// Builds the collision rejection for an identifier kind.
    #[must_use]
    pub fn collision(kind: IdentifierKind, number: impl Into<String>, season: Season) -> Self {
        match kind {
            IdentifierKind::Tag => Self::NewTagExists {
                number: number.into(),
            },
            IdentifierKind::Mark => Self::NewMarkExists {
                number: number.into(),
                season,
            },
        }
    }

    /// Returns true for collision rejections.
    #[must_use]
    pub const fn is_collision(&self) -> bool {
        matches!(self, Self::NewTagExists { .. } | Self::NewMarkExists { .. })
    }
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The credentials did not verify.
    #[error("Invalid login")]
    InvalidLogin,

    /// The session is unknown or owned by someone else.
    #[error("Logout failure.")]
    LogoutFailure,

    /// The session lifetime pushes its expiry past the representable range.
    #[error("Session expiry is out of range")]
    ExpiryOutOfRange,

    /// The session table or the credential backend failed.
    #[error("Session store error: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level error type for the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Input failed validation; nothing was read or written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The matching core refused the observation.
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Login, logout or session lookup failed.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// A broken invariant, e.g. an illegal commit stage transition.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RegistryError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the core rejected the observation.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns the rejection, if any.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Only optimistic transaction conflicts are: the store changed between
    /// the lookups and the commit, so a fresh attempt may succeed or reject.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Conflict(_)))
    }

    /// HTTP-equivalent status code for the boundary.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Rejected(_) | Self::Session(_) => 400,
            Self::Storage(StorageError::Conflict(_)) => 409,
            Self::Storage(_) | Self::Internal { .. } => 500,
        }
    }

    /// Human-readable messages for the boundary.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(e) => vec![e.to_string()],
            Self::Rejected(r) => vec![r.to_string()],
            Self::Session(e) => vec![e.to_string()],
            other => vec![other.to_string()],
        }
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_missing_field() {
        let err = ValidationError::MissingField {
            field: "date".to_string(),
        };
        assert_eq!(err.to_string(), "date is required");
    }

    #[test]
    fn test_too_many_identifiers_names_kind() {
        let err = ValidationError::TooManyIdentifiers {
            kind: IdentifierKind::Mark,
            max: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("marks"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::BadIdentifierFormat.to_string(), "Bad mark or tag format.");
        assert!(Rejection::MissingIdentifiers
            .to_string()
            .contains("No marks or tags found"));

        let tag = Rejection::collision(IdentifierKind::Tag, "T100", Season::new(2020));
        assert!(tag.is_collision());
        assert!(tag.to_string().contains("T100"));

        let mark = Rejection::collision(IdentifierKind::Mark, "M5", Season::new(2021));
        assert!(matches!(mark, Rejection::NewMarkExists { .. }));
        assert!(mark.to_string().contains("2021"));
    }

    #[test]
    fn test_registry_error_status() {
        let err: RegistryError = Rejection::BadIdentifierFormat.into();
        assert!(err.is_rejection());
        assert_eq!(err.status(), 400);
        assert_eq!(err.messages(), vec!["Bad mark or tag format.".to_string()]);

        let err: RegistryError = StorageError::Conflict("stale".to_string()).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());
        assert_eq!(err.status(), 409);

        let err: RegistryError = StorageError::BackendError("down".to_string()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_registry_error_internal() {
        let err = RegistryError::internal("unexpected stage");
        assert_eq!(err.status(), 500);
        assert!(err.to_string().contains("unexpected stage"));
        assert!(err.rejection().is_none());
    }

    #[test]
    fn test_session_error_status() {
        let err: RegistryError = SessionError::InvalidLogin.into();
        assert_eq!(err.status(), 400);
        assert_eq!(err.messages(), vec!["Invalid login".to_string()]);
    }
}
