//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest allowed session lifetime: ten years.
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Limits and timeouts for the registry service.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use seal_registry::RegistryConfig;
///
/// let config = RegistryConfig::from_json_str(r#"{"max_page_size": 25}"#).unwrap();
/// assert_eq!(config.max_page_size, 25);
/// assert_eq!(config.max_identifiers_per_kind, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Max marks, and separately max tags, on one observation.
    pub max_identifiers_per_kind: usize,
    /// Max length of a mark or tag number.
    pub max_identifier_len: usize,
    /// Max length of free-form text fields (observer, comments, ...).
    pub max_text_len: usize,
    /// Max observations per page of the pending queue.
    pub max_page_size: usize,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_identifiers_per_kind: 32,
            max_identifier_len: 32,
            max_text_len: 1024,
            max_page_size: 100,
            session_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl RegistryConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    /// - `InvalidConfig`: if the document is malformed or a limit is unusable
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    /// - `InvalidConfig`: naming the first offending field
    pub fn validate(&self) -> Result<(), ValidationError> {
        let limits = [
            ("max_identifiers_per_kind", self.max_identifiers_per_kind),
            ("max_identifier_len", self.max_identifier_len),
            ("max_text_len", self.max_text_len),
            ("max_page_size", self.max_page_size),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("{name} must be greater than zero"),
                });
            }
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ValidationError::InvalidConfig {
                reason: format!("session_ttl_secs must be between 1 and {MAX_SESSION_TTL_SECS}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RegistryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = RegistryConfig::from_json_str(r#"{"session_ttl_secs": 60}"#).unwrap();
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.max_text_len, 1024);
    }

    #[test]
    fn test_from_json_rejects_zero_limits() {
        let err = RegistryConfig::from_json_str(r#"{"max_page_size": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidConfig { reason } if reason.contains("max_page_size")
        ));
    }

    #[test]
    fn test_from_json_rejects_huge_session_ttl() {
        let err = RegistryConfig::from_json_str(r#"{"session_ttl_secs": 10000000000000}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidConfig { reason } if reason.contains("session_ttl_secs")
        ));

        let ten_years = format!(r#"{{"session_ttl_secs": {MAX_SESSION_TTL_SECS}}}"#);
        assert!(RegistryConfig::from_json_str(&ten_years).is_ok());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = RegistryConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));
    }
}
