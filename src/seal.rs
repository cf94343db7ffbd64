//! Seal identity.
//!
//! A seal is the animal behind a series of observations. Its identity is the
//! id of the observation that first established it and never changes
//! afterwards; later sightings only link to it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::{Observation, ObservationId, Sex};

/// Stable seal identifier, equal to the id of the seal's first observation.
///
/// # Examples
///
/// ```
/// use seal_registry::{ObservationId, SealId};
///
/// let first = ObservationId::new();
/// let seal = SealId::anchored_at(first);
/// assert_eq!(seal.first_observation(), first);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealId(ObservationId);

impl SealId {
    /// The seal whose first observation is `observation`.
    #[must_use]
    pub const fn anchored_at(observation: ObservationId) -> Self {
        Self(observation)
    }

    /// The observation that established this seal.
    #[must_use]
    pub const fn first_observation(&self) -> ObservationId {
        self.0
    }
}

impl fmt::Display for SealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ObservationId> for SealId {
    fn from(id: ObservationId) -> Self {
        Self(id)
    }
}

/// A known animal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seal {
    /// Canonical identity.
    pub id: SealId,

    /// Sex recorded on the first observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,

    /// Procedure recorded on the first observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,

    /// When the seal was registered.
    pub created_at: DateTime<Utc>,
}

impl Seal {
    /// Creates the seal established by `anchor`.
    #[must_use]
    pub fn new(anchor: ObservationId, sex: Option<Sex>, procedure: Option<String>) -> Self {
        Self {
            id: SealId::anchored_at(anchor),
            sex,
            procedure,
            created_at: Utc::now(),
        }
    }

    /// The observation that established this seal.
    #[must_use]
    pub const fn first_observation(&self) -> ObservationId {
        self.id.first_observation()
    }
}

impl PartialEq for Seal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Seal {}

impl std::hash::Hash for Seal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A seal together with its full observation history, oldest first.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealMatch {
    pub seal: Seal,
    pub seal_observations: Vec<Observation>,
}

impl SealMatch {
    /// Number of observations recorded for the seal.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.seal_observations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_id_is_first_observation() {
        let obs = ObservationId::new();
        let seal = Seal::new(obs, Some(Sex::Male), Some("tagging".to_string()));
        assert_eq!(seal.first_observation(), obs);
        assert_eq!(seal.id, SealId::from(obs));
        assert_eq!(seal.id.to_string(), obs.to_string());
    }

    #[test]
    fn test_seal_equality_is_by_id() {
        let obs = ObservationId::new();
        let a = Seal::new(obs, Some(Sex::Male), None);
        let b = Seal::new(obs, Some(Sex::Female), Some("weighing".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, Seal::new(ObservationId::new(), None, None));
    }

    #[test]
    fn test_seal_id_serializes_transparently() {
        let obs = ObservationId::new();
        let json = serde_json::to_string(&SealId::anchored_at(obs)).unwrap();
        assert_eq!(json, format!("\"{obs}\""));
    }
}
