//! Abstract storage traits for the seal registry.
//!
//! Backends implement [`RegistryStore`]. Reads are available directly on the
//! store; writes only happen inside a [`RegistryTransaction`], which
//! publishes all of its writes at once on commit and discards them when
//! dropped uncommitted.

use async_trait::async_trait;
use thiserror::Error;

use crate::observation::{
    IdentifierEntry, Measurement, Observation, ObservationId, ObservationPayload, Observer, Season,
    Sex,
};
use crate::seal::{Seal, SealId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Observation not found.
    #[error("Observation not found: {0}")]
    ObservationNotFound(ObservationId),

    /// Seal not found.
    #[error("Seal not found: {0}")]
    SealNotFound(SealId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The store changed underneath an open transaction.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// A fact recorded against an observation after the observation row.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedFact {
    /// Body measurements.
    Measurement(Measurement),
    /// Estimated pup age in days.
    PupAge(u32),
    /// Number of pups with the animal.
    PupCount(u32),
    /// Marks, stamped with the resolved seal and season.
    Marks {
        /// Marks as submitted.
        marks: Vec<IdentifierEntry>,
        /// Season the marks belong to.
        season: Season,
        /// Seal the marks identify.
        seal_id: SealId,
    },
    /// Tags, stamped with the resolved seal.
    Tags {
        /// Tags as submitted.
        tags: Vec<IdentifierEntry>,
        /// Seal the tags identify.
        seal_id: SealId,
    },
}

impl DerivedFact {
    /// Short stable name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Measurement(_) => "measurement",
            Self::PupAge(_) => "pup_age",
            Self::PupCount(_) => "pup_count",
            Self::Marks { .. } => "marks",
            Self::Tags { .. } => "tags",
        }
    }
}

/// Read side of the registry.
///
/// Identifier numbers are compared case-insensitively on trimmed values.
/// Lookups on blank or wildcard-only input return nothing rather than fail.
///
/// # Errors
/// - `BackendError`: every method, if the backend cannot be read
#[async_trait]
pub trait RegistryReader: Send + Sync {
    /// Seal that first registered mark `number` in `season`.
    async fn lookup_exact_mark(
        &self,
        number: &str,
        season: Season,
    ) -> Result<Option<Seal>, StorageError>;

    /// Seal that first registered tag `number`.
    async fn lookup_exact_tag(&self, number: &str) -> Result<Option<Seal>, StorageError>;

    /// Seals with a mark in `season` consistent with `fragment`, in
    /// registration order, each seal once.
    async fn lookup_partial_marks(
        &self,
        fragment: &str,
        season: Season,
    ) -> Result<Vec<Seal>, StorageError>;

    /// Seals with a tag consistent with `fragment`, in registration order,
    /// each seal once.
    async fn lookup_partial_tags(&self, fragment: &str) -> Result<Vec<Seal>, StorageError>;

    /// All observations linked to a seal, oldest sighting first.
    async fn lookup_seal_observation_history(
        &self,
        seal_id: SealId,
    ) -> Result<Vec<Observation>, StorageError>;

    /// Find an observer by exact name.
    async fn find_observer(&self, name: &str) -> Result<Option<Observer>, StorageError>;

    /// Unapproved observations, oldest recorded first. `page` starts at 1.
    async fn pending_observations(
        &self,
        count: usize,
        page: usize,
    ) -> Result<Vec<Observation>, StorageError>;

    /// Number of unapproved observations.
    async fn pending_count(&self) -> Result<usize, StorageError>;
}

/// Write side of the registry, only reachable through a transaction.
#[async_trait]
pub trait RegistryWriter: Send + Sync {
    /// Insert the observation row and return its identity.
    async fn insert_observation(
        &mut self,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> Result<ObservationId, StorageError>;

    /// Create a seal whose first observation is `anchor`. Returns the stored seal.
    ///
    /// # Errors
    /// - `ObservationNotFound`: if `anchor` was never inserted
    /// - `DuplicateKey`: if a seal is already anchored there
    async fn create_seal(
        &mut self,
        anchor: ObservationId,
        sex: Option<Sex>,
        procedure: Option<String>,
    ) -> Result<Seal, StorageError>;

    /// Link an observation to a seal.
    ///
    /// # Errors
    /// - `ObservationNotFound`: if the observation was never inserted
    /// - `SealNotFound`: if the seal does not exist
    async fn link_observation_to_seal(
        &mut self,
        observation_id: ObservationId,
        seal_id: SealId,
    ) -> Result<(), StorageError>;

    /// Record a derived fact against an observation.
    async fn insert_derived_fact(
        &mut self,
        observation_id: ObservationId,
        fact: DerivedFact,
    ) -> Result<(), StorageError>;

    /// Register an observer. Returns `DuplicateKey` if the name is taken.
    async fn create_observer(&mut self, name: &str) -> Result<(), StorageError>;

    /// Mark an observation as reviewed.
    ///
    /// # Errors
    /// - `ObservationNotFound`: if no such observation exists
    async fn approve_observation(
        &mut self,
        observation_id: ObservationId,
    ) -> Result<(), StorageError>;
}

/// A unit of work against the registry.
#[async_trait]
pub trait RegistryTransaction: RegistryReader + RegistryWriter {
    /// Publish every write made in this transaction.
    ///
    /// # Errors
    /// - `Conflict`: if another transaction committed since this one began
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// A registry backend.
#[async_trait]
pub trait RegistryStore: RegistryReader {
    /// Begin a transaction. Reads inside it see its own writes.
    ///
    /// # Errors
    /// - `BackendError`: if the backend cannot open a transaction
    async fn begin(&self) -> Result<Box<dyn RegistryTransaction>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_reader_object_safe(_: &dyn RegistryReader) {}
    fn _assert_store_object_safe(_: &dyn RegistryStore) {}
    fn _assert_transaction_object_safe(_: &dyn RegistryTransaction) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ObservationNotFound(ObservationId::new());
        assert!(err.to_string().contains("Observation not found"));

        let err = StorageError::Conflict("version 3 != 4".to_string());
        assert!(err.to_string().contains("version 3 != 4"));
    }

    #[test]
    fn test_derived_fact_kind() {
        assert_eq!(DerivedFact::PupAge(3).kind(), "pup_age");
        let seal_id = SealId::anchored_at(ObservationId::new());
        let fact = DerivedFact::Tags {
            tags: vec![IdentifierEntry::existing("T1")],
            seal_id,
        };
        assert_eq!(fact.kind(), "tags");
    }
}
