//! Observation service.
//!
//! Entry point for callers: validates input, runs dry-run resolution or the
//! commit, and serves the pending queue. Results convert into [`Reply`] and
//! errors into [`ErrorResponse`] for the wire.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commit::{CommitReceipt, ObservationCommit};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult, ValidationError};
use crate::observation::{Observation, ObservationId, ObservationPayload};
use crate::resolver::{Resolution, SealResolver};
use crate::seal::{Seal, SealMatch};
use crate::storage::{RegistryReader, RegistryStore, RegistryWriter};

/// Success payload returned to callers.
///
/// Serialized without a variant wrapper: a seal reply is an object with
/// `seal` and `sealObservations`, a message is a bare string, candidate
/// and observation lists are arrays and a count is a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// A seal and its observation history.
    #[serde(rename_all = "camelCase")]
    Seal {
        /// The seal.
        seal: Seal,
        /// Every observation linked to it, oldest first.
        seal_observations: Vec<Observation>,
    },

    /// Candidate seals for a partial identifier.
    Candidates(Vec<SealMatch>),

    /// Informational text, e.g. no seal under an exact identifier.
    Message(String),

    /// A page of observations.
    Observations(Vec<Observation>),

    /// A count.
    Count(usize),
}

impl From<SealMatch> for Reply {
    fn from(m: SealMatch) -> Self {
        Self::Seal {
            seal: m.seal,
            seal_observations: m.seal_observations,
        }
    }
}

impl From<Resolution> for Reply {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::ExactMatch(m) => m.into(),
            Resolution::Candidates(c) => Self::Candidates(c),
            unregistered @ Resolution::Unregistered(_) => {
                Self::Message(unregistered.message().unwrap_or_default().to_string())
            }
        }
    }
}

impl From<CommitReceipt> for Reply {
    fn from(receipt: CommitReceipt) -> Self {
        Self::Seal {
            seal: receipt.seal,
            seal_observations: receipt.seal_observations,
        }
    }
}

/// Error payload returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Human-readable messages.
    pub messages: Vec<String>,
}

impl From<&RegistryError> for ErrorResponse {
    fn from(err: &RegistryError) -> Self {
        Self {
            status: err.status(),
            messages: err.messages(),
        }
    }
}

impl From<RegistryError> for ErrorResponse {
    fn from(err: RegistryError) -> Self {
        Self::from(&err)
    }
}

/// Validates, resolves and commits observations against a store.
#[derive(Debug)]
pub struct ObservationService<S> {
    store: Arc<S>,
    resolver: SealResolver,
    config: RegistryConfig,
}

impl<S> Clone for ObservationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: RegistryStore> ObservationService<S> {
    /// Create a service with the default resolver and configuration.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            resolver: SealResolver::default(),
            config: RegistryConfig::default(),
        }
    }

    /// Replace the configuration.
    ///
    /// # Errors
    /// - `InvalidConfig`: if the configuration does not validate
    pub fn with_config(mut self, config: RegistryConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Replace the resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: SealResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Dry-run: which seal would this observation belong to? Writes nothing.
    ///
    /// # Errors
    /// - `Validation`: if the payload breaks a configured limit
    /// - `Rejection`: for a collision or unusable identifiers
    /// - `Storage`: if the store cannot be read
    #[tracing::instrument(
        skip_all,
        fields(date = %payload.date, tags = payload.tags.len(), marks = payload.marks.len())
    )]
    pub async fn validate_observation(
        &self,
        payload: &ObservationPayload,
    ) -> RegistryResult<Resolution> {
        payload.validate(&self.config)?;
        self.resolver.resolve(self.store.as_ref(), payload).await
    }

    /// Commit an observation submitted by `submitted_by`.
    ///
    /// # Errors
    /// - `Validation`: if the payload breaks a configured limit
    /// - `Rejection`: for a collision or an observation without identifiers
    /// - `Storage`: if the transaction fails; `Conflict` is retryable
    #[tracing::instrument(skip_all, fields(date = %payload.date, submitted_by = %submitted_by))]
    pub async fn submit_observation(
        &self,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> RegistryResult<CommitReceipt> {
        payload.validate(&self.config)?;
        ObservationCommit::new(&self.resolver)
            .run(self.store.as_ref(), payload, submitted_by)
            .await
    }

    /// A page of unapproved observations, oldest first. `page` starts at 1.
    ///
    /// # Errors
    /// - `Validation`: if `count` or `page` is out of range
    /// - `Storage`: if the store cannot be read
    #[tracing::instrument(skip(self))]
    pub async fn pending_observations(
        &self,
        count: usize,
        page: usize,
    ) -> RegistryResult<Vec<Observation>> {
        if count == 0 || count > self.config.max_page_size {
            return Err(ValidationError::InvalidValue {
                field: "count".to_string(),
                reason: format!("must be between 1 and {}", self.config.max_page_size),
            }
            .into());
        }
        if page == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(self.store.pending_observations(count, page).await?)
    }

    /// Number of unapproved observations.
    ///
    /// # Errors
    /// - `Storage`: if the store cannot be read
    pub async fn pending_count(&self) -> RegistryResult<usize> {
        Ok(self.store.pending_count().await?)
    }

    /// Mark an observation approved.
    ///
    /// # Errors
    /// - `Storage`: `NotFound` for an unknown id, or a failed transaction
    #[tracing::instrument(skip(self))]
    pub async fn approve_observation(&self, id: ObservationId) -> RegistryResult<()> {
        let mut tx = self.store.begin().await?;
        tx.approve_observation(id).await?;
        tx.commit().await?;
        tracing::info!(observation_id = %id, "observation approved");
        Ok(())
    }
}
