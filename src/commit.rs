//! Observation commit.
//!
//! Persists an observation together with its derived facts and seal linkage.
//! The whole sequence runs in one store transaction, so a failure at any
//! step leaves the registry untouched.
//!
//! Stages: `Received → ObserverResolved → Persisted → SealLinked →
//! Committed`. `Rejected` is reachable from any stage before `Persisted`.

use serde::{Deserialize, Serialize};

use crate::classify::classify;
use crate::error::{RegistryError, RegistryResult, Rejection};
use crate::guard::check_new_identifiers;
use crate::observation::{Observation, ObservationId, ObservationPayload};
use crate::resolver::SealResolver;
use crate::seal::{Seal, SealId};
use crate::storage::{
    DerivedFact, RegistryReader, RegistryStore, RegistryTransaction, RegistryWriter,
};

/// Progress of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStage {
    /// Input accepted, nothing done yet.
    Received,
    /// Observer known or registered.
    ObserverResolved,
    /// Observation row written.
    Persisted,
    /// Derived facts written against the resolved seal.
    SealLinked,
    /// Linkage recorded and transaction published.
    Committed,
    /// Refused before anything was persisted.
    Rejected,
}

impl CommitStage {
    /// Returns true if `next` may follow this stage.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::ObserverResolved)
                | (Self::ObserverResolved, Self::Persisted)
                | (Self::Persisted, Self::SealLinked)
                | (Self::SealLinked, Self::Committed)
                | (Self::Received | Self::ObserverResolved, Self::Rejected)
        )
    }

    /// Returns true for `Committed` and `Rejected`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    /// The stored observation.
    pub observation_id: ObservationId,
    /// The seal it was linked to.
    pub seal: Seal,
    /// True if the observation established a new seal.
    pub created_seal: bool,
    /// The seal's full history, including this observation.
    pub seal_observations: Vec<Observation>,
}

/// One commit run.
#[derive(Debug)]
pub struct ObservationCommit<'a> {
    resolver: &'a SealResolver,
    stage: CommitStage,
}

impl<'a> ObservationCommit<'a> {
    /// Start a commit that links seals through `resolver`.
    #[must_use]
    pub const fn new(resolver: &'a SealResolver) -> Self {
        Self {
            resolver,
            stage: CommitStage::Received,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> CommitStage {
        self.stage
    }

    fn advance(&mut self, next: CommitStage) -> RegistryResult<()> {
        if !self.stage.can_transition_to(next) {
            return Err(RegistryError::internal(format!(
                "illegal commit transition {:?} -> {next:?}",
                self.stage
            )));
        }
        tracing::debug!(from = ?self.stage, to = ?next, "commit stage");
        self.stage = next;
        Ok(())
    }

    fn reject(&mut self, err: RegistryError) -> RegistryError {
        if self.stage.can_transition_to(CommitStage::Rejected) {
            tracing::warn!(stage = ?self.stage, error = %err, "observation rejected");
            self.stage = CommitStage::Rejected;
        }
        err
    }

    /// Persist `payload` on behalf of `submitted_by`.
    ///
    /// The payload must already be validated.
    ///
    /// # Errors
    /// - `Rejection::MissingIdentifiers`: no marks and no tags
    /// - `Rejection::NewTagExists` / `NewMarkExists`: a claimed-new identifier exists
    /// - `StorageError`: any store failure; nothing is persisted
    pub async fn run<S>(
        &mut self,
        store: &S,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> RegistryResult<CommitReceipt>
    where
        S: RegistryStore + ?Sized,
    {
        if self.stage != CommitStage::Received {
            return Err(RegistryError::internal("commit run was already used"));
        }
        if !payload.has_identifiers() {
            return Err(self.reject(Rejection::MissingIdentifiers.into()));
        }

        let mut tx = store.begin().await?;

        let classification = classify(payload);
        if let Err(err) = check_new_identifiers(&*tx, &classification.complete).await {
            return Err(self.reject(err));
        }

        resolve_observer(tx.as_mut(), payload.observer.as_deref()).await;
        self.advance(CommitStage::ObserverResolved)?;

        let observation_id = tx.insert_observation(payload, submitted_by).await?;
        self.advance(CommitStage::Persisted)?;

        let (seal, created_seal) = match self.resolver.resolve_linkage(&*tx, payload).await? {
            Some(seal) => (seal, false),
            None => {
                let seal = tx
                    .create_seal(observation_id, payload.sex, payload.procedure.clone())
                    .await?;
                tracing::info!(seal_id = %seal.id, "new seal established");
                (seal, true)
            }
        };
        let seal_id = seal.id;

        for fact in derived_facts(payload, seal_id) {
            tracing::debug!(kind = fact.kind(), %observation_id, "recording derived fact");
            tx.insert_derived_fact(observation_id, fact).await?;
        }
        self.advance(CommitStage::SealLinked)?;

        tx.link_observation_to_seal(observation_id, seal_id).await?;
        let seal_observations = tx.lookup_seal_observation_history(seal_id).await?;
        tx.commit().await?;
        self.advance(CommitStage::Committed)?;

        tracing::info!(%observation_id, %seal_id, created_seal, "observation committed");
        Ok(CommitReceipt {
            observation_id,
            seal,
            created_seal,
            seal_observations,
        })
    }
}

/// Registers the observer if unknown. Failures are logged, never fatal.
async fn resolve_observer(tx: &mut dyn RegistryTransaction, observer: Option<&str>) {
    let Some(name) = observer.map(str::trim).filter(|n| !n.is_empty()) else {
        return;
    };
    match tx.find_observer(name).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::info!(observer = name, "registering observer");
            if let Err(e) = tx.create_observer(name).await {
                tracing::warn!(observer = name, error = %e, "could not register observer");
            }
        }
        Err(e) => tracing::warn!(observer = name, error = %e, "observer lookup failed"),
    }
}

fn derived_facts(payload: &ObservationPayload, seal_id: SealId) -> Vec<DerivedFact> {
    let mut facts = Vec::new();
    if let Some(m) = payload.measurement.as_ref().filter(|m| !m.is_empty()) {
        facts.push(DerivedFact::Measurement(m.clone()));
    }
    if let Some(age) = payload.pup_age {
        facts.push(DerivedFact::PupAge(age));
    }
    if let Some(count) = payload.pup_count {
        facts.push(DerivedFact::PupCount(count));
    }
    if !payload.marks.is_empty() {
        facts.push(DerivedFact::Marks {
            marks: payload.marks.clone(),
            season: payload.season(),
            seal_id,
        });
    }
    if !payload.tags.is_empty() {
        facts.push(DerivedFact::Tags {
            tags: payload.tags.clone(),
            seal_id,
        });
    }
    facts
}
