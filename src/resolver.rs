//! Seal resolution.
//!
//! Decides whether an observation refers to a known seal. Precedence:
//!
//! 1. A complete identifier is present: look it up exactly. A hit is an
//!    exact match; a miss means the identifier is unregistered and the
//!    observation will establish a new seal when committed.
//! 2. Otherwise a partial identifier is present: every seal consistent with
//!    the fragment is returned, in store order, for the submitter to choose.
//! 3. Otherwise the observation is rejected.
//!
//! Which identifier is probed is up to the [`MatchPolicy`].

use std::sync::Arc;

use crate::classify::{classify, Classification};
use crate::error::{RegistryResult, Rejection};
use crate::guard::check_new_identifiers;
use crate::identifier::{Identifier, IdentifierKind};
use crate::lookup::{lookup_exact, lookup_partial, with_histories, with_history};
use crate::observation::ObservationPayload;
use crate::policy::{FirstTagThenMark, MatchPolicy};
use crate::seal::{Seal, SealMatch};
use crate::storage::RegistryReader;

/// Outcome of resolving an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The probed identifier belongs to a known seal.
    ExactMatch(SealMatch),

    /// A complete identifier was given but nothing is registered under it.
    Unregistered(Identifier),

    /// Seals consistent with a partial identifier, possibly none.
    Candidates(Vec<SealMatch>),
}

impl Resolution {
    /// The matched seal, for exact matches.
    #[must_use]
    pub fn seal(&self) -> Option<&Seal> {
        match self {
            Self::ExactMatch(m) => Some(&m.seal),
            _ => None,
        }
    }

    /// Returns true for exact matches.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self, Self::ExactMatch(_))
    }

    /// Informational message for unregistered identifiers.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Unregistered(identifier) => Some(match identifier.kind() {
                IdentifierKind::Tag => "No seals with this tag number found.",
                IdentifierKind::Mark => "No seals with this mark found.",
            }),
            _ => None,
        }
    }
}

/// Resolves observations against the registry.
#[derive(Debug, Clone)]
pub struct SealResolver {
    policy: Arc<dyn MatchPolicy>,
}

impl Default for SealResolver {
    fn default() -> Self {
        Self::new(Arc::new(FirstTagThenMark))
    }
}

impl SealResolver {
    /// Create a resolver using `policy` to pick identifiers.
    #[must_use]
    pub fn new(policy: Arc<dyn MatchPolicy>) -> Self {
        Self { policy }
    }

    /// The identifier selection policy.
    #[must_use]
    pub fn policy(&self) -> &dyn MatchPolicy {
        self.policy.as_ref()
    }

    /// Dry-run resolution: classify, guard, then resolve. Writes nothing.
    ///
    /// # Errors
    /// - `Rejection::BadIdentifierFormat`: if no identifier is legible
    /// - `Rejection::NewTagExists` / `Rejection::NewMarkExists`: on a collision
    /// - `Storage`: if a lookup fails
    pub async fn resolve<R>(
        &self,
        reader: &R,
        payload: &ObservationPayload,
    ) -> RegistryResult<Resolution>
    where
        R: RegistryReader + ?Sized,
    {
        let classification = classify(payload);
        check_new_identifiers(reader, &classification.complete).await?;
        self.resolve_classified(reader, &classification).await
    }

    /// Resolve an already classified and guarded observation.
    ///
    /// # Errors
    /// Same as [`resolve`](Self::resolve), minus the collision check.
    pub async fn resolve_classified<R>(
        &self,
        reader: &R,
        classification: &Classification,
    ) -> RegistryResult<Resolution>
    where
        R: RegistryReader + ?Sized,
    {
        if let Some(identifier) = self.policy.probe(&classification.complete) {
            let resolution = match lookup_exact(reader, &identifier).await? {
                Some(seal) => Resolution::ExactMatch(with_history(reader, seal).await?),
                None => Resolution::Unregistered(identifier),
            };
            tracing::debug!(
                policy = self.policy.name(),
                exact = resolution.is_exact(),
                "resolved complete identifier"
            );
            return Ok(resolution);
        }

        if let Some(identifier) = self.policy.probe(&classification.partial) {
            let seals = lookup_partial(reader, &identifier).await?;
            let candidates = with_histories(reader, seals).await?;
            tracing::debug!(
                policy = self.policy.name(),
                candidates = candidates.len(),
                "resolved partial identifier"
            );
            return Ok(Resolution::Candidates(candidates));
        }

        tracing::warn!(unusable = classification.unusable, "no usable mark or tag");
        Err(Rejection::BadIdentifierFormat.into())
    }

    /// Seal a committed observation joins, or `None` if it founds a new one.
    ///
    /// # Errors
    /// - `Rejection::MissingIdentifiers`: if the observation has no marks or tags
    pub async fn resolve_linkage<R>(
        &self,
        reader: &R,
        payload: &ObservationPayload,
    ) -> RegistryResult<Option<Seal>>
    where
        R: RegistryReader + ?Sized,
    {
        let identifier = self
            .policy
            .linkage_probe(payload)
            .ok_or(Rejection::MissingIdentifiers)?;
        Ok(lookup_exact(reader, &identifier).await?)
    }
}
