//! Registry lookup.
//!
//! Resolves an [`Identifier`] to candidate seals through the store. Marks are
//! looked up within their season, tags globally.

use crate::identifier::Identifier;
use crate::seal::{Seal, SealMatch};
use crate::storage::{RegistryReader, StorageError};

/// Seal registered under exactly this identifier, if any.
///
/// # Errors
/// Propagates the reader's `StorageError`.
pub async fn lookup_exact<R>(
    reader: &R,
    identifier: &Identifier,
) -> Result<Option<Seal>, StorageError>
where
    R: RegistryReader + ?Sized,
{
    let seal = match identifier {
        Identifier::Tag { number } => reader.lookup_exact_tag(number).await?,
        Identifier::Mark { number, season } => reader.lookup_exact_mark(number, *season).await?,
    };
    tracing::debug!(%identifier, found = seal.is_some(), "exact lookup");
    Ok(seal)
}

/// Seals whose identifiers are consistent with a fragment, in store order.
///
/// # Errors
/// Propagates the reader's `StorageError`.
pub async fn lookup_partial<R>(
    reader: &R,
    identifier: &Identifier,
) -> Result<Vec<Seal>, StorageError>
where
    R: RegistryReader + ?Sized,
{
    let seals = match identifier {
        Identifier::Tag { number } => reader.lookup_partial_tags(number).await?,
        Identifier::Mark { number, season } => reader.lookup_partial_marks(number, *season).await?,
    };
    tracing::debug!(%identifier, candidates = seals.len(), "partial lookup");
    Ok(seals)
}

/// Attaches a seal's full observation history.
///
/// # Errors
/// Propagates the reader's `StorageError`.
pub async fn with_history<R>(reader: &R, seal: Seal) -> Result<SealMatch, StorageError>
where
    R: RegistryReader + ?Sized,
{
    let seal_observations = reader.lookup_seal_observation_history(seal.id).await?;
    Ok(SealMatch {
        seal,
        seal_observations,
    })
}

/// Attaches histories to every candidate, keeping their order.
///
/// Lookups run one after another; the store's order is authoritative.
///
/// # Errors
/// Fails on the first history lookup that fails.
pub async fn with_histories<R>(
    reader: &R,
    seals: Vec<Seal>,
) -> Result<Vec<SealMatch>, StorageError>
where
    R: RegistryReader + ?Sized,
{
    let mut matches = Vec::with_capacity(seals.len());
    for seal in seals {
        matches.push(with_history(reader, seal).await?);
    }
    Ok(matches)
}
