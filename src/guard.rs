//! Collision guard.
//!
//! An observer may claim that a mark or tag was applied during the sighting.
//! Such a claim is only valid if the number is not registered yet (within the
//! season, for marks). The guard checks complete tags first, then complete
//! marks, each in submission order, and stops at the first violation so the
//! reported error is deterministic.

use crate::classify::IdentifierSet;
use crate::error::{RegistryResult, Rejection};
use crate::lookup::lookup_exact;
use crate::storage::RegistryReader;

/// Rejects the observation if an identifier claimed as new already exists.
///
/// Does not write anything.
///
/// # Errors
/// - `Rejection::NewTagExists` / `Rejection::NewMarkExists`: on the first
///   registered identifier claimed as new
/// - `Storage`: if a lookup fails
pub async fn check_new_identifiers<R>(reader: &R, complete: &IdentifierSet) -> RegistryResult<()>
where
    R: RegistryReader + ?Sized,
{
    for classified in complete.tags.iter().chain(complete.marks.iter()) {
        if !classified.is_new {
            continue;
        }

        let identifier = &classified.identifier;
        if let Some(seal) = lookup_exact(reader, identifier).await? {
            tracing::warn!(
                %identifier,
                index = classified.index,
                seal_id = %seal.id,
                "identifier listed as new is already registered"
            );
            let number = identifier.number();
            return Err(Rejection::collision(identifier.kind(), number, complete.season).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::classify::classify;
    use crate::commit::ObservationCommit;
    use crate::error::RegistryError;
    use crate::observation::{IdentifierEntry, ObservationPayload, Season};
    use crate::resolver::SealResolver;
    use crate::storage::InMemoryRegistry;

    fn on(y: i32, m: u32, d: u32) -> ObservationPayload {
        ObservationPayload::on(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    async fn seeded() -> InMemoryRegistry {
        let registry = InMemoryRegistry::new();
        let payload = on(2020, 5, 1)
            .with_tag(IdentifierEntry::new_identifier("T100"))
            .with_mark(IdentifierEntry::new_identifier("M5"));
        ObservationCommit::new(&SealResolver::default())
            .run(&registry, &payload, "tester")
            .await
            .unwrap();
        registry
    }

    async fn check(
        registry: &InMemoryRegistry,
        payload: &ObservationPayload,
    ) -> RegistryResult<()> {
        check_new_identifiers(registry, &classify(payload).complete).await
    }

    #[tokio::test]
    async fn new_tag_that_exists_is_rejected() {
        let registry = seeded().await;
        let payload = on(2021, 1, 1).with_tag(IdentifierEntry::new_identifier("t100"));
        let err = check(&registry, &payload)
            .await
            .unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::NewTagExists {
                number: "t100".to_string()
            })
        );
    }

    #[tokio::test]
    async fn new_mark_is_checked_within_its_season() {
        let registry = seeded().await;
        let err = check(&registry, &on(2020, 9, 1).with_mark(IdentifierEntry::new_identifier("M5")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(Rejection::NewMarkExists { season, .. })
                if season == Season::new(2020)
        ));

        check(&registry, &on(2021, 9, 1).with_mark(IdentifierEntry::new_identifier("M5")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_identifiers_are_not_checked() {
        let registry = seeded().await;
        let payload = on(2020, 6, 1)
            .with_tag(IdentifierEntry::existing("T100"))
            .with_mark(IdentifierEntry::existing("M5"));
        check(&registry, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn tags_are_reported_before_marks() {
        let registry = seeded().await;
        let payload = on(2020, 6, 1)
            .with_mark(IdentifierEntry::new_identifier("M5"))
            .with_tag(IdentifierEntry::new_identifier("T100"));
        let err = check(&registry, &payload).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::NewTagExists { .. })));
    }

    #[tokio::test]
    async fn partial_identifiers_are_ignored() {
        let registry = seeded().await;
        let payload = on(2020, 6, 1).with_tag(IdentifierEntry::new_identifier("T10*"));
        check(&registry, &payload).await.unwrap();
    }
}
