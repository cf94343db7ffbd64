//! In-memory storage backend.
//!
//! Thread-safe in-memory implementation of the registry traits, intended for
//! embedded usage, tests, and as a reference implementation.
//!
//! Transactions work on a private copy of the registry and are published with
//! an optimistic version check: if another transaction committed first, the
//! later commit fails with [`StorageError::Conflict`] and nothing is written.
//! That closes the window between checking an identifier and registering it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use async_trait::async_trait;

use crate::identifier::{normalize_number, FragmentPattern, IdentifierKind, Legibility};
use crate::observation::{
    IdentifierEntry, Observation, ObservationId, ObservationPayload, Observer, RecordedIdentifier,
    Season, Sex,
};
use crate::seal::{Seal, SealId};
use crate::storage::traits::{
    DerivedFact, RegistryReader, RegistryStore, RegistryTransaction, RegistryWriter, StorageError,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn pattern_err(fragment: &str, e: &regex::Error) -> StorageError {
    StorageError::BackendError(format!("cannot compile fragment '{fragment}': {e}"))
}

/// Index entry for a registered mark or tag.
#[derive(Debug, Clone)]
struct RegisteredIdentifier {
    key: String,
    season: Option<Season>,
    seal_id: SealId,
}

#[derive(Debug, Clone, Default)]
struct RegistryState {
    version: u64,
    observations: HashMap<ObservationId, Observation>,
    observation_order: Vec<ObservationId>,
    seals: HashMap<SealId, Seal>,
    links: HashMap<SealId, Vec<ObservationId>>,
    marks: Vec<RegisteredIdentifier>,
    tags: Vec<RegisteredIdentifier>,
    observers: HashMap<String, Observer>,
}

impl RegistryState {
    fn index(&self, kind: IdentifierKind) -> &[RegisteredIdentifier] {
        match kind {
            IdentifierKind::Mark => &self.marks,
            IdentifierKind::Tag => &self.tags,
        }
    }

    fn seal(&self, id: SealId) -> Result<Seal, StorageError> {
        self.seals
            .get(&id)
            .cloned()
            .ok_or(StorageError::SealNotFound(id))
    }

    fn lookup_exact(
        &self,
        kind: IdentifierKind,
        number: &str,
        season: Option<Season>,
    ) -> Result<Option<Seal>, StorageError> {
        let key = normalize_number(number);
        if key.is_empty() {
            return Ok(None);
        }

        self.index(kind)
            .iter()
            .find(|r| r.key == key && r.season == season)
            .map(|r| self.seal(r.seal_id))
            .transpose()
    }

    fn lookup_partial(
        &self,
        kind: IdentifierKind,
        fragment: &str,
        season: Option<Season>,
    ) -> Result<Vec<Seal>, StorageError> {
        let compiled = FragmentPattern::compile(fragment).map_err(|e| pattern_err(fragment, &e))?;
        let Some(pattern) = compiled else {
            return Ok(Vec::new());
        };

        let mut seen: HashSet<SealId> = HashSet::new();
        let mut seals = Vec::new();
        for r in self.index(kind) {
            if r.season != season || !pattern.matches(&r.key) {
                continue;
            }
            if seen.insert(r.seal_id) {
                seals.push(self.seal(r.seal_id)?);
            }
        }
        Ok(seals)
    }

    fn history(&self, seal_id: SealId) -> Result<Vec<Observation>, StorageError> {
        if !self.seals.contains_key(&seal_id) {
            return Err(StorageError::SealNotFound(seal_id));
        }

        let mut history: Vec<Observation> = self
            .links
            .get(&seal_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.observations.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        // Stable: sightings on the same day keep their link order.
        history.sort_by_key(|o| o.date);
        Ok(history)
    }

    fn pending(&self, count: usize, page: usize) -> Vec<Observation> {
        let skip = page.saturating_sub(1).saturating_mul(count);
        self.observation_order
            .iter()
            .filter_map(|id| self.observations.get(id))
            .filter(|o| !o.approved)
            .skip(skip)
            .take(count)
            .cloned()
            .collect()
    }

    fn pending_count(&self) -> usize {
        self.observations.values().filter(|o| !o.approved).count()
    }

    fn observation_mut(&mut self, id: ObservationId) -> Result<&mut Observation, StorageError> {
        self.observations
            .get_mut(&id)
            .ok_or(StorageError::ObservationNotFound(id))
    }

    fn insert_observation(
        &mut self,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> ObservationId {
        let id = ObservationId::new();
        self.observations
            .insert(id, Observation::from_payload(id, payload, submitted_by));
        self.observation_order.push(id);
        id
    }

    fn create_seal(
        &mut self,
        anchor: ObservationId,
        sex: Option<Sex>,
        procedure: Option<String>,
    ) -> Result<Seal, StorageError> {
        if !self.observations.contains_key(&anchor) {
            return Err(StorageError::ObservationNotFound(anchor));
        }
        let seal = Seal::new(anchor, sex, procedure);
        if self.seals.contains_key(&seal.id) {
            return Err(StorageError::DuplicateKey(seal.id.to_string()));
        }
        self.seals.insert(seal.id, seal.clone());
        Ok(seal)
    }

    fn link(&mut self, observation_id: ObservationId, seal_id: SealId) -> Result<(), StorageError> {
        if !self.seals.contains_key(&seal_id) {
            return Err(StorageError::SealNotFound(seal_id));
        }
        let observation = self.observation_mut(observation_id)?;
        match observation.seal_id {
            Some(existing) if existing == seal_id => return Ok(()),
            Some(existing) => {
                return Err(StorageError::DuplicateKey(format!(
                    "observation {observation_id} is already linked to seal {existing}"
                )))
            }
            None => observation.seal_id = Some(seal_id),
        }
        self.links.entry(seal_id).or_default().push(observation_id);
        Ok(())
    }

    fn register(
        &mut self,
        kind: IdentifierKind,
        observation_id: ObservationId,
        entries: Vec<IdentifierEntry>,
        season: Option<Season>,
        seal_id: SealId,
    ) -> Result<(), StorageError> {
        let mut indexed = Vec::with_capacity(entries.len());
        let mut recorded = Vec::with_capacity(entries.len());
        for entry in entries {
            // Only fully legible numbers identify a seal; fragments are kept on
            // the observation for the record.
            if Legibility::of(&entry.number) == Legibility::Complete {
                indexed.push(RegisteredIdentifier {
                    key: normalize_number(&entry.number),
                    season,
                    seal_id,
                });
            }
            recorded.push(RecordedIdentifier {
                number: entry.number.trim().to_string(),
                is_new: entry.is_new,
                position: entry.position,
                season,
                seal_id,
            });
        }

        let observation = self.observation_mut(observation_id)?;
        match kind {
            IdentifierKind::Mark => observation.marks.extend(recorded),
            IdentifierKind::Tag => observation.tags.extend(recorded),
        }
        match kind {
            IdentifierKind::Mark => self.marks.extend(indexed),
            IdentifierKind::Tag => self.tags.extend(indexed),
        }
        Ok(())
    }

    fn insert_derived_fact(
        &mut self,
        observation_id: ObservationId,
        fact: DerivedFact,
    ) -> Result<(), StorageError> {
        match fact {
            DerivedFact::Measurement(m) => {
                self.observation_mut(observation_id)?.measurement = Some(m);
            }
            DerivedFact::PupAge(age) => {
                self.observation_mut(observation_id)?.pup_age = Some(age);
            }
            DerivedFact::PupCount(count) => {
                self.observation_mut(observation_id)?.pup_count = Some(count);
            }
            DerivedFact::Marks {
                marks,
                season,
                seal_id,
            } => self.register(IdentifierKind::Mark, observation_id, marks, Some(season), seal_id)?,
            DerivedFact::Tags { tags, seal_id } => {
                self.register(IdentifierKind::Tag, observation_id, tags, None, seal_id)?;
            }
        }
        Ok(())
    }

    fn create_observer(&mut self, name: &str) -> Result<(), StorageError> {
        if self.observers.contains_key(name) {
            return Err(StorageError::DuplicateKey(name.to_string()));
        }
        self.observers.insert(name.to_string(), Observer::new(name));
        Ok(())
    }

    fn approve(&mut self, observation_id: ObservationId) -> Result<(), StorageError> {
        self.observation_mut(observation_id)?.approved = true;
        Ok(())
    }
}

/// Thread-safe in-memory registry.
///
/// Clones share the same underlying registry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    shared: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
        context: &'static str,
    ) -> Result<RwLockReadGuard<'_, RegistryState>, StorageError> {
        self.shared.read().map_err(|_| lock_err(context))
    }

    /// Number of committed transactions.
    ///
    /// # Errors
    /// - `BackendError`: if the state lock is poisoned
    pub fn version(&self) -> Result<u64, StorageError> {
        Ok(self.read("registry.version")?.version)
    }

    /// Number of known seals.
    ///
    /// # Errors
    /// - `BackendError`: if the state lock is poisoned
    pub fn seal_count(&self) -> Result<usize, StorageError> {
        Ok(self.read("registry.seal_count")?.seals.len())
    }

    /// Number of stored observations.
    ///
    /// # Errors
    /// - `BackendError`: if the state lock is poisoned
    pub fn observation_count(&self) -> Result<usize, StorageError> {
        Ok(self.read("registry.observation_count")?.observations.len())
    }
}

#[async_trait]
impl RegistryReader for InMemoryRegistry {
    async fn lookup_exact_mark(
        &self,
        number: &str,
        season: Season,
    ) -> Result<Option<Seal>, StorageError> {
        self.read("registry.lookup_exact_mark")?
            .lookup_exact(IdentifierKind::Mark, number, Some(season))
    }

    async fn lookup_exact_tag(&self, number: &str) -> Result<Option<Seal>, StorageError> {
        self.read("registry.lookup_exact_tag")?
            .lookup_exact(IdentifierKind::Tag, number, None)
    }

    async fn lookup_partial_marks(
        &self,
        fragment: &str,
        season: Season,
    ) -> Result<Vec<Seal>, StorageError> {
        self.read("registry.lookup_partial_marks")?
            .lookup_partial(IdentifierKind::Mark, fragment, Some(season))
    }

    async fn lookup_partial_tags(&self, fragment: &str) -> Result<Vec<Seal>, StorageError> {
        self.read("registry.lookup_partial_tags")?
            .lookup_partial(IdentifierKind::Tag, fragment, None)
    }

    async fn lookup_seal_observation_history(
        &self,
        seal_id: SealId,
    ) -> Result<Vec<Observation>, StorageError> {
        self.read("registry.history")?.history(seal_id)
    }

    async fn find_observer(&self, name: &str) -> Result<Option<Observer>, StorageError> {
        Ok(self.read("registry.find_observer")?.observers.get(name).cloned())
    }

    async fn pending_observations(
        &self,
        count: usize,
        page: usize,
    ) -> Result<Vec<Observation>, StorageError> {
        Ok(self.read("registry.pending_observations")?.pending(count, page))
    }

    async fn pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.read("registry.pending_count")?.pending_count())
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn begin(&self) -> Result<Box<dyn RegistryTransaction>, StorageError> {
        let snapshot = self.read("registry.begin")?.clone();
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            base_version: snapshot.version,
            working: snapshot,
        }))
    }
}

/// Transaction over an [`InMemoryRegistry`].
#[derive(Debug)]
struct InMemoryTransaction {
    shared: Arc<RwLock<RegistryState>>,
    base_version: u64,
    working: RegistryState,
}

#[async_trait]
impl RegistryReader for InMemoryTransaction {
    async fn lookup_exact_mark(
        &self,
        number: &str,
        season: Season,
    ) -> Result<Option<Seal>, StorageError> {
        self.working
            .lookup_exact(IdentifierKind::Mark, number, Some(season))
    }

    async fn lookup_exact_tag(&self, number: &str) -> Result<Option<Seal>, StorageError> {
        self.working.lookup_exact(IdentifierKind::Tag, number, None)
    }

    async fn lookup_partial_marks(
        &self,
        fragment: &str,
        season: Season,
    ) -> Result<Vec<Seal>, StorageError> {
        self.working
            .lookup_partial(IdentifierKind::Mark, fragment, Some(season))
    }

    async fn lookup_partial_tags(&self, fragment: &str) -> Result<Vec<Seal>, StorageError> {
        self.working.lookup_partial(IdentifierKind::Tag, fragment, None)
    }

    async fn lookup_seal_observation_history(
        &self,
        seal_id: SealId,
    ) -> Result<Vec<Observation>, StorageError> {
        self.working.history(seal_id)
    }

    async fn find_observer(&self, name: &str) -> Result<Option<Observer>, StorageError> {
        Ok(self.working.observers.get(name).cloned())
    }

    async fn pending_observations(
        &self,
        count: usize,
        page: usize,
    ) -> Result<Vec<Observation>, StorageError> {
        Ok(self.working.pending(count, page))
    }

    async fn pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.working.pending_count())
    }
}

#[async_trait]
impl RegistryWriter for InMemoryTransaction {
    async fn insert_observation(
        &mut self,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> Result<ObservationId, StorageError> {
        Ok(self.working.insert_observation(payload, submitted_by))
    }

    async fn create_seal(
        &mut self,
        anchor: ObservationId,
        sex: Option<Sex>,
        procedure: Option<String>,
    ) -> Result<Seal, StorageError> {
        self.working.create_seal(anchor, sex, procedure)
    }

    async fn link_observation_to_seal(
        &mut self,
        observation_id: ObservationId,
        seal_id: SealId,
    ) -> Result<(), StorageError> {
        self.working.link(observation_id, seal_id)
    }

    async fn insert_derived_fact(
        &mut self,
        observation_id: ObservationId,
        fact: DerivedFact,
    ) -> Result<(), StorageError> {
        self.working.insert_derived_fact(observation_id, fact)
    }

    async fn create_observer(&mut self, name: &str) -> Result<(), StorageError> {
        self.working.create_observer(name)
    }

    async fn approve_observation(
        &mut self,
        observation_id: ObservationId,
    ) -> Result<(), StorageError> {
        self.working.approve(observation_id)
    }
}

#[async_trait]
impl RegistryTransaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let Self {
            shared,
            base_version,
            mut working,
        } = *self;

        let mut state = shared.write().map_err(|_| lock_err("registry.commit"))?;
        if state.version != base_version {
            return Err(StorageError::Conflict(format!(
                "registry moved from version {base_version} to {} during the transaction",
                state.version
            )));
        }
        working.version = base_version + 1;
        *state = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::observation::Measurement;

    fn payload(y: i32, m: u32, d: u32) -> ObservationPayload {
        ObservationPayload::on(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    /// Commits one observation anchoring a new seal with the given tags and marks.
    async fn register_seal(
        registry: &InMemoryRegistry,
        observation: ObservationPayload,
        tags: &[&str],
        marks: &[&str],
    ) -> SealId {
        let mut tx = registry.begin().await.unwrap();
        let obs = tx.insert_observation(&observation, "tester").await.unwrap();
        let seal_id = tx.create_seal(obs, None, None).await.unwrap().id;
        let season = observation.season();
        tx.insert_derived_fact(
            obs,
            DerivedFact::Tags {
                tags: tags.iter().map(|t| IdentifierEntry::existing(*t)).collect(),
                seal_id,
            },
        )
        .await
        .unwrap();
        tx.insert_derived_fact(
            obs,
            DerivedFact::Marks {
                marks: marks.iter().map(|m| IdentifierEntry::existing(*m)).collect(),
                season,
                seal_id,
            },
        )
        .await
        .unwrap();
        tx.link_observation_to_seal(obs, seal_id).await.unwrap();
        tx.commit().await.unwrap();
        seal_id
    }

    #[tokio::test]
    async fn exact_lookup_is_case_insensitive_and_season_scoped() {
        let registry = InMemoryRegistry::new();
        let seal = register_seal(&registry, payload(2020, 5, 1), &["T100"], &["M5"]).await;

        let found = registry.lookup_exact_tag(" t100 ").await.unwrap().unwrap();
        assert_eq!(found.id, seal);

        let season = Season::new(2020);
        assert_eq!(
            registry.lookup_exact_mark("m5", season).await.unwrap().map(|s| s.id),
            Some(seal)
        );
        assert!(registry
            .lookup_exact_mark("M5", Season::new(2021))
            .await
            .unwrap()
            .is_none());
        assert!(registry.lookup_exact_tag("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_lookup_keeps_registration_order_and_dedupes() {
        let registry = InMemoryRegistry::new();
        let first = register_seal(&registry, payload(2020, 5, 1), &["T200", "T201"], &[]).await;
        let second = register_seal(&registry, payload(2020, 5, 2), &["T250"], &[]).await;
        register_seal(&registry, payload(2020, 5, 3), &["T300"], &[]).await;

        let seals = registry.lookup_partial_tags("T2*").await.unwrap();
        let ids: Vec<SealId> = seals.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first, second]);

        assert!(registry.lookup_partial_tags("**").await.unwrap().is_empty());
        assert!(registry
            .lookup_partial_marks("M*", Season::new(2020))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn fragments_are_recorded_but_not_indexed() {
        let registry = InMemoryRegistry::new();
        let seal = register_seal(&registry, payload(2020, 5, 1), &["T1*", "T150"], &[]).await;

        assert!(registry.lookup_exact_tag("T1*").await.unwrap().is_none());
        let history = registry.lookup_seal_observation_history(seal).await.unwrap();
        assert_eq!(history.len(), 1);
        let numbers: Vec<&str> = history[0].tags.iter().map(|t| t.number.as_str()).collect();
        assert_eq!(numbers, vec!["T1*", "T150"]);
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible_and_dropped() {
        let registry = InMemoryRegistry::new();
        {
            let mut tx = registry.begin().await.unwrap();
            let obs = tx.insert_observation(&payload(2020, 5, 1), "tester").await.unwrap();
            tx.create_seal(obs, None, None).await.unwrap();
            assert_eq!(registry.seal_count().unwrap(), 0);
        }
        assert_eq!(registry.seal_count().unwrap(), 0);
        assert_eq!(registry.observation_count().unwrap(), 0);
        assert_eq!(registry.version().unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_transaction_conflicts() {
        let registry = InMemoryRegistry::new();
        let mut slow = registry.begin().await.unwrap();
        slow.insert_observation(&payload(2020, 5, 1), "slow").await.unwrap();

        register_seal(&registry, payload(2020, 5, 1), &["T1"], &[]).await;

        let err = slow.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(registry.observation_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn history_is_chronological() {
        let registry = InMemoryRegistry::new();
        let seal = register_seal(&registry, payload(2020, 6, 1), &["T1"], &[]).await;

        let mut tx = registry.begin().await.unwrap();
        let earlier = tx.insert_observation(&payload(2020, 5, 1), "tester").await.unwrap();
        tx.link_observation_to_seal(earlier, seal).await.unwrap();
        tx.commit().await.unwrap();

        let history = registry.lookup_seal_observation_history(seal).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, earlier);
        assert_eq!(history[1].id, seal.first_observation());
    }

    #[tokio::test]
    async fn link_rejects_unknown_seal_and_relinking() {
        let registry = InMemoryRegistry::new();
        let a = register_seal(&registry, payload(2020, 5, 1), &["T1"], &[]).await;
        let b = register_seal(&registry, payload(2020, 5, 2), &["T2"], &[]).await;

        let mut tx = registry.begin().await.unwrap();
        let unknown = SealId::anchored_at(ObservationId::new());
        let err = tx
            .link_observation_to_seal(a.first_observation(), unknown)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SealNotFound(_)));

        tx.link_observation_to_seal(a.first_observation(), a).await.unwrap();
        let err = tx
            .link_observation_to_seal(a.first_observation(), b)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn derived_facts_and_observers() {
        let registry = InMemoryRegistry::new();
        let mut tx = registry.begin().await.unwrap();
        let obs = tx.insert_observation(&payload(2021, 1, 9), "tester").await.unwrap();
        let measurement = Measurement {
            mass: Some(350.5),
            ..Measurement::default()
        };
        tx.insert_derived_fact(obs, DerivedFact::Measurement(measurement.clone()))
            .await
            .unwrap();
        tx.insert_derived_fact(obs, DerivedFact::PupAge(4)).await.unwrap();
        tx.insert_derived_fact(obs, DerivedFact::PupCount(1)).await.unwrap();
        tx.create_observer("Ana").await.unwrap();
        assert!(matches!(
            tx.create_observer("Ana").await.unwrap_err(),
            StorageError::DuplicateKey(_)
        ));
        let err = tx
            .insert_derived_fact(ObservationId::new(), DerivedFact::PupAge(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObservationNotFound(_)));
        tx.commit().await.unwrap();

        assert!(registry.find_observer("Ana").await.unwrap().is_some());
        let pending = registry.pending_observations(10, 1).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].measurement, Some(measurement));
        assert_eq!(pending[0].pup_age, Some(4));
        assert_eq!(pending[0].pup_count, Some(1));
    }

    #[tokio::test]
    async fn pending_pages_and_approval() {
        let registry = InMemoryRegistry::new();
        let mut tx = registry.begin().await.unwrap();
        let mut ids = Vec::new();
        for day in 1..=5 {
            ids.push(tx.insert_observation(&payload(2021, 2, day), "tester").await.unwrap());
        }
        tx.approve_observation(ids[1]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(registry.pending_count().await.unwrap(), 4);
        let page1: Vec<ObservationId> = registry
            .pending_observations(2, 1)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(page1, vec![ids[0], ids[2]]);
        let page2: Vec<ObservationId> = registry
            .pending_observations(2, 2)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(page2, vec![ids[3], ids[4]]);
        assert!(registry.pending_observations(2, 3).await.unwrap().is_empty());
    }
}
