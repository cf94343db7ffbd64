//! # seal-registry - Identity resolution for tagged and marked seals
//!
//! Field observers record sightings of seals that carry plastic tags
//! (permanent, globally unique) and painted marks (reapplied every season,
//! unique only within a season). This crate decides which known seal a new
//! sighting belongs to and persists it.
//!
//! ## Core Concepts
//!
//! - **Classification**: each submitted mark or tag number is complete,
//!   partial (contains `*`, `?` or `_` wildcards) or unusable
//! - **Collision guard**: a number claimed as newly applied must not be
//!   registered yet
//! - **Resolution**: the first tag, else the first mark, is looked up to
//!   yield an exact match, an unregistered identifier, or candidate seals
//! - **Commit**: one transaction persists the observation, its derived facts
//!   and its seal linkage, creating a seal when none matches
//!
//! ## Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use seal_registry::{classify, IdentifierEntry, ObservationPayload};
//!
//! let payload = ObservationPayload::on(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
//!     .with_tag(IdentifierEntry::existing("T2*"))
//!     .with_mark(IdentifierEntry::new_identifier("M9"));
//!
//! let classification = classify(&payload);
//! assert_eq!(classification.partial.tags.len(), 1);
//! assert_eq!(classification.complete.marks.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod identifier;
pub mod observation;
pub mod seal;

// Matching core
pub mod classify;
pub mod guard;
pub mod lookup;
pub mod policy;
pub mod resolver;

// Persistence and service surface
pub mod commit;
pub mod config;
pub mod service;
pub mod session;
pub mod storage;
pub mod validation;

// Re-export primary types at crate root for convenience
pub use classify::{classify, Classification, Classified, IdentifierSet};
pub use commit::{CommitReceipt, CommitStage, ObservationCommit};
pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult, Rejection, SessionError, ValidationError};
pub use identifier::{FragmentPattern, Identifier, IdentifierKind, Legibility};
pub use observation::{
    IdentifierEntry, Measurement, Observation, ObservationId, ObservationPayload, Observer,
    RecordedIdentifier, Season, Sex,
};
pub use policy::{FirstTagThenMark, MatchPolicy};
pub use resolver::{Resolution, SealResolver};
pub use seal::{Seal, SealId, SealMatch};
pub use service::{ErrorResponse, ObservationService, Reply};
pub use session::{Clock, CredentialVerifier, Session, SessionStore, SessionToken, SystemClock};
pub use storage::{
    DerivedFact, InMemoryRegistry, RegistryReader, RegistryStore, RegistryTransaction,
    RegistryWriter, StorageError,
};
