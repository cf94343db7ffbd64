//! Identifier classification.
//!
//! Splits the marks and tags of an observation into complete identifiers,
//! which can be looked up exactly, and partial ones, which need a fragment
//! lookup. Classification is an order-preserving filter: every classified
//! identifier remembers its index in the submitted list, so later stages can
//! always get back to the raw entry it came from.

use crate::identifier::{Identifier, IdentifierKind, Legibility};
use crate::observation::{IdentifierEntry, ObservationPayload, Season};

/// An identifier that survived classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Position in the submitted mark or tag list.
    pub index: usize,
    /// The identifier, trimmed and scoped.
    pub identifier: Identifier,
    /// The submitter's claim that this identifier is new.
    pub is_new: bool,
}

/// Marks and tags of one legibility class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSet {
    /// Season the marks are scoped to.
    pub season: Season,
    /// Tags, in submission order.
    pub tags: Vec<Classified>,
    /// Marks, in submission order.
    pub marks: Vec<Classified>,
}

impl IdentifierSet {
    /// Creates an empty set for `season`.
    #[must_use]
    pub const fn empty(season: Season) -> Self {
        Self {
            season,
            tags: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Returns true if neither tags nor marks are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.marks.is_empty()
    }

    /// Identifiers of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: IdentifierKind) -> &[Classified] {
        match kind {
            IdentifierKind::Tag => &self.tags,
            IdentifierKind::Mark => &self.marks,
        }
    }

    fn push(&mut self, kind: IdentifierKind, classified: Classified) {
        match kind {
            IdentifierKind::Tag => self.tags.push(classified),
            IdentifierKind::Mark => self.marks.push(classified),
        }
    }
}

/// Result of classifying an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Fully legible identifiers.
    pub complete: IdentifierSet,
    /// Fragmentary identifiers.
    pub partial: IdentifierSet,
    /// Number of entries that were neither complete nor partial.
    pub unusable: usize,
}

impl Classification {
    /// Returns true if no identifier can be used for matching.
    #[must_use]
    pub fn is_unusable(&self) -> bool {
        self.complete.is_empty() && self.partial.is_empty()
    }
}

/// Classifies an observation's identifiers.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use seal_registry::{classify, IdentifierEntry, ObservationPayload};
///
/// let payload = ObservationPayload::on(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap())
///     .with_tag(IdentifierEntry::existing("T2*"))
///     .with_tag(IdentifierEntry::existing("T100"));
/// let c = classify(&payload);
/// assert_eq!(c.complete.tags[0].index, 1);
/// assert_eq!(c.partial.tags[0].index, 0);
/// ```
#[must_use]
pub fn classify(payload: &ObservationPayload) -> Classification {
    let season = payload.season();
    let mut classification = Classification {
        complete: IdentifierSet::empty(season),
        partial: IdentifierSet::empty(season),
        unusable: 0,
    };

    for (kind, entries) in [
        (IdentifierKind::Tag, &payload.tags),
        (IdentifierKind::Mark, &payload.marks),
    ] {
        classify_entries(&mut classification, kind, entries, season);
    }

    tracing::debug!(
        complete_tags = classification.complete.tags.len(),
        complete_marks = classification.complete.marks.len(),
        partial_tags = classification.partial.tags.len(),
        partial_marks = classification.partial.marks.len(),
        unusable = classification.unusable,
        "classified identifiers"
    );
    classification
}

fn classify_entries(
    out: &mut Classification,
    kind: IdentifierKind,
    entries: &[IdentifierEntry],
    season: Season,
) {
    for (index, entry) in entries.iter().enumerate() {
        let classified = Classified {
            index,
            identifier: Identifier::of_kind(kind, entry.number.trim(), season),
            is_new: entry.is_new,
        };
        match Legibility::of(&entry.number) {
            Legibility::Complete => out.complete.push(kind, classified),
            Legibility::Partial => out.partial.push(kind, classified),
            Legibility::Unusable => out.unusable += 1,
        }
    }
}
