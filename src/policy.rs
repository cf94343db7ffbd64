//! Identifier selection policies.
//!
//! A policy decides which single identifier of an observation the resolver
//! probes the registry with. Policies are pure (no I/O) so the same
//! observation always resolves the same way against the same registry.

use std::fmt::Debug;

use crate::classify::{classify, IdentifierSet};
use crate::identifier::Identifier;
use crate::observation::ObservationPayload;

/// Chooses the identifier used to find a seal.
pub trait MatchPolicy: Debug + Send + Sync {
    /// Short stable identifier suitable for logging.
    fn name(&self) -> &'static str;

    /// Identifier to probe from a classified set (complete or partial).
    fn probe(&self, set: &IdentifierSet) -> Option<Identifier>;

    /// Identifier that decides which seal a committed observation joins.
    ///
    /// Must agree with [`probe`](Self::probe) on the complete identifiers so
    /// that a commit joins the seal a dry-run reported.
    fn linkage_probe(&self, payload: &ObservationPayload) -> Option<Identifier>;
}

/// Probe with the first tag if there is one, otherwise the first mark.
///
/// Any further identifiers on the observation are ignored. Tags win over
/// marks because tags are permanent and globally unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstTagThenMark;

impl MatchPolicy for FirstTagThenMark {
    fn name(&self) -> &'static str {
        "first_tag_then_mark"
    }

    fn probe(&self, set: &IdentifierSet) -> Option<Identifier> {
        set.tags
            .first()
            .or_else(|| set.marks.first())
            .map(|c| c.identifier.clone())
    }

    fn linkage_probe(&self, payload: &ObservationPayload) -> Option<Identifier> {
        if let Some(identifier) = self.probe(&classify(payload).complete) {
            return Some(identifier);
        }

        // Nothing complete: the first raw entry never matches exactly, so the
        // commit founds a new seal.
        let raw = payload
            .tags
            .first()
            .map(|tag| Identifier::tag(tag.number.trim()))
            .or_else(|| {
                payload
                    .marks
                    .first()
                    .map(|mark| Identifier::mark(mark.number.trim(), payload.season()))
            });
        if let Some(identifier) = &raw {
            tracing::warn!(%identifier, "no complete identifier; linking by fragment");
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::observation::{IdentifierEntry, Season};

    fn payload() -> ObservationPayload {
        ObservationPayload::on(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap())
    }

    #[test]
    fn test_tags_win_over_marks() {
        let p = payload()
            .with_mark(IdentifierEntry::existing("M1"))
            .with_tag(IdentifierEntry::existing("T1"))
            .with_tag(IdentifierEntry::existing("T2"));
        let c = classify(&p);
        assert_eq!(FirstTagThenMark.probe(&c.complete), Some(Identifier::tag("T1")));
        assert_eq!(FirstTagThenMark.linkage_probe(&p), Some(Identifier::tag("T1")));
    }

    #[test]
    fn test_falls_back_to_first_mark() {
        let p = payload()
            .with_mark(IdentifierEntry::existing(" M1 "))
            .with_mark(IdentifierEntry::existing("M2"));
        let c = classify(&p);
        let expected = Identifier::mark("M1", Season::new(2020));
        assert_eq!(FirstTagThenMark.probe(&c.complete), Some(expected.clone()));
        assert_eq!(FirstTagThenMark.linkage_probe(&p), Some(expected));
    }

    #[test]
    fn test_linkage_skips_leading_fragment() {
        let p = payload()
            .with_tag(IdentifierEntry::existing("T1*"))
            .with_tag(IdentifierEntry::existing("T100"));
        assert_eq!(FirstTagThenMark.linkage_probe(&p), Some(Identifier::tag("T100")));
        assert_eq!(
            FirstTagThenMark.probe(&classify(&p).complete),
            FirstTagThenMark.linkage_probe(&p)
        );
    }

    #[test]
    fn test_linkage_prefers_complete_mark_over_fragmentary_tag() {
        let p = payload()
            .with_tag(IdentifierEntry::existing("T1*"))
            .with_mark(IdentifierEntry::existing("M4"));
        assert_eq!(
            FirstTagThenMark.linkage_probe(&p),
            Some(Identifier::mark("M4", Season::new(2020)))
        );
    }

    #[test]
    fn test_linkage_falls_back_to_raw_fragment() {
        let p = payload()
            .with_mark(IdentifierEntry::existing("M?"))
            .with_tag(IdentifierEntry::existing(" T1* "));
        assert_eq!(FirstTagThenMark.linkage_probe(&p), Some(Identifier::tag("T1*")));
    }

    #[test]
    fn test_nothing_to_match() {
        let p = payload();
        assert_eq!(FirstTagThenMark.probe(&classify(&p).complete), None);
        assert_eq!(FirstTagThenMark.linkage_probe(&p), None);
        assert_eq!(FirstTagThenMark.name(), "first_tag_then_mark");
    }
}
