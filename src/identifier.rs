//! Mark and tag identifiers.
//!
//! Marks and tags share one shape: a number that can be looked up exactly or
//! by fragment. They differ only in scope. Marks are unique within a season,
//! tags are unique globally.
//!
//! Numbers read in the field are often partly illegible. Observers write
//! `*` for an unreadable run of characters and `?` or `_` for a single
//! unreadable character.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::observation::Season;

/// Stands for any run of illegible characters.
pub const MULTI_WILDCARD: char = '*';

/// Each stands for exactly one illegible character.
pub const SINGLE_WILDCARDS: [char; 2] = ['?', '_'];

/// Returns true if `c` is one of the wildcard characters.
#[must_use]
pub fn is_wildcard(c: char) -> bool {
    c == MULTI_WILDCARD || SINGLE_WILDCARDS.contains(&c)
}

fn is_legible(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Canonical comparison key for identifier numbers.
#[must_use]
pub fn normalize_number(number: &str) -> String {
    number.trim().to_ascii_lowercase()
}

/// Kind of identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Season-scoped bleach or paint mark.
    Mark,
    /// Permanent flipper tag.
    Tag,
}

impl IdentifierKind {
    /// Returns true if numbers of this kind are only unique within a season.
    #[must_use]
    pub const fn is_season_scoped(&self) -> bool {
        matches!(self, Self::Mark)
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark => write!(f, "mark"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// A mark or tag number together with its lookup scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Identifier {
    /// Globally unique tag.
    Tag {
        /// Tag number.
        number: String,
    },
    /// Mark, unique within `season`.
    Mark {
        /// Mark number.
        number: String,
        /// Season the mark belongs to.
        season: Season,
    },
}

impl Identifier {
    /// Creates a tag identifier.
    #[must_use]
    pub fn tag(number: impl Into<String>) -> Self {
        Self::Tag {
            number: number.into(),
        }
    }

    /// Creates a mark identifier scoped to `season`.
    #[must_use]
    pub fn mark(number: impl Into<String>, season: Season) -> Self {
        Self::Mark {
            number: number.into(),
            season,
        }
    }

    /// Creates an identifier of `kind`; `season` is dropped for tags.
    #[must_use]
    pub fn of_kind(kind: IdentifierKind, number: impl Into<String>, season: Season) -> Self {
        match kind {
            IdentifierKind::Tag => Self::tag(number),
            IdentifierKind::Mark => Self::mark(number, season),
        }
    }

    /// The kind of identifier.
    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        match self {
            Self::Tag { .. } => IdentifierKind::Tag,
            Self::Mark { .. } => IdentifierKind::Mark,
        }
    }

    /// The number as submitted.
    #[must_use]
    pub fn number(&self) -> &str {
        match self {
            Self::Tag { number } | Self::Mark { number, .. } => number,
        }
    }

    /// Lookup scope; `None` for tags.
    #[must_use]
    pub const fn season(&self) -> Option<Season> {
        match self {
            Self::Tag { .. } => None,
            Self::Mark { season, .. } => Some(*season),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag { number } => write!(f, "tag {number}"),
            Self::Mark { number, season } => write!(f, "mark {number} ({season})"),
        }
    }
}

/// How much of a number could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Legibility {
    /// Fully legible; can be looked up exactly.
    Complete,
    /// Legible in part; needs a fragment lookup.
    Partial,
    /// Nothing usable.
    Unusable,
}

impl Legibility {
    /// Classifies a number as written in the field.
    ///
    /// # Examples
    ///
    /// ```
    /// use seal_registry::identifier::Legibility;
    ///
    /// assert_eq!(Legibility::of("T100"), Legibility::Complete);
    /// assert_eq!(Legibility::of("T2*"), Legibility::Partial);
    /// assert_eq!(Legibility::of("**"), Legibility::Unusable);
    /// ```
    #[must_use]
    pub fn of(number: &str) -> Self {
        let number = number.trim();
        let mut legible = 0usize;
        let mut wildcards = 0usize;
        for c in number.chars() {
            if is_wildcard(c) {
                wildcards += 1;
            } else if is_legible(c) {
                legible += 1;
            } else {
                return Self::Unusable;
            }
        }

        match (legible, wildcards) {
            (0, _) => Self::Unusable,
            (_, 0) => Self::Complete,
            _ => Self::Partial,
        }
    }
}

/// Compiled matcher for a partly legible number.
///
/// Wildcards expand as documented at module level. A fragment without any
/// wildcard matches as a prefix.
#[derive(Debug, Clone)]
pub struct FragmentPattern {
    regex: Regex,
}

impl FragmentPattern {
    /// Compiles `fragment`. Returns `Ok(None)` when nothing legible remains.
    ///
    /// # Errors
    /// - `regex::Error`: if the expanded pattern exceeds the regex size limit
    pub fn compile(fragment: &str) -> Result<Option<Self>, regex::Error> {
        let fragment = normalize_number(fragment);
        if !fragment.chars().any(|c| !is_wildcard(c)) {
            return Ok(None);
        }

        let mut pattern = String::with_capacity(fragment.len() * 2 + 4);
        pattern.push('^');
        let mut literal = String::new();
        for c in fragment.chars() {
            if is_wildcard(c) {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                pattern.push_str(if c == MULTI_WILDCARD { ".*" } else { "." });
            } else {
                literal.push(c);
            }
        }
        pattern.push_str(&regex::escape(&literal));
        if !fragment.chars().any(is_wildcard) {
            pattern.push_str(".*");
        }
        pattern.push('$');

        Ok(Some(Self {
            regex: Regex::new(&pattern)?,
        }))
    }

    /// Returns true if the stored number is consistent with the fragment.
    #[must_use]
    pub fn matches(&self, number: &str) -> bool {
        self.regex.is_match(&normalize_number(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legibility() {
        assert_eq!(Legibility::of("T100"), Legibility::Complete);
        assert_eq!(Legibility::of("  m-9 "), Legibility::Complete);
        assert_eq!(Legibility::of("T2*"), Legibility::Partial);
        assert_eq!(Legibility::of("?5"), Legibility::Partial);
        assert_eq!(Legibility::of("A_3"), Legibility::Partial);
        assert_eq!(Legibility::of(""), Legibility::Unusable);
        assert_eq!(Legibility::of("   "), Legibility::Unusable);
        assert_eq!(Legibility::of("*?"), Legibility::Unusable);
        assert_eq!(Legibility::of("T 100"), Legibility::Unusable);
        assert_eq!(Legibility::of("T1#0"), Legibility::Unusable);
    }

    #[test]
    fn test_identifier_scope() {
        let tag = Identifier::tag("T100");
        assert_eq!(tag.kind(), IdentifierKind::Tag);
        assert_eq!(tag.season(), None);
        assert_eq!(tag.number(), "T100");

        let mark = Identifier::of_kind(IdentifierKind::Mark, "M9", Season::new(2021));
        assert_eq!(mark.season(), Some(Season::new(2021)));
        assert!(mark.kind().is_season_scoped());
        assert!(!IdentifierKind::Tag.is_season_scoped());
        assert_eq!(mark.to_string(), "mark M9 (2021)");
    }

    #[test]
    fn test_fragment_multi_wildcard() {
        let p = FragmentPattern::compile("T2*").unwrap().unwrap();
        assert!(p.matches("T2"));
        assert!(p.matches("T200"));
        assert!(p.matches("t2a"));
        assert!(!p.matches("T100"));
        assert!(!p.matches("XT2"));
    }

    #[test]
    fn test_fragment_single_wildcard() {
        let p = FragmentPattern::compile("M?5").unwrap().unwrap();
        assert!(p.matches("M15"));
        assert!(p.matches("MA5"));
        assert!(!p.matches("M5"));
        assert!(!p.matches("M105"));

        let p = FragmentPattern::compile("_1_").unwrap().unwrap();
        assert!(p.matches("A1B"));
        assert!(!p.matches("A1"));
    }

    #[test]
    fn test_fragment_without_wildcard_is_prefix() {
        let p = FragmentPattern::compile("T1").unwrap().unwrap();
        assert!(p.matches("T1"));
        assert!(p.matches("T100"));
        assert!(!p.matches("AT1"));
    }

    #[test]
    fn test_fragment_escapes_literals() {
        let p = FragmentPattern::compile("A-1*").unwrap().unwrap();
        assert!(p.matches("A-12"));
        assert!(!p.matches("AX12"));
    }

    #[test]
    fn test_degenerate_fragment_compiles_to_none() {
        assert!(FragmentPattern::compile("").unwrap().is_none());
        assert!(FragmentPattern::compile("**").unwrap().is_none());
        assert!(FragmentPattern::compile("  ").unwrap().is_none());
    }
}
