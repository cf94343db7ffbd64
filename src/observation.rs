//! Observation types.
//!
//! An observation is a single sighting of a seal. It arrives as an
//! [`ObservationPayload`] and, once committed, is stored as an
//! [`Observation`] that never changes except for its seal linkage and
//! approval flag.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::seal::SealId;

/// Globally unique, stable observation identifier.
///
/// The first observation of a seal also serves as that seal's identity,
/// see [`SealId`].
///
/// # Examples
///
/// ```
/// use seal_registry::ObservationId;
///
/// let id = ObservationId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationId(Uuid);

impl ObservationId {
    /// Creates a new random observation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an observation ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ObservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ObservationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Field season, the calendar year of an observation.
///
/// Marks are bleached or painted on the pelage and only last one season, so
/// mark numbers are unique per season only. Tags are permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Season(i32);

impl Season {
    /// Creates a season from a calendar year.
    #[must_use]
    pub const fn new(year: i32) -> Self {
        Self(year)
    }

    /// The season a date falls in.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self(date.year())
    }

    /// Returns the calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sex of the observed animal.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[serde(alias = "M")]
    Male,
    #[serde(alias = "F")]
    Female,
    #[serde(alias = "U")]
    Unknown,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Body measurements taken during a procedure.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curvilinear_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axillary_girth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tare: Option<f64>,
}

impl Measurement {
    /// Returns true if no value was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.standard_length.is_none()
            && self.curvilinear_length.is_none()
            && self.axillary_girth.is_none()
            && self.mass.is_none()
            && self.tare.is_none()
    }

    pub(crate) fn values(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("standardLength", self.standard_length),
            ("curvilinearLength", self.curvilinear_length),
            ("axillaryGirth", self.axillary_girth),
            ("mass", self.mass),
            ("tare", self.tare),
        ]
    }
}

/// A mark or tag as written down by the observer.
///
/// `number` may be fragmentary, see [`crate::identifier::Legibility`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierEntry {
    /// The number as read in the field.
    pub number: String,

    /// The observer claims this identifier was applied during this sighting.
    #[serde(default)]
    pub is_new: bool,

    /// Where on the body the identifier sits (e.g. "left rear flipper").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl IdentifierEntry {
    /// An identifier that was already on the animal.
    #[must_use]
    pub fn existing(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            is_new: false,
            position: None,
        }
    }

    /// An identifier applied during this sighting.
    #[must_use]
    pub fn new_identifier(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            is_new: true,
            position: None,
        }
    }
}

/// An incoming observation, already parsed from the request.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPayload {
    /// Day of the sighting; determines the season.
    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,

    /// Handling procedure performed, if any (e.g. "tagging", "weighing").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,

    /// Estimated pup age in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pup_age: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pup_count: Option<u32>,

    #[serde(default)]
    pub marks: Vec<IdentifierEntry>,

    #[serde(default)]
    pub tags: Vec<IdentifierEntry>,
}

impl ObservationPayload {
    /// Creates a payload with only a date set.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            observer: None,
            sex: None,
            procedure: None,
            location: None,
            comments: None,
            measurement: None,
            pup_age: None,
            pup_count: None,
            marks: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Adds a mark entry.
    #[must_use]
    pub fn with_mark(mut self, mark: IdentifierEntry) -> Self {
        self.marks.push(mark);
        self
    }

    /// Adds a tag entry.
    #[must_use]
    pub fn with_tag(mut self, tag: IdentifierEntry) -> Self {
        self.tags.push(tag);
        self
    }

    /// Sets the observer name.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Into<String>) -> Self {
        self.observer = Some(observer.into());
        self
    }

    /// The season this observation belongs to.
    #[must_use]
    pub fn season(&self) -> Season {
        Season::of(self.date)
    }

    /// Returns true if at least one mark or tag was submitted.
    #[must_use]
    pub fn has_identifiers(&self) -> bool {
        !self.marks.is_empty() || !self.tags.is_empty()
    }
}

/// A mark or tag stored against a committed observation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedIdentifier {
    pub number: String,
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Marks carry their season, tags do not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
    pub seal_id: SealId,
}

/// A committed observation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: ObservationId,
    pub date: NaiveDate,
    pub season: Season,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer: Option<String>,
    /// User whose session submitted the observation.
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pup_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pup_count: Option<u32>,
    #[serde(default)]
    pub marks: Vec<RecordedIdentifier>,
    #[serde(default)]
    pub tags: Vec<RecordedIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal_id: Option<SealId>,
    pub approved: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Observation {
    /// Builds the stored row for a payload. Derived facts (measurement, pup
    /// data, marks, tags) and the seal linkage are written separately.
    #[must_use]
    pub fn from_payload(
        id: ObservationId,
        payload: &ObservationPayload,
        submitted_by: &str,
    ) -> Self {
        Self {
            id,
            date: payload.date,
            season: payload.season(),
            observer: payload.observer.clone(),
            submitted_by: submitted_by.to_string(),
            sex: payload.sex,
            procedure: payload.procedure.clone(),
            location: payload.location.clone(),
            comments: payload.comments.clone(),
            measurement: None,
            pup_age: None,
            pup_count: None,
            marks: Vec::new(),
            tags: Vec::new(),
            seal_id: None,
            approved: false,
            recorded_at: Utc::now(),
        }
    }
}

/// A person who records sightings in the field.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observer {
    pub name: String,
    pub registered_at: DateTime<Utc>,
}

impl Observer {
    /// Creates an observer registered now.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registered_at: Utc::now(),
        }
    }
}
