use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned identifier for a persisted record.
pub type RecordId = i64;

/// The kind of record a squash or duplicate-matching pass operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Event,
    Venue,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Event => "event",
            RecordKind::Venue => "venue",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical event produced by the feed parser, ready to hand to the
/// persistence collaborator. Invariant: `end_time >= start_time`, equal when
/// the event is instantaneous.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AbstractEvent {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Embedded by value; no identity is shared across events at this layer.
    pub location: Option<AbstractLocation>,
}

/// A canonical venue/location. All fields are optional except that a location
/// used as a bare-title fallback always carries a title.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AbstractLocation {
    pub title: Option<String>,
    pub street_address: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    /// Latitude/longitude are set together or not at all.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AbstractLocation {
    /// A stub location carrying only a display title, used when an embedded
    /// venue record could not be decoded.
    pub fn with_title(title: &str) -> Self {
        AbstractLocation { title: Some(title.to_string()), ..Default::default() }
    }

    /// True when no field at all is populated.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.street_address.is_none()
            && self.locality.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}
