//! Entry data model: pending entries, their unvalidated input form, delivery
//! records, quarantine rows and store events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A pending dispatch request. Never mutated once stored; removal is the
/// only transition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: Uuid,
    pub recipient: String,
    /// Local calendar date, `YYYY-MM-DD`.
    pub fire_date: String,
    /// Local time of day, `HH:MM` or `HH:MM:SS`.
    pub fire_time: String,
    /// IANA timezone name the date and time are expressed in.
    pub fire_timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub(crate) fn from_validated(v: ValidatedEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: v.recipient,
            fire_date: v.fire_date,
            fire_time: v.fire_time,
            fire_timezone: v.fire_timezone,
            latitude: v.latitude,
            longitude: v.longitude,
            created_at: Utc::now(),
        }
    }
}

/// Unvalidated entry input, as sent by API clients or produced by the
/// spreadsheet reader. Short header names from spreadsheets (`email`,
/// `date`, `time`, `timezone`) are accepted as aliases.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NewEntry {
    #[serde(default, alias = "email")]
    pub recipient: Option<String>,
    #[serde(default, alias = "date")]
    pub fire_date: Option<String>,
    #[serde(default, alias = "time")]
    pub fire_time: Option<String>,
    #[serde(default, alias = "timezone", alias = "tz")]
    pub fire_timezone: Option<String>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<Coordinate>,
    #[serde(default, alias = "lon", alias = "lng")]
    pub longitude: Option<Coordinate>,
}

/// A coordinate that may arrive as a JSON number or as numeric text.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

impl From<f64> for Coordinate {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// An entry whose every field has passed validation. Only
/// [`super::validation::validate`] constructs it, so holding one proves the
/// entry is admissible to the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidatedEntry {
    pub(crate) recipient: String,
    pub(crate) fire_date: String,
    pub(crate) fire_time: String,
    pub(crate) fire_timezone: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
}

impl ValidatedEntry {
    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Evidence that one dispatch succeeded. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRecord {
    pub id: Uuid,
    /// Back-reference for lookup only; the entry is gone once this exists.
    pub entry_id: Uuid,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
    pub subject: String,
    /// Payload returned by the weather lookup, verbatim.
    pub external_snapshot: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Quarantine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tracks consecutive due-check data errors for one stored entry.
#[derive(Clone, Debug, Serialize)]
pub struct QuarantineInfo {
    pub entry_id: Uuid,
    pub attempts: u32,
    pub last_error: String,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry events (for SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryEvent {
    EntryCreated { entry: Entry },
    EntryDeleted { entry_id: Uuid },
    EntryDispatched { record: DeliveryRecord },
}
