//! Admission checks for new entries. Anything that passes here can be
//! turned into a due instant and a weather request without error.

use crate::runtime::due::{parse_date, parse_local, parse_time, parse_timezone};

use super::model::{Coordinate, NewEntry, ValidatedEntry};

/// A required field is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, "is required")),
    }
}

/// Loose address check: one `@`, non-empty local part, dotted-or-not
/// non-empty domain, no whitespace.
pub fn validate_recipient(recipient: &str) -> Result<(), String> {
    if recipient.chars().any(char::is_whitespace) {
        return Err(format!("'{}' must not contain whitespace", recipient));
    }
    match recipient.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(format!("'{}' is not an email address", recipient)),
    }
}

/// Validate an IANA timezone string.
pub fn validate_timezone(tz: &str) -> Result<(), String> {
    if parse_timezone(tz).is_none() {
        Err(format!(
            "invalid timezone: '{}'; use IANA names like 'America/New_York' or 'UTC'",
            tz
        ))
    } else {
        Ok(())
    }
}

fn coordinate(
    field: &'static str,
    value: &Option<Coordinate>,
    limit: f64,
) -> Result<f64, ValidationError> {
    let raw = match value {
        Some(Coordinate::Number(n)) => *n,
        Some(Coordinate::Text(s)) if !s.trim().is_empty() => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::new(field, format!("'{}' is not a number", s)))?,
        _ => return Err(ValidationError::new(field, "is required")),
    };
    if !raw.is_finite() || raw.abs() > limit {
        return Err(ValidationError::new(
            field,
            format!("{} out of range -{}..={}", raw, limit, limit),
        ));
    }
    Ok(raw)
}

/// Validate every field of `input`, trimming surrounding whitespace.
/// The first failing field is reported.
pub fn validate(input: &NewEntry) -> Result<ValidatedEntry, ValidationError> {
    let recipient = required("recipient", &input.recipient)?;
    validate_recipient(recipient).map_err(|m| ValidationError::new("recipient", m))?;

    let fire_date = required("fire_date", &input.fire_date)?;
    if parse_date(fire_date).is_none() {
        return Err(ValidationError::new(
            "fire_date",
            format!("'{}' is not a YYYY-MM-DD date", fire_date),
        ));
    }

    let fire_time = required("fire_time", &input.fire_time)?;
    if parse_time(fire_time).is_none() {
        return Err(ValidationError::new(
            "fire_time",
            format!("'{}' is not an HH:MM or HH:MM:SS time", fire_time),
        ));
    }
    // Same path the due calculator takes.
    parse_local(fire_date, fire_time).map_err(|e| ValidationError::new("fire_time", e.to_string()))?;

    let fire_timezone = required("fire_timezone", &input.fire_timezone)?;
    validate_timezone(fire_timezone).map_err(|m| ValidationError::new("fire_timezone", m))?;

    let latitude = coordinate("latitude", &input.latitude, 90.0)?;
    let longitude = coordinate("longitude", &input.longitude, 180.0)?;

    Ok(ValidatedEntry {
        recipient: recipient.to_string(),
        fire_date: fire_date.to_string(),
        fire_time: fire_time.to_string(),
        fire_timezone: fire_timezone.to_string(),
        latitude,
        longitude,
    })
}
