use chrono::{DateTime as ChronoDateTime, NaiveDateTime};
use std::fmt;
use thiserror::Error as ThisError;

const TEXT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const RFC3339_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f+00:00";

///
/// DateTime
///
/// Zoneless instant with millisecond resolution. The textual surface is
/// `YYYY-MM-DDTHH:MM:SS.sss` (UTC, no suffix); the JSON surface is
/// RFC 3339 with a mandatory zone and millisecond field, canonically
/// printed as `…+00:00`.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DateTime(i64);

impl DateTime {
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    /// Construct from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Parse the zoneless textual shape, rejecting invalid calendar
    /// instants (for example Feb 30) and missing millisecond fields.
    pub fn parse_text(text: &str) -> Result<Self, DateTimeError> {
        let parsed = NaiveDateTime::parse_from_str(text, TEXT_FORMAT)
            .map_err(|_| DateTimeError::Invalid(text.to_string()))?;
        Ok(Self(parsed.and_utc().timestamp_millis()))
    }

    /// Render the zoneless textual shape.
    pub fn format_text(self) -> Result<String, DateTimeError> {
        let instant =
            ChronoDateTime::from_timestamp_millis(self.0).ok_or(DateTimeError::OutOfRange)?;
        Ok(instant.format(TEXT_FORMAT).to_string())
    }

    /// Parse RFC 3339, requiring an explicit zone and a millisecond
    /// field. `Z` and numeric offsets are both accepted; the instant is
    /// normalized to UTC.
    pub fn parse_rfc3339(text: &str) -> Result<Self, DateTimeError> {
        let parsed = ChronoDateTime::parse_from_rfc3339(text)
            .map_err(|_| DateTimeError::Invalid(text.to_string()))?;
        // RFC 3339 always carries a zone; the fraction is the part the
        // grammar leaves optional, so it is checked separately.
        if !text.contains('.') {
            return Err(DateTimeError::MissingMillis(text.to_string()));
        }
        Ok(Self(parsed.timestamp_millis()))
    }

    /// Render canonical RFC 3339 in UTC (`…+00:00`).
    pub fn format_rfc3339(self) -> Result<String, DateTimeError> {
        let instant =
            ChronoDateTime::from_timestamp_millis(self.0).ok_or(DateTimeError::OutOfRange)?;
        Ok(instant.format(RFC3339_UTC_FORMAT).to_string())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format_text() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<datetime {}ms>", self.0),
        }
    }
}

///
/// DateTimeError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DateTimeError {
    #[error("invalid datetime: {0}")]
    Invalid(String),

    #[error("datetime lacks a millisecond field: {0}")]
    MissingMillis(String),

    #[error("datetime instant out of printable range")]
    OutOfRange,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trip() {
        let instant = DateTime::parse_text("2024-01-02T03:04:05.678").unwrap();
        assert_eq!(instant.format_text().unwrap(), "2024-01-02T03:04:05.678");
    }

    #[test]
    fn text_rejects_missing_millis() {
        assert!(DateTime::parse_text("2024-01-02T03:04:05").is_err());
    }

    #[test]
    fn text_rejects_invalid_calendar_instant() {
        assert!(DateTime::parse_text("2024-02-30T00:00:00.000").is_err());
    }

    #[test]
    fn rfc3339_requires_zone_and_millis() {
        assert!(DateTime::parse_rfc3339("2024-01-02T03:04:05.678").is_err());
        assert!(DateTime::parse_rfc3339("2024-01-02T03:04:05+00:00").is_err());

        let zulu = DateTime::parse_rfc3339("2024-01-02T03:04:05.678Z").unwrap();
        let offset = DateTime::parse_rfc3339("2024-01-02T04:04:05.678+01:00").unwrap();
        assert_eq!(zulu, offset);
    }

    #[test]
    fn rfc3339_canonical_output_is_utc() {
        let instant = DateTime::parse_rfc3339("2024-01-02T04:04:05.678+01:00").unwrap();
        assert_eq!(
            instant.format_rfc3339().unwrap(),
            "2024-01-02T03:04:05.678+00:00"
        );
    }
}
