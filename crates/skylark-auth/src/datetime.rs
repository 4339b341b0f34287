//! Wire datetime format shared by every persisted record.
//!
//! Timestamps are encoded as UTC with millisecond precision and a `Z`
//! suffix, e.g. `2024-01-02T03:04:05.678Z`. The encoding is fixed-width
//! for any given year, so encoded values order the same way as the
//! instants they represent under plain string comparison. The expiry
//! sweep compares encoded values directly and relies on this.
//!
//! Use as a serde `with` module (`#[serde(with = "crate::datetime")]`,
//! or `crate::datetime::option` for optional fields), or call
//! [`format`]/[`parse`] directly when encoding column values.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const WIRE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Encodes a datetime in the wire format, converting to UTC and
/// truncating to millisecond precision.
///
/// # Errors
///
/// Returns an error if the components cannot be formatted, which only
/// happens for years outside the supported range.
pub fn format(datetime: OffsetDateTime) -> Result<String, time::error::Format> {
    datetime.to_offset(UtcOffset::UTC).format(WIRE_FORMAT)
}

/// Decodes a wire-format datetime.
///
/// # Errors
///
/// Returns an error if the input does not match the wire format exactly.
pub fn parse(input: &str) -> Result<OffsetDateTime, time::error::Parse> {
    Ok(PrimitiveDateTime::parse(input, WIRE_FORMAT)?.assume_utc())
}

/// Drops sub-millisecond precision from a datetime.
///
/// Values built from [`OffsetDateTime::now_utc`] carry nanoseconds that
/// the wire format cannot represent; truncating first keeps values
/// round-trippable through encode/decode.
#[must_use]
pub fn truncate_to_millis(datetime: OffsetDateTime) -> OffsetDateTime {
    let millis = u32::from(datetime.millisecond());
    datetime
        .replace_nanosecond(millis * 1_000_000)
        .unwrap_or(datetime)
}

/// The current UTC time, truncated to wire precision.
#[must_use]
pub fn now_millis() -> OffsetDateTime {
    truncate_to_millis(OffsetDateTime::now_utc())
}

pub fn serialize<S: Serializer>(
    datetime: &OffsetDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let encoded = format(*datetime).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&encoded)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    parse(&encoded).map_err(serde::de::Error::custom)
}

/// Serde `with` module for `Option<OffsetDateTime>` fields.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(
        option: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match option {
            Some(datetime) => {
                let encoded = super::format(*datetime).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&encoded)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| super::parse(&encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_known_value() {
        let instant = datetime!(2024-01-02 03:04:05.678 UTC);
        assert_eq!(format(instant).unwrap(), "2024-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_format_pads_subseconds() {
        let instant = datetime!(2024-01-02 03:04:05.007 UTC);
        assert_eq!(format(instant).unwrap(), "2024-01-02T03:04:05.007Z");

        let whole = datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(format(whole).unwrap(), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_format_truncates_below_millis() {
        let instant = datetime!(2024-01-02 03:04:05.678901 UTC);
        assert_eq!(format(instant).unwrap(), "2024-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_format_converts_to_utc() {
        let instant = datetime!(2024-01-02 05:04:05.678 +02:00);
        assert_eq!(format(instant).unwrap(), "2024-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_parse_round_trip() {
        let instant = datetime!(2031-12-31 23:59:59.999 UTC);
        let encoded = format(instant).unwrap();
        assert_eq!(parse(&encoded).unwrap(), instant);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse("2024-01-02T03:04:05Z").is_err());
        assert!(parse("2024-01-02 03:04:05.678").is_err());
        assert!(parse("not a date").is_err());
    }

    #[test]
    fn test_truncate_to_millis() {
        let instant = datetime!(2024-01-02 03:04:05.678901234 UTC);
        let truncated = truncate_to_millis(instant);
        assert_eq!(truncated, datetime!(2024-01-02 03:04:05.678 UTC));

        let encoded = format(truncated).unwrap();
        assert_eq!(parse(&encoded).unwrap(), truncated);
    }

    #[test]
    fn test_encoded_order_matches_instant_order() {
        let earlier = datetime!(2024-01-02 03:04:05.678 UTC);
        let later = datetime!(2024-01-02 03:04:05.679 UTC);
        assert!(format(earlier).unwrap() < format(later).unwrap());

        let next_day = datetime!(2024-01-03 00:00:00.000 UTC);
        assert!(format(later).unwrap() < format(next_day).unwrap());
    }
}
