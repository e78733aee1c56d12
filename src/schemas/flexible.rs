use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

pub(crate) fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(value)) => Ok(Some(value.to_string())),
        Some(Scalar::Text(value)) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
        Some(Scalar::Float(value)) if value.fract() == 0.0 => Ok(Some((value as i64).to_string())),
        Some(Scalar::Float(value)) => Err(D::Error::custom(format!("invalid id: {value}"))),
        Some(Scalar::Bool(flag)) => Err(D::Error::custom(format!("invalid id: {flag}"))),
        Some(Scalar::Text(_)) | None => Ok(None),
    }
}

pub(crate) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(value)) => Ok(Some(value as f64)),
        Some(Scalar::Float(value)) => Ok(Some(value)),
        Some(Scalar::Text(value)) if value.trim().is_empty() => Ok(None),
        Some(Scalar::Text(value)) => value
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number: {value}"))),
        Some(Scalar::Bool(flag)) => Err(D::Error::custom(format!("invalid number: {flag}"))),
        None => Ok(None),
    }
}

pub(crate) fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match opt_f64(deserializer)? {
        Some(value) if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) => {
            Ok(Some(value as u32))
        }
        Some(value) => Err(D::Error::custom(format!("invalid unsigned integer: {value}"))),
        None => Ok(None),
    }
}

pub(crate) fn opt_datetime<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_datetime_flexible(value.trim())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}"))),
        None => Ok(None),
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DD[T ]HH:MM[:SS]` (taken as UTC) and bare
/// dates, which resolve to the end of that day.
pub(crate) fn parse_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(value) = PrimitiveDateTime::parse(
        &normalized,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        &normalized,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ) {
        return Some(value.assume_utc());
    }

    Date::parse(raw, &format_description!("[year]-[month]-[day]"))
        .ok()
        .and_then(|date| date.with_hms(23, 59, 59).ok())
        .map(PrimitiveDateTime::assume_utc)
}
