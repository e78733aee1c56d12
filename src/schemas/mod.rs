//! Wire DTOs for the portal backend and their normalization into the
//! canonical types in [`crate::models`]. Field-name fallbacks live here and
//! nowhere else.

use thiserror::Error;

pub mod assessment;
pub mod course;
pub(crate) mod flexible;
pub mod user;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{entity} payload is missing `{field}`")]
    MissingField { entity: &'static str, field: &'static str },
    #[error("{entity} payload has invalid `{field}`: {value}")]
    InvalidField { entity: &'static str, field: &'static str, value: String },
    #[error("unexpected payload shape for {0}")]
    UnexpectedShape(&'static str),
}

/// Lists arrive bare or wrapped (`{"data": [...]}`, `{"assessments": [...]}`).
pub(crate) fn unwrap_list(
    value: serde_json::Value,
    keys: &[&str],
    entity: &'static str,
) -> Result<Vec<serde_json::Value>, SchemaError> {
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut map) => {
            for key in keys.iter().chain(["data", "results", "items"].iter()) {
                if let Some(serde_json::Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            Err(SchemaError::UnexpectedShape(entity))
        }
        serde_json::Value::Null => Ok(Vec::new()),
        _ => Err(SchemaError::UnexpectedShape(entity)),
    }
}

/// Single records arrive bare or wrapped in `data`/`user`/etc.
pub(crate) fn unwrap_object(value: serde_json::Value, keys: &[&str]) -> serde_json::Value {
    if let serde_json::Value::Object(map) = &value {
        for key in keys.iter().chain(["data"].iter()) {
            if let Some(inner @ serde_json::Value::Object(_)) = map.get(*key) {
                return inner.clone();
            }
        }
    }
    value
}

/// Decodes each element, dropping (and logging) the ones that do not normalize.
pub(crate) fn normalize_each<Raw, T>(items: Vec<serde_json::Value>, entity: &'static str) -> Vec<T>
where
    Raw: serde::de::DeserializeOwned,
    T: TryFrom<Raw, Error = SchemaError>,
{
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let raw = match serde_json::from_value::<Raw>(item) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(entity, index, error = %err, "Skipping undecodable record");
                    return None;
                }
            };
            match T::try_from(raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(entity, index, error = %err, "Skipping invalid record");
                    None
                }
            }
        })
        .collect()
}
