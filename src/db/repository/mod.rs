pub mod consultation;
pub mod medication;
pub mod ticket;

pub use consultation::*;
pub use medication::*;
pub use ticket::*;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::DatabaseError;

/// Serialize a struct for storage in a JSON TEXT column.
pub(crate) fn to_json<T: Serialize>(
    column: &'static str,
    value: &T,
) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::CorruptColumn {
        column,
        reason: e.to_string(),
    })
}

/// Deserialize a JSON TEXT column back into a struct.
pub(crate) fn from_json<T: DeserializeOwned>(
    column: &'static str,
    raw: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptColumn {
        column,
        reason: e.to_string(),
    })
}

pub(crate) fn parse_uuid(column: &'static str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::CorruptColumn {
        column,
        reason: e.to_string(),
    })
}

pub(crate) fn parse_timestamp(
    column: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptColumn {
            column,
            reason: e.to_string(),
        })
}
