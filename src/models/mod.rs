pub mod auth;
pub mod link;
pub mod meal;
pub mod parent;
pub mod student;
pub mod user;

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Form selects post `""` for "nothing chosen"; treat that (and null) as absent
/// instead of failing the whole body.
pub(crate) fn blank_uuid_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
