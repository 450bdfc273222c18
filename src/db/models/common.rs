//! Common types and helpers shared across models.

use serde::{Deserialize, Deserializer, Serialize};

/// Sort direction for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

/// Failure of a filtered list query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidFilter(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Resolve a client-facing sort key to a whitelisted column name.
///
/// `allowed` maps camelCase keys to storage columns. Only columns from this
/// table ever reach the SQL string.
pub fn resolve_sort(
    requested: Option<&str>,
    allowed: &[(&str, &'static str)],
    default: &'static str,
) -> Result<&'static str, QueryError> {
    match requested {
        None => Ok(default),
        Some(key) => allowed
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| {
                let names: Vec<&str> = allowed.iter().map(|(name, _)| *name).collect();
                QueryError::InvalidFilter(format!(
                    "Invalid sort field. Must be one of: {}",
                    names.join(", ")
                ))
            }),
    }
}

/// Treat empty strings from form submissions as absent
pub fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Merge an optional field of a partial update: absent keeps the stored
/// value, an empty string clears it.
pub fn merge_optional(new: &Option<String>, old: &Option<String>) -> Option<String> {
    match new {
        Some(v) => blank_to_none(Some(v.as_str())).map(str::to_string),
        None => old.clone(),
    }
}

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates of nullable references.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Appended after every bound `LIKE` pattern so escaped wildcards match literally
pub const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// Build a `LIKE` pattern for a substring search. `%`, `_` and `\` in the term
/// are escaped; use with [`LIKE_ESCAPE`].
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Current time as an RFC 3339 string, the storage format for all timestamps
pub fn now() -> String {
    format_timestamp(chrono::Utc::now())
}

/// UTC, second precision, `Z` suffix. Keeps stored timestamps comparable as strings.
pub fn format_timestamp(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Normalize a client-supplied timestamp to the storage format
pub fn normalize_timestamp(value: &str) -> Option<String> {
    parse_timestamp(value).map(format_timestamp)
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date
pub fn parse_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
