//! SoQL query parameter builder.
//!
//! [`build_socrata_params`] turns a loosely-typed bag of filter values into
//! the parameter set the Socrata API accepts. The transformations run in a
//! fixed order:
//!
//! 1. string values are unquoted and trimmed, null values dropped;
//! 2. `markerOnly` narrows `$select` to the map-marker columns and defaults
//!    `$limit`;
//! 3. a complete `minLat`/`maxLat`/`minLng`/`maxLng` box becomes a `$where`
//!    predicate;
//! 4. ascending `inspection_date` order excludes the `1900-01-01` sentinel;
//! 5. client-only keys are stripped.
//!
//! Unknown keys pass through untouched, so plain column filters such as
//! `boro=Queens` reach the API as SODA simple filters.

use std::collections::BTreeMap;
use std::fmt;

use inspection_map_inspection_models::SENTINEL_DATE;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::SourceError;

/// Column projection parameter.
pub const SELECT: &str = "$select";
/// Filter predicate parameter.
pub const WHERE: &str = "$where";
/// Sort order parameter.
pub const ORDER: &str = "$order";
/// Page size parameter.
pub const LIMIT: &str = "$limit";
/// Page offset parameter.
pub const OFFSET: &str = "$offset";
/// Full-text search parameter.
pub const SEARCH: &str = "$q";
/// Group-by parameter.
pub const GROUP: &str = "$group";

/// Bounding-box keys (client bookkeeping only).
pub const MIN_LAT: &str = "minLat";
/// See [`MIN_LAT`].
pub const MAX_LAT: &str = "maxLat";
/// See [`MIN_LAT`].
pub const MIN_LNG: &str = "minLng";
/// See [`MIN_LAT`].
pub const MAX_LNG: &str = "maxLng";
/// Marker-only projection flag.
pub const MARKER_ONLY: &str = "markerOnly";

/// Keys that only exist for client-side state and must never reach the
/// upstream query string.
pub const INTERNAL_KEYS: &[&str] = &[
    MIN_LAT,
    MAX_LAT,
    MIN_LNG,
    MAX_LNG,
    MARKER_ONLY,
    "latitude",
    "longitude",
    "zoom",
];

/// Columns needed to draw a map marker.
pub const MARKER_COLUMNS: &[&str] = &[
    "camis",
    "latitude",
    "longitude",
    "grade",
    "critical_flag",
    "inspection_date",
    "boro",
    "zipcode",
    "cuisine_description",
    "building",
    "street",
];

/// Default `$limit` applied in marker-only mode.
pub const DEFAULT_MARKER_LIMIT: u64 = 300;

/// A single loosely-typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicitly unset. Dropped by the builder and by URL encoding.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl ParamValue {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Interprets the value as a finite number. Text is parsed; anything
    /// unparseable is `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        let value = match self {
            Self::Integer(n) => *n as f64,
            Self::Float(f) => *f,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Null | Self::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Returns the text if this is a [`ParamValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true`, `"1"`, or case-insensitive `"true"`.
    #[must_use]
    pub fn is_truthy_flag(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s == "1" || s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Input parameter bag, as handed over by a UI or URL.
pub type RawParams = BTreeMap<String, ParamValue>;

/// Output of [`build_socrata_params`]: no nulls, no client-only keys.
pub type SocrataParams = BTreeMap<String, ParamValue>;

/// Settings that influence query building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// `$limit` applied in marker-only mode when none was given.
    pub marker_default_limit: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            marker_default_limit: DEFAULT_MARKER_LIMIT,
        }
    }
}

/// Builds Socrata query parameters from a filter bag.
///
/// Pure and deterministic; see the module docs for the transformation
/// order.
#[must_use]
pub fn build_socrata_params(input: &RawParams, config: &QueryConfig) -> SocrataParams {
    let mut params: SocrataParams = input
        .iter()
        .filter_map(|(key, value)| sanitize(value).map(|v| (key.clone(), v)))
        .collect();

    if params.get(MARKER_ONLY).is_some_and(ParamValue::is_truthy_flag) {
        params.insert(SELECT.to_string(), ParamValue::text(MARKER_COLUMNS.join(",")));
        if params.get(LIMIT).is_none_or(ParamValue::is_blank) {
            params.insert(
                LIMIT.to_string(),
                ParamValue::Integer(i64::try_from(config.marker_default_limit).unwrap_or(i64::MAX)),
            );
        }
    }

    if let Some(predicate) = bbox_predicate(&params) {
        conjoin_where(&mut params, &predicate);
    }

    if params
        .get(ORDER)
        .and_then(ParamValue::as_str)
        .is_some_and(orders_inspection_date_ascending)
    {
        conjoin_where(&mut params, &sentinel_exclusion());
    }

    for key in INTERNAL_KEYS {
        params.remove(*key);
    }

    params
}

/// Appends `params` to `base` as a percent-encoded query string. Null values
/// are skipped.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if `base` is not a valid absolute URL.
pub fn build_socrata_url(base: &str, params: &SocrataParams) -> Result<String, SourceError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| SourceError::Config {
        message: format!("Invalid URL {base:?}: {e}"),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_null()) {
            pairs.append_pair(key, &value.to_string());
        }
    }
    let mut url = url.to_string();
    if url.ends_with('?') {
        url.pop();
    }
    Ok(url)
}

/// Derives the upstream year/cuisine aggregate query from already-built
/// filter parameters.
///
/// Row filters (`$where`, `$q`, column filters) are kept; projection,
/// ordering and paging are replaced. The sentinel date is always excluded
/// since it can never land in a yearly bucket.
#[must_use]
pub fn cuisine_trend_params(filters: &SocrataParams, limit: u64) -> SocrataParams {
    let mut params: SocrataParams = filters
        .iter()
        .filter(|(key, _)| ![SELECT, ORDER, LIMIT, OFFSET, GROUP].contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    params.insert(
        SELECT.to_string(),
        ParamValue::text(
            "date_extract_y(inspection_date) AS year, cuisine_description, count(*) AS count",
        ),
    );
    params.insert(GROUP.to_string(), ParamValue::text("year, cuisine_description"));
    params.insert(ORDER.to_string(), ParamValue::text("year"));
    params.insert(
        LIMIT.to_string(),
        ParamValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)),
    );
    conjoin_where(&mut params, &sentinel_exclusion());
    params
}

/// Unquotes and trims text; drops nulls.
fn sanitize(value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Null => None,
        ParamValue::Text(s) => Some(ParamValue::Text(strip_quotes(s).to_string())),
        other => Some(other.clone()),
    }
}

/// Removes one matching pair of wrapping quotes. Quotes inside the value,
/// or unbalanced at either end, are kept.
fn strip_quotes(s: &str) -> &str {
    let trimmed = s.trim();
    ['"', '\'']
        .into_iter()
        .find_map(|quote| trimmed.strip_prefix(quote)?.strip_suffix(quote))
        .map_or(trimmed, str::trim)
}

/// `latitude between .. AND longitude between ..` when all four bounds are
/// present and numeric.
fn bbox_predicate(params: &SocrataParams) -> Option<String> {
    let bound = |key: &str| params.get(key).and_then(ParamValue::as_f64);
    let min_lat = bound(MIN_LAT)?;
    let max_lat = bound(MAX_LAT)?;
    let min_lng = bound(MIN_LNG)?;
    let max_lng = bound(MAX_LNG)?;

    Some(format!(
        "latitude between {min_lat} and {max_lat} AND longitude between {min_lng} and {max_lng}"
    ))
}

fn sentinel_exclusion() -> String {
    format!("inspection_date > '{SENTINEL_DATE}'")
}

/// Adds `predicate` to `$where`, parenthesizing any existing predicate.
fn conjoin_where(params: &mut SocrataParams, predicate: &str) {
    let combined = match params.get(WHERE).map(ToString::to_string) {
        Some(existing) if !existing.trim().is_empty() => format!("({existing}) AND {predicate}"),
        _ => predicate.to_string(),
    };
    params.insert(WHERE.to_string(), ParamValue::Text(combined));
}

/// Whether any clause of a SoQL `$order` sorts `inspection_date` ascending
/// (explicit `ASC` or no direction).
fn orders_inspection_date_ascending(order: &str) -> bool {
    let re = Regex::new(r"(?i)^\s*inspection_date(?:\s+(asc|desc))?\s*$")
        .unwrap_or_else(|_| unreachable!());

    order.split(',').any(|clause| {
        re.captures(clause).is_some_and(|caps| {
            caps.get(1)
                .is_none_or(|dir| dir.as_str().eq_ignore_ascii_case("asc"))
        })
    })
}
