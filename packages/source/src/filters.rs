//! Typed filter surface.
//!
//! [`InspectionFilters`] is what the HTTP API and CLI accept. It is
//! validated once and then lowered into a [`RawParams`] bag, which runs
//! through [`build_socrata_params`] like any other input.

use chrono::{Days, NaiveDate};
use inspection_map_inspection_models::Borough;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::params::{
    self, MARKER_ONLY, MAX_LAT, MAX_LNG, MIN_LAT, MIN_LNG, ParamValue, QueryConfig, RawParams,
    SocrataParams, build_socrata_params,
};

/// How many rows a map view asks for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DensityTier {
    /// 250 rows.
    Low,
    /// 1,000 rows.
    Medium,
    /// 5,000 rows.
    High,
    /// 50,000 rows.
    Max,
}

impl DensityTier {
    /// Row limit for this tier.
    #[must_use]
    pub const fn limit(self) -> u32 {
        match self {
            Self::Low => 250,
            Self::Medium => 1_000,
            Self::High => 5_000,
            Self::Max => 50_000,
        }
    }
}

/// Rejected filter input.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// `from` is after `to`.
    #[error("Date range is inverted: {from} is after {to}")]
    InvertedDateRange {
        /// Range start.
        from: NaiveDate,
        /// Range end.
        to: NaiveDate,
    },

    /// A bounding-box minimum exceeds its maximum.
    #[error("Bounding box is inverted on {axis}")]
    InvertedBounds {
        /// `latitude` or `longitude`.
        axis: &'static str,
    },

    /// `order` is not a list of `<column> [ASC|DESC]` clauses.
    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),
}

/// Filter state for restaurant queries.
///
/// Field names on the wire are the ones the map UI has always used, so a
/// query string can be forwarded unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectionFilters {
    /// Restrict to a single restaurant.
    pub camis: Option<String>,
    /// Borough name.
    pub boro: Option<Borough>,
    /// Letter grade (`A`, `B`, `C`, `Z`, `P`, `N`).
    pub grade: Option<String>,
    /// `Critical`, `Not Critical` or `Not Applicable`.
    #[serde(rename = "critical_flag")]
    pub critical_flag: Option<String>,
    /// Full-text search.
    pub q: Option<String>,
    /// Row-count preset. An explicit `limit` wins.
    pub density: Option<DensityTier>,
    /// Southern edge of the map view. Unparseable values read as absent.
    #[serde(deserialize_with = "lenient_number")]
    pub min_lat: Option<f64>,
    /// Northern edge of the map view.
    #[serde(deserialize_with = "lenient_number")]
    pub max_lat: Option<f64>,
    /// Western edge of the map view.
    #[serde(deserialize_with = "lenient_number")]
    pub min_lng: Option<f64>,
    /// Eastern edge of the map view.
    #[serde(deserialize_with = "lenient_number")]
    pub max_lng: Option<f64>,
    /// SoQL sort, e.g. `inspection_date DESC`.
    pub order: Option<String>,
    /// First inspection date to include.
    pub from: Option<NaiveDate>,
    /// Last inspection date to include.
    pub to: Option<NaiveDate>,
    /// Maximum rows to fetch.
    pub limit: Option<u32>,
    /// Rows to skip, for paging.
    pub offset: Option<u32>,
    /// Only fetch the columns needed for map markers. Accepts `true`, `1`
    /// and any casing of `true`.
    #[serde(deserialize_with = "lenient_flag")]
    pub marker_only: Option<bool>,
    /// Map center latitude; never sent upstream.
    #[serde(deserialize_with = "lenient_number")]
    pub latitude: Option<f64>,
    /// Map center longitude; never sent upstream.
    #[serde(deserialize_with = "lenient_number")]
    pub longitude: Option<f64>,
    /// Map zoom level; never sent upstream.
    #[serde(deserialize_with = "lenient_number")]
    pub zoom: Option<f64>,
}

impl InspectionFilters {
    /// Checks the filters for contradictions and unsafe sort clauses.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(FilterError::InvertedDateRange { from, to });
        }

        if let (Some(min), Some(max)) = (self.min_lat, self.max_lat)
            && min > max
        {
            return Err(FilterError::InvertedBounds { axis: "latitude" });
        }
        if let (Some(min), Some(max)) = (self.min_lng, self.max_lng)
            && min > max
        {
            return Err(FilterError::InvertedBounds { axis: "longitude" });
        }

        if let Some(order) = &self.order
            && !is_valid_order(order)
        {
            return Err(FilterError::InvalidOrder(order.clone()));
        }

        Ok(())
    }

    /// Lowers the filters into the loosely-typed parameter bag.
    #[must_use]
    pub fn to_raw_params(&self) -> RawParams {
        let mut raw = RawParams::new();
        let mut put = |key: &str, value: ParamValue| {
            raw.insert(key.to_string(), value);
        };

        if let Some(camis) = &self.camis {
            put("camis", ParamValue::text(camis));
        }
        if let Some(boro) = self.boro {
            put("boro", ParamValue::text(boro.as_ref()));
        }
        if let Some(grade) = &self.grade {
            put("grade", ParamValue::text(grade.to_uppercase()));
        }
        if let Some(flag) = &self.critical_flag {
            put("critical_flag", ParamValue::text(flag));
        }
        if let Some(q) = &self.q {
            put(params::SEARCH, ParamValue::text(q));
        }

        if let Some(limit) = self.limit.or_else(|| self.density.map(DensityTier::limit)) {
            put(params::LIMIT, ParamValue::Integer(i64::from(limit)));
        }
        if let Some(offset) = self.offset {
            put(params::OFFSET, ParamValue::Integer(i64::from(offset)));
        }
        if let Some(order) = &self.order {
            put(params::ORDER, ParamValue::text(order));
        }
        if let Some(predicate) = self.date_range_predicate() {
            put(params::WHERE, ParamValue::Text(predicate));
        }

        for (key, value) in [
            (MIN_LAT, self.min_lat),
            (MAX_LAT, self.max_lat),
            (MIN_LNG, self.min_lng),
            (MAX_LNG, self.max_lng),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("zoom", self.zoom),
        ] {
            if let Some(value) = value {
                put(key, ParamValue::Float(value));
            }
        }

        if let Some(marker_only) = self.marker_only {
            put(MARKER_ONLY, ParamValue::Bool(marker_only));
        }

        raw
    }

    /// Lowers and builds in one step.
    #[must_use]
    pub fn to_socrata_params(&self, config: &QueryConfig) -> SocrataParams {
        build_socrata_params(&self.to_raw_params(), config)
    }

    /// Whether the caller asked for marker summaries.
    #[must_use]
    pub fn is_marker_only(&self) -> bool {
        self.marker_only.unwrap_or(false)
    }

    /// `to` is inclusive, so the upper bound is the start of the next day.
    fn date_range_predicate(&self) -> Option<String> {
        let lower = self
            .from
            .map(|from| format!("inspection_date >= '{}'", floating_timestamp(from)));
        let upper = self.to.map(|to| {
            to.checked_add_days(Days::new(1)).map_or_else(
                || format!("inspection_date <= '{}'", floating_timestamp(to)),
                |next| format!("inspection_date < '{}'", floating_timestamp(next)),
            )
        });

        match (lower, upper) {
            (Some(lower), Some(upper)) => Some(format!("{lower} AND {upper}")),
            (lower, upper) => lower.or(upper),
        }
    }
}

/// Query strings carry every value as text, so numbers are parsed here and
/// anything that is not a finite number is dropped.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ParamValue>::deserialize(deserializer)?.and_then(|v| v.as_f64()))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ParamValue>::deserialize(deserializer)?.map(|v| v.is_truthy_flag()))
}

fn floating_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.000", date.format("%Y-%m-%d"))
}

fn is_valid_order(order: &str) -> bool {
    let re = Regex::new(r"(?i)^\s*[a-z_][a-z0-9_]*(?:\s+(?:asc|desc))?\s*$")
        .unwrap_or_else(|_| unreachable!());
    order.split(',').all(|clause| re.is_match(clause))
}
