#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Restaurant inspection row and entity types.
//!
//! The upstream DOHMH dataset delivers one denormalized row per
//! (restaurant, inspection, violation) combination. [`RawInspectionRow`] is
//! that wire shape; [`Restaurant`], [`Inspection`] and [`Violation`] are the
//! nested entities the grouping engine folds rows into.

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use strum_macros::{AsRefStr, Display, EnumString};

/// Date prefix the upstream dataset uses for restaurants that have not been
/// inspected yet.
pub const SENTINEL_DATE_PREFIX: &str = "1900-01-01";

/// Full sentinel timestamp as it appears in SoQL predicates.
pub const SENTINEL_DATE: &str = "1900-01-01T00:00:00.000";

/// Returns `true` if `date` is the upstream "not yet inspected" marker.
#[must_use]
pub fn is_sentinel_date(date: &str) -> bool {
    date.trim().starts_with(SENTINEL_DATE_PREFIX)
}

/// The five NYC boroughs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Borough {
    /// New York County
    Manhattan,
    /// Bronx County
    Bronx,
    /// Kings County
    Brooklyn,
    /// Queens County
    Queens,
    /// Richmond County
    #[serde(rename = "Staten Island")]
    #[strum(serialize = "Staten Island")]
    StatenIsland,
}

impl Borough {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Manhattan,
            Self::Bronx,
            Self::Brooklyn,
            Self::Queens,
            Self::StatenIsland,
        ]
    }

    /// Parses an upstream `boro` value. The dataset uses `"0"` (and the
    /// occasional blank) for restaurants with no borough on file.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }
}

/// Deserializes a scalar JSON value into an optional string.
///
/// Socrata delivers nearly everything as strings, but hand-built fixtures and
/// some aggregate endpoints use bare numbers and booleans. Blank strings are
/// treated the same as a missing field. Arrays and objects are rejected so the
/// whole row fails validation.
///
/// # Errors
///
/// Returns an error if the value is an array or an object.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar value, found {other}"
        ))),
    }
}

/// One row of the upstream inspection dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInspectionRow {
    /// Unique restaurant identifier.
    #[serde(deserialize_with = "lenient_string")]
    pub camis: Option<String>,
    /// "Doing business as" name.
    #[serde(deserialize_with = "lenient_string")]
    pub dba: Option<String>,
    /// Borough name.
    #[serde(deserialize_with = "lenient_string")]
    pub boro: Option<String>,
    /// Building number.
    #[serde(deserialize_with = "lenient_string")]
    pub building: Option<String>,
    /// Street name.
    #[serde(deserialize_with = "lenient_string")]
    pub street: Option<String>,
    /// ZIP code.
    #[serde(deserialize_with = "lenient_string")]
    pub zipcode: Option<String>,
    /// Phone number.
    #[serde(deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    /// Cuisine description (e.g. `"Pizza"`).
    #[serde(deserialize_with = "lenient_string")]
    pub cuisine_description: Option<String>,
    /// Latitude (WGS84).
    #[serde(deserialize_with = "lenient_string")]
    pub latitude: Option<String>,
    /// Longitude (WGS84).
    #[serde(deserialize_with = "lenient_string")]
    pub longitude: Option<String>,
    /// Inspection date (`YYYY-MM-DDTHH:MM:SS.mmm`).
    #[serde(deserialize_with = "lenient_string")]
    pub inspection_date: Option<String>,
    /// Action taken by the inspector.
    #[serde(deserialize_with = "lenient_string")]
    pub action: Option<String>,
    /// `"Critical"`, `"Not Critical"` or `"Not Applicable"`.
    #[serde(deserialize_with = "lenient_string")]
    pub critical_flag: Option<String>,
    /// Inspection score (lower is better).
    #[serde(deserialize_with = "lenient_string")]
    pub score: Option<String>,
    /// Letter grade.
    #[serde(deserialize_with = "lenient_string")]
    pub grade: Option<String>,
    /// Date the grade was issued.
    #[serde(deserialize_with = "lenient_string")]
    pub grade_date: Option<String>,
    /// Inspection program and type.
    #[serde(deserialize_with = "lenient_string")]
    pub inspection_type: Option<String>,
    /// Violation code.
    #[serde(deserialize_with = "lenient_string")]
    pub violation_code: Option<String>,
    /// Violation description.
    #[serde(deserialize_with = "lenient_string")]
    pub violation_description: Option<String>,
}

/// One row of the upstream year/cuisine aggregate query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuisineYearCount {
    /// Year extracted from the inspection date.
    #[serde(deserialize_with = "lenient_string")]
    pub year: Option<String>,
    /// Cuisine description.
    #[serde(deserialize_with = "lenient_string")]
    pub cuisine_description: Option<String>,
    /// Number of rows in the group, usually delivered as a string.
    #[serde(deserialize_with = "lenient_string")]
    pub count: Option<String>,
}

/// A single cited violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Violation code (e.g. `"04L"`).
    pub code: String,
    /// Violation description.
    pub description: String,
    /// Critical flag copied from the row.
    pub critical_flag: String,
}

impl Violation {
    /// Builds a violation from a row, if it carries the full
    /// code/description/critical-flag triple.
    #[must_use]
    pub fn from_row(row: &RawInspectionRow) -> Option<Self> {
        Some(Self {
            code: row.violation_code.clone()?,
            description: row.violation_description.clone()?,
            critical_flag: row.critical_flag.clone()?,
        })
    }
}

/// One inspection event, possibly assembled from several rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    /// Inspection date, `None` when the row had none (or the sentinel).
    pub inspection_date: Option<String>,
    /// Action taken.
    pub action: Option<String>,
    /// Critical flag.
    pub critical_flag: Option<String>,
    /// Numeric score.
    pub score: Option<i32>,
    /// Letter grade.
    pub grade: Option<String>,
    /// Grade date.
    pub grade_date: Option<String>,
    /// Inspection type.
    pub inspection_type: Option<String>,
    /// Violations in row order.
    pub violations: Vec<Violation>,
}

impl Inspection {
    /// Builds an inspection from the inspection-level fields of a row.
    ///
    /// The violation (if any) is not included; the grouping engine appends
    /// it separately so every row contributes the same way.
    #[must_use]
    pub fn from_row(row: &RawInspectionRow) -> Self {
        Self {
            inspection_date: row.inspection_date.clone(),
            action: row.action.clone(),
            critical_flag: row.critical_flag.clone(),
            score: row.score.as_deref().and_then(parse_score),
            grade: row.grade.clone(),
            grade_date: row.grade_date.clone(),
            inspection_type: row.inspection_type.clone(),
            violations: Vec::new(),
        }
    }

    /// Returns the inspection year if the date starts with four digits.
    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.inspection_date.as_deref().and_then(leading_year)
    }
}

/// A restaurant and its inspection history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    /// Unique identifier.
    pub camis: String,
    /// Business name.
    pub name: Option<String>,
    /// Building number.
    pub building: Option<String>,
    /// Street name.
    pub street: Option<String>,
    /// ZIP code.
    pub zipcode: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Borough, `None` when the dataset has none on file.
    pub boro: Option<Borough>,
    /// Cuisine description.
    pub cuisine: Option<String>,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Inspections, newest first.
    pub inspections: Vec<Inspection>,
}

impl Restaurant {
    /// Creates a restaurant from the identity fields of its first row.
    ///
    /// Returns `None` if the row has no `camis`.
    #[must_use]
    pub fn from_row(row: &RawInspectionRow) -> Option<Self> {
        let camis = row.camis.as_deref()?.trim();
        if camis.is_empty() {
            return None;
        }
        let coordinates = parse_coordinates(row.latitude.as_deref(), row.longitude.as_deref());

        Some(Self {
            camis: camis.to_string(),
            name: row.dba.clone(),
            building: row.building.clone(),
            street: row.street.clone(),
            zipcode: row.zipcode.clone(),
            phone: row.phone.clone(),
            boro: row.boro.as_deref().and_then(Borough::parse_lenient),
            cuisine: row.cuisine_description.clone(),
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lng)| lng),
            inspections: Vec::new(),
        })
    }

    /// Most recent inspection (inspections are kept newest-first).
    #[must_use]
    pub fn latest_inspection(&self) -> Option<&Inspection> {
        self.inspections.first()
    }

    /// Grade from the most recent inspection that issued one.
    #[must_use]
    pub fn current_grade(&self) -> Option<&str> {
        self.inspections.iter().find_map(|i| i.grade.as_deref())
    }

    /// Score from the most recent scored inspection.
    #[must_use]
    pub fn latest_score(&self) -> Option<i32> {
        self.inspections.iter().find_map(|i| i.score)
    }

    /// Whether the restaurant has at least one dated inspection.
    #[must_use]
    pub fn is_inspected(&self) -> bool {
        self.inspections.iter().any(|i| i.inspection_date.is_some())
    }

    /// Single-line street address.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        let parts: Vec<&str> = [self.building.as_deref(), self.street.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Compact projection of a restaurant used for map markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantMarker {
    /// Unique identifier.
    pub camis: String,
    /// Business name.
    pub name: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Current grade.
    pub grade: Option<String>,
    /// Whether the latest inspection was flagged critical.
    pub critical: bool,
    /// Borough.
    pub boro: Option<Borough>,
    /// Cuisine description.
    pub cuisine: Option<String>,
}

impl RestaurantMarker {
    /// Builds a marker, or `None` if the restaurant has no coordinates.
    #[must_use]
    pub fn from_restaurant(restaurant: &Restaurant) -> Option<Self> {
        Some(Self {
            camis: restaurant.camis.clone(),
            name: restaurant.name.clone(),
            latitude: restaurant.latitude?,
            longitude: restaurant.longitude?,
            grade: restaurant.current_grade().map(str::to_string),
            critical: restaurant
                .latest_inspection()
                .and_then(|i| i.critical_flag.as_deref())
                .is_some_and(|flag| flag.eq_ignore_ascii_case("Critical")),
            boro: restaurant.boro,
            cuisine: restaurant.cuisine.clone(),
        })
    }
}

/// Returns the leading four characters of `date` if they are all ASCII
/// digits.
#[must_use]
pub fn leading_year(date: &str) -> Option<&str> {
    let year = date.get(..4)?;
    year.bytes().all(|b| b.is_ascii_digit()).then_some(year)
}

/// Parses an inspection score. Whole numbers delivered as `"12.0"` are
/// accepted.
#[must_use]
pub fn parse_score(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(score) = s.parse::<i32>() {
        return Some(score);
    }
    let value = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
    #[allow(clippy::cast_possible_truncation)]
    let rounded = value.round() as i32;
    Some(rounded)
}

/// Parses lat/lng strings. Returns `None` if either is missing, unparseable,
/// or zero (the dataset uses `0` for ungeocoded restaurants).
#[must_use]
pub fn parse_coordinates(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() || latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}
