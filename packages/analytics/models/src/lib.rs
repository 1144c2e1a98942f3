#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation result types for restaurant inspection analytics.
//!
//! These are the shapes chart and table consumers read: a year-ordered
//! cuisine series plus grade, score and borough breakdowns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of cuisines kept in a trend series when the caller does not ask
/// for a specific count.
pub const DEFAULT_TOP_CUISINES: usize = 6;

/// Score histogram bucket width used when the caller does not pick one.
pub const DEFAULT_SCORE_BUCKET_WIDTH: u32 = 10;

/// Label for restaurants with no current grade.
pub const NOT_GRADED: &str = "Not Yet Graded";

/// Label for restaurants or rows with no borough / cuisine on file.
pub const UNKNOWN: &str = "Unknown";

/// Where a cuisine trend series is computed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TrendMode {
    /// Group raw rows locally, then count inspections per year.
    #[default]
    Client,
    /// Ask the upstream API to group by year and cuisine.
    Server,
}

/// One year of a cuisine trend series.
///
/// Serialized flat: `{ "year": "2021", "Pizza": 3, "Chinese": 1 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuisineTrendRow {
    /// Four-digit year.
    pub year: String,
    /// Count per top cuisine (zero when the cuisine had nothing that year).
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl CuisineTrendRow {
    /// Count for `cuisine`, or `None` if it is not one of the top cuisines.
    #[must_use]
    pub fn count(&self, cuisine: &str) -> Option<u64> {
        self.counts.get(cuisine).copied()
    }
}

/// A year-ordered series of per-cuisine inspection counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuisineTrends {
    /// One row per year, ascending.
    pub data: Vec<CuisineTrendRow>,
    /// Cuisines included in every row, by total count descending.
    pub top_cuisines: Vec<String>,
}

/// Number of restaurants holding a grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    /// Grade letter, or [`NOT_GRADED`].
    pub grade: String,
    /// Number of restaurants.
    pub count: u64,
}

/// One bar of a score histogram covering `[min, max)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBucket {
    /// Inclusive lower bound.
    pub min: i32,
    /// Exclusive upper bound.
    pub max: i32,
    /// Number of restaurants whose latest score falls in the bucket.
    pub count: u64,
}

/// Number of restaurants in a borough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoroughCount {
    /// Borough name, or [`UNKNOWN`].
    pub borough: String,
    /// Number of restaurants.
    pub count: u64,
}

/// Summary statistics over a set of restaurants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionStats {
    /// Number of restaurants.
    pub restaurant_count: u64,
    /// Number of inspections across all restaurants.
    pub inspection_count: u64,
    /// Current grade distribution.
    pub grades: Vec<GradeCount>,
    /// Latest-score histogram.
    pub scores: Vec<ScoreBucket>,
    /// Restaurants per borough.
    pub boroughs: Vec<BoroughCount>,
}
