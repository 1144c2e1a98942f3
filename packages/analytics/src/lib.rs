#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation engine for restaurant inspection data.
//!
//! [`trends`] turns grouped restaurants (or rows the upstream API already
//! grouped by year and cuisine) into a top-N cuisine series. [`stats`]
//! produces grade, score and borough breakdowns. All functions are pure and
//! infallible: malformed dates and counts are skipped or zeroed, never
//! reported.

pub mod stats;
pub mod trends;

pub use stats::{borough_counts, grade_distribution, inspection_stats, score_histogram};
pub use trends::{aggregate_cuisine_trends, aggregate_cuisine_trends_from_rows};
