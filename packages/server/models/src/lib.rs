#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the inspection map server.
//!
//! Filter fields are shared with the CLI through
//! [`inspection_map_source::filters::InspectionFilters`]; the types here only
//! cover what is specific to individual endpoints.

use inspection_map_analytics_models::TrendMode;
use inspection_map_source::dataset::DatasetDefinition;
use serde::{Deserialize, Serialize};

/// Response body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Extra query parameters for the restaurant list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestaurantsQueryParams {
    /// Keep the `1900-01-01` placeholder date on uninspected restaurants.
    pub include_sentinel: bool,
}

/// Extra query parameters for `GET /api/trends`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct TrendsQueryParams {
    /// Number of cuisines to keep.
    pub top: Option<usize>,
    /// Where to aggregate.
    pub mode: TrendMode,
}

/// Extra query parameters for `GET /api/stats`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct StatsQueryParams {
    /// Score histogram bucket width.
    pub bucket: Option<u32>,
}

/// A configured dataset as returned by `GET /api/datasets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDataset {
    /// Dataset identifier.
    pub id: String,
    /// Human-readable title.
    pub name: String,
    /// SODA resource endpoint.
    pub api_url: String,
    /// Human-readable dataset page, if known.
    pub portal_url: Option<String>,
    /// Rows per request when paging.
    pub page_size: u64,
    /// Default number of cuisines in a trend series.
    pub trend_top_n: usize,
}

impl From<&DatasetDefinition> for ApiDataset {
    fn from(dataset: &DatasetDefinition) -> Self {
        Self {
            id: dataset.id.clone(),
            name: dataset.name.clone(),
            api_url: dataset.api_url.clone(),
            portal_url: dataset.portal_url(),
            page_size: dataset.page_size,
            trend_top_n: dataset.trend_top_n,
        }
    }
}
