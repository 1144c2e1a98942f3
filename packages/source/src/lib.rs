#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Upstream data access for the restaurant inspection dataset.
//!
//! Turns UI filter state into Socrata SoQL parameters ([`params`],
//! [`filters`]), sends requests with bounded retry ([`retry`]), and decodes
//! the flat row arrays the API returns ([`socrata`]). Dataset endpoints are
//! configured in embedded TOML files ([`dataset`]).

pub mod dataset;
pub mod filters;
pub mod params;
pub mod retry;
pub mod socrata;

use async_trait::async_trait;
use inspection_map_inspection_models::{CuisineYearCount, RawInspectionRow};

pub use params::{ParamValue, QueryConfig, RawParams, SocrataParams};

/// Errors that can occur while talking to the upstream API.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The upstream API answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {snippet}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body.
        snippet: String,
    },

    /// The response body was valid JSON but not an array of rows.
    #[error("Expected a JSON array of rows, got {found}")]
    ShapeMismatch {
        /// Kind of JSON value received.
        found: &'static str,
    },

    /// The retry loop finished without ever receiving a response.
    #[error("No response received")]
    NoResponse,

    /// Dataset or environment configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// A source of inspection rows.
///
/// [`socrata::SocrataClient`] is the production implementation; tests and
/// offline tools can provide rows from memory.
#[async_trait]
pub trait InspectionSource: Send + Sync {
    /// Query-building settings for this source.
    fn query_config(&self) -> QueryConfig;

    /// Fetches raw inspection rows matching `params`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response is not
    /// a row array.
    async fn fetch_rows(&self, params: &SocrataParams)
    -> Result<Vec<RawInspectionRow>, SourceError>;

    /// Fetches per-year, per-cuisine inspection counts grouped upstream.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response is not
    /// a row array.
    async fn fetch_cuisine_year_counts(
        &self,
        params: &SocrataParams,
    ) -> Result<Vec<CuisineYearCount>, SourceError>;
}
