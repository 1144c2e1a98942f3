//! Dataset registry, loaded from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/datasets/` is baked into the binary
//! with [`include_str!`]. Adding a dataset means adding a file and a line to
//! [`DATASET_TOMLS`].

use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::params::{DEFAULT_MARKER_LIMIT, LIMIT, ParamValue, QueryConfig, SocrataParams};

/// TOML configs embedded at compile time.
const DATASET_TOMLS: &[(&str, &str)] = &[(
    "nyc_restaurant_inspections",
    include_str!("../datasets/nyc_restaurant_inspections.toml"),
)];

/// Dataset used when none is named.
pub const DEFAULT_DATASET_ID: &str = "nyc_restaurant_inspections";

const fn default_page_size() -> u64 {
    50_000
}

const fn default_marker_limit() -> u64 {
    DEFAULT_MARKER_LIMIT
}

const fn default_limit() -> u64 {
    1_000
}

const fn default_trend_top_n() -> usize {
    6
}

const fn default_request_timeout_secs() -> u64 {
    60
}

/// One upstream Socrata dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    /// Unique identifier, e.g. `"nyc_restaurant_inspections"`.
    pub id: String,
    /// Human-readable title.
    pub name: String,
    /// SODA resource endpoint, e.g.
    /// `"https://data.cityofnewyork.us/resource/43nn-pn8j.json"`.
    pub api_url: String,
    /// Rows per request when paging through the whole dataset.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// `$limit` for marker-only queries that did not set one.
    #[serde(default = "default_marker_limit")]
    pub marker_default_limit: u64,
    /// `$limit` for ordinary queries that did not set one.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// How many cuisines a trend series keeps.
    #[serde(default = "default_trend_top_n")]
    pub trend_top_n: usize,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Human-readable dataset page. Derived from `api_url` when unset.
    #[serde(default)]
    pub portal_url: Option<String>,
}

impl DatasetDefinition {
    /// Returns the portal URL for this dataset.
    ///
    /// An explicit `portal_url` wins. Otherwise Socrata API URLs are
    /// rewritten from `/resource/{id}.json` to `/d/{id}`.
    #[must_use]
    pub fn portal_url(&self) -> Option<String> {
        if let Some(ref url) = self.portal_url {
            return Some(url.clone());
        }
        self.api_url.find("/resource/").map(|idx| {
            let base = &self.api_url[..idx];
            let rest = &self.api_url[idx + "/resource/".len()..];
            let dataset_id = rest.strip_suffix(".json").unwrap_or(rest);
            format!("{base}/d/{dataset_id}")
        })
    }

    /// Query-building settings for this dataset.
    #[must_use]
    pub const fn query_config(&self) -> QueryConfig {
        QueryConfig {
            marker_default_limit: self.marker_default_limit,
        }
    }

    /// Sets `$limit` to [`Self::default_limit`] when the query has none.
    pub fn apply_default_limit(&self, params: &mut SocrataParams) {
        params.entry(LIMIT.to_string()).or_insert_with(|| {
            ParamValue::Integer(i64::try_from(self.default_limit).unwrap_or(i64::MAX))
        });
    }
}

/// Parses a TOML string into a [`DatasetDefinition`].
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the TOML is malformed or missing
/// required fields.
pub fn parse_dataset_toml(toml_str: &str) -> Result<DatasetDefinition, SourceError> {
    toml::de::from_str(toml_str).map_err(|e| SourceError::Config {
        message: e.to_string(),
    })
}

/// Returns every configured dataset.
///
/// # Errors
///
/// Returns [`SourceError::Config`] naming the first file that fails to parse.
pub fn all_datasets() -> Result<Vec<DatasetDefinition>, SourceError> {
    DATASET_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_dataset_toml(toml).map_err(|e| SourceError::Config {
                message: format!("Failed to parse {name}.toml: {e}"),
            })
        })
        .collect()
}

/// Looks up a dataset by id.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the registry fails to load or no
/// dataset has that id.
pub fn find_dataset(id: &str) -> Result<DatasetDefinition, SourceError> {
    all_datasets()?
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| SourceError::Config {
            message: format!("Unknown dataset: {id}"),
        })
}

/// The restaurant inspection dataset.
///
/// # Errors
///
/// See [`find_dataset`].
pub fn default_dataset() -> Result<DatasetDefinition, SourceError> {
    find_dataset(DEFAULT_DATASET_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_datasets() {
        let datasets = all_datasets().unwrap();
        assert_eq!(datasets.len(), DATASET_TOMLS.len());

        let mut ids: Vec<&str> = datasets.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), datasets.len());
    }

    #[test]
    fn default_dataset_is_restaurant_inspections() {
        let dataset = default_dataset().unwrap();
        assert_eq!(dataset.id, DEFAULT_DATASET_ID);
        assert_eq!(
            dataset.api_url,
            "https://data.cityofnewyork.us/resource/43nn-pn8j.json"
        );
        assert_eq!(dataset.marker_default_limit, 300);
        assert_eq!(dataset.trend_top_n, 6);
    }

    #[test]
    fn derives_portal_url() {
        let dataset = default_dataset().unwrap();
        assert_eq!(
            dataset.portal_url().as_deref(),
            Some("https://data.cityofnewyork.us/d/43nn-pn8j")
        );
    }

    #[test]
    fn explicit_portal_url_wins() {
        let dataset = parse_dataset_toml(
            r#"
            id = "x"
            name = "X"
            api_url = "https://example.org/resource/abcd-1234.json"
            portal_url = "https://example.org/about"
            "#,
        )
        .unwrap();
        assert_eq!(dataset.portal_url().as_deref(), Some("https://example.org/about"));
        assert_eq!(dataset.page_size, 50_000);
        assert_eq!(dataset.default_limit, 1_000);
    }

    #[test]
    fn missing_fields_are_config_errors() {
        assert!(matches!(
            parse_dataset_toml("id = \"x\""),
            Err(SourceError::Config { .. })
        ));
        assert!(matches!(
            find_dataset("nope"),
            Err(SourceError::Config { .. })
        ));
    }

    #[test]
    fn default_limit_only_fills_gaps() {
        let dataset = default_dataset().unwrap();

        let mut empty = SocrataParams::new();
        dataset.apply_default_limit(&mut empty);
        assert_eq!(empty[LIMIT], ParamValue::Integer(1_000));

        let mut set = SocrataParams::new();
        set.insert(LIMIT.to_string(), ParamValue::Integer(5));
        dataset.apply_default_limit(&mut set);
        assert_eq!(set[LIMIT], ParamValue::Integer(5));
    }
}
