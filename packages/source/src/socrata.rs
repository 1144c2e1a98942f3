//! Socrata SODA API client.
//!
//! Sends SoQL queries built by [`crate::params`] through the retry helper,
//! checks the status, and decodes the JSON array body into typed rows.
//! Rows that fail to deserialize are dropped with a warning rather than
//! failing the whole request.

use std::time::Duration;

use async_trait::async_trait;
use inspection_map_inspection_models::{CuisineYearCount, RawInspectionRow};
use serde::de::DeserializeOwned;

use crate::dataset::{DatasetDefinition, default_dataset};
use crate::params::{LIMIT, OFFSET, ORDER, ParamValue, build_socrata_url, cuisine_trend_params};
use crate::retry::{RetryPolicy, retry_fetch};
use crate::{InspectionSource, QueryConfig, SocrataParams, SourceError};

/// Header carrying the optional Socrata application token.
pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Environment variable holding the application token.
pub const APP_TOKEN_ENV: &str = "SOCRATA_APP_TOKEN";

/// Environment variable overriding the dataset's API URL.
pub const API_URL_ENV: &str = "SOCRATA_API_URL";

/// Maximum number of characters of an error body kept in
/// [`SourceError::Upstream`].
const BODY_SNIPPET_LEN: usize = 500;

/// Sort used when paging so offsets stay stable between requests.
const DEFAULT_PAGE_ORDER: &str = "camis";

/// HTTP client for one Socrata dataset.
#[derive(Debug, Clone)]
pub struct SocrataClient {
    client: reqwest::Client,
    dataset: DatasetDefinition,
    app_token: Option<String>,
    retry: RetryPolicy,
}

impl SocrataClient {
    /// Creates a client for `dataset`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(dataset: DatasetDefinition, app_token: Option<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(dataset.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            dataset,
            app_token: app_token.filter(|t| !t.trim().is_empty()),
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a client for the default dataset, honoring
    /// `SOCRATA_API_URL` and `SOCRATA_APP_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the dataset registry fails to load or the
    /// HTTP client cannot be built.
    pub fn from_env() -> Result<Self, SourceError> {
        let mut dataset = default_dataset()?;
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            log::info!("Using API URL override from {API_URL_ENV}: {url}");
            dataset.api_url = url.trim().to_string();
        }

        let app_token = std::env::var(APP_TOKEN_ENV).ok();
        if app_token.is_none() {
            log::debug!("{APP_TOKEN_ENV} not set, requests will be throttled more aggressively");
        }

        Self::new(dataset, app_token)
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The dataset this client queries.
    #[must_use]
    pub const fn dataset(&self) -> &DatasetDefinition {
        &self.dataset
    }

    /// Full request URL for `params`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the dataset's API URL is invalid.
    pub fn url_for(&self, params: &SocrataParams) -> Result<String, SourceError> {
        build_socrata_url(&self.dataset.api_url, params)
    }

    /// Sends one query and returns the raw JSON array elements.
    ///
    /// # Errors
    ///
    /// * [`SourceError::Http`] on transport failure.
    /// * [`SourceError::Upstream`] if the final status is not a success.
    /// * [`SourceError::Json`] or [`SourceError::ShapeMismatch`] if the body
    ///   is not a JSON array.
    pub async fn fetch_json(
        &self,
        params: &SocrataParams,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let url = self.url_for(params)?;
        log::debug!("GET {url}");

        let response = retry_fetch(&self.retry, || {
            let mut request = self.client.get(&url);
            if let Some(token) = &self.app_token {
                request = request.header(APP_TOKEN_HEADER, token);
            }
            request.send()
        })
        .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_response(status, &body).inspect_err(|e| {
            log::error!("Request to {url} failed: {e}");
        })
    }

    /// Fetches one page of inspection rows.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_json`].
    pub async fn fetch_rows(
        &self,
        params: &SocrataParams,
    ) -> Result<Vec<RawInspectionRow>, SourceError> {
        let items = self.fetch_json(params).await?;
        Ok(parse_rows(items))
    }

    /// Pages through every row matching `params` using `$limit`/`$offset`.
    ///
    /// Stops on a short page or once `max_rows` rows have been read. `$order`
    /// defaults to `camis` so pages do not overlap.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_json`]. Rows collected before a failing page are
    /// discarded.
    pub async fn fetch_all_rows(
        &self,
        params: &SocrataParams,
        max_rows: Option<u64>,
    ) -> Result<Vec<RawInspectionRow>, SourceError> {
        let mut params = params.clone();
        params
            .entry(ORDER.to_string())
            .or_insert_with(|| ParamValue::text(DEFAULT_PAGE_ORDER));

        let mut pager = Pager::new(self.dataset.page_size, max_rows);
        let mut rows = Vec::new();

        while let Some(page_limit) = pager.next_limit() {
            let offset = pager.offset;
            params.insert(LIMIT.to_string(), ParamValue::Integer(to_i64(page_limit)));
            params.insert(OFFSET.to_string(), ParamValue::Integer(to_i64(offset)));

            log::info!(
                "Fetching {}: offset={offset}, limit={page_limit}",
                self.dataset.id
            );
            let items = self.fetch_json(&params).await?;
            pager.record(page_limit, items.len() as u64);
            rows.extend(parse_rows::<RawInspectionRow>(items));
        }

        log::info!("Downloaded {} {} rows total", rows.len(), self.dataset.id);
        Ok(rows)
    }

    /// Runs the year/cuisine aggregate query upstream.
    ///
    /// `filters` are already-built query parameters; their row filters are
    /// kept and the projection is replaced.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_json`].
    pub async fn fetch_cuisine_year_counts(
        &self,
        filters: &SocrataParams,
    ) -> Result<Vec<CuisineYearCount>, SourceError> {
        let params = cuisine_trend_params(filters, self.dataset.page_size);
        let items = self.fetch_json(&params).await?;
        Ok(parse_rows(items))
    }
}

#[async_trait]
impl InspectionSource for SocrataClient {
    fn query_config(&self) -> QueryConfig {
        self.dataset.query_config()
    }

    async fn fetch_rows(
        &self,
        params: &SocrataParams,
    ) -> Result<Vec<RawInspectionRow>, SourceError> {
        Self::fetch_rows(self, params).await
    }

    async fn fetch_cuisine_year_counts(
        &self,
        params: &SocrataParams,
    ) -> Result<Vec<CuisineYearCount>, SourceError> {
        Self::fetch_cuisine_year_counts(self, params).await
    }
}

/// Deserializes each element, dropping the ones that do not fit `T`.
pub fn parse_rows<T: DeserializeOwned>(items: Vec<serde_json::Value>) -> Vec<T> {
    let total = items.len();
    let rows: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    let dropped = total - rows.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} of {total} rows that failed validation");
    }
    rows
}

/// Turns a final status and body into row values.
///
/// 2xx and 3xx count as success; anything else becomes
/// [`SourceError::Upstream`] with the start of the body.
fn decode_response(status: u16, body: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    if !(200..400).contains(&status) {
        return Err(SourceError::Upstream {
            status,
            snippet: body_snippet(body),
        });
    }

    match serde_json::from_str(body)? {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(SourceError::ShapeMismatch {
            found: json_kind(&other),
        }),
    }
}

/// `$limit`/`$offset` bookkeeping for [`SocrataClient::fetch_all_rows`].
#[derive(Debug)]
struct Pager {
    page_size: u64,
    max_rows: u64,
    offset: u64,
    exhausted: bool,
}

impl Pager {
    fn new(page_size: u64, max_rows: Option<u64>) -> Self {
        Self {
            page_size: page_size.max(1),
            max_rows: max_rows.unwrap_or(u64::MAX),
            offset: 0,
            exhausted: false,
        }
    }

    /// `$limit` for the next request, or `None` when paging is over.
    fn next_limit(&self) -> Option<u64> {
        if self.exhausted {
            return None;
        }
        let remaining = self.max_rows.saturating_sub(self.offset);
        (remaining > 0).then(|| remaining.min(self.page_size))
    }

    /// A page shorter than requested means the dataset has no more rows.
    fn record(&mut self, requested: u64, received: u64) {
        self.offset = self.offset.saturating_add(received);
        if received < requested {
            self.exhausted = true;
        }
    }
}

fn body_snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows_keeps_valid_rows() {
        let items = vec![
            serde_json::json!({"camis": "1", "dba": "A"}),
            serde_json::json!({"camis": ["not", "a", "string"]}),
            serde_json::json!({"camis": 2, "score": 12}),
            serde_json::json!("just a string"),
        ];
        let rows: Vec<RawInspectionRow> = parse_rows(items);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].camis.as_deref(), Some("1"));
        assert_eq!(rows[1].camis.as_deref(), Some("2"));
        assert_eq!(rows[1].score.as_deref(), Some("12"));
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let body = "é".repeat(600);
        let snippet = body_snippet(&body);
        assert_eq!(snippet.chars().count(), 500);

        assert_eq!(body_snippet("short"), "short");
    }

    #[test]
    fn names_json_kinds() {
        assert_eq!(json_kind(&serde_json::json!({"error": true})), "object");
        assert_eq!(json_kind(&serde_json::json!(null)), "null");
        assert_eq!(json_kind(&serde_json::json!(3)), "number");
    }

    #[test]
    fn error_status_carries_body_snippet() {
        let body = format!("{{\"message\": \"{}\"}}", "x".repeat(800));
        let err = decode_response(503, &body).unwrap_err();

        let SourceError::Upstream { status, snippet } = &err else {
            panic!("expected upstream error, got {err:?}");
        };
        assert_eq!(*status, 503);
        assert_eq!(snippet.chars().count(), 500);
        assert!(snippet.starts_with("{\"message\""));

        assert!(matches!(
            decode_response(404, "not found"),
            Err(SourceError::Upstream { status: 404, .. })
        ));
    }

    #[test]
    fn non_array_body_is_shape_mismatch() {
        assert!(matches!(
            decode_response(200, r#"{"error": true, "message": "query timeout"}"#),
            Err(SourceError::ShapeMismatch { found: "object" })
        ));
        assert!(matches!(
            decode_response(200, "<html>"),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn success_and_redirect_bodies_decode() {
        let items = decode_response(200, r#"[{"camis": "1"}, {"camis": "2"}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert!(decode_response(304, "[]").unwrap().is_empty());
    }

    #[test]
    fn pager_stops_on_short_page() {
        let mut pager = Pager::new(100, None);
        assert_eq!(pager.next_limit(), Some(100));
        pager.record(100, 100);
        assert_eq!(pager.next_limit(), Some(100));
        assert_eq!(pager.offset, 100);
        pager.record(100, 42);
        assert_eq!(pager.next_limit(), None);
        assert_eq!(pager.offset, 142);
    }

    #[test]
    fn pager_stops_on_empty_page() {
        let mut pager = Pager::new(100, None);
        pager.record(100, 100);
        pager.record(100, 0);
        assert_eq!(pager.next_limit(), None);
    }

    #[test]
    fn pager_caps_at_max_rows() {
        let mut pager = Pager::new(100, Some(250));
        let mut limits = Vec::new();
        while let Some(limit) = pager.next_limit() {
            limits.push(limit);
            pager.record(limit, limit);
        }
        assert_eq!(limits, vec![100, 100, 50]);
        assert_eq!(pager.offset, 250);

        assert_eq!(Pager::new(100, Some(0)).next_limit(), None);
        assert_eq!(Pager::new(0, Some(3)).next_limit(), Some(1));
    }

    #[test]
    fn blank_app_token_is_ignored() {
        let dataset = default_dataset().unwrap();
        let client = SocrataClient::new(dataset, Some("  ".to_string())).unwrap();
        assert!(client.app_token.is_none());
    }

    #[test]
    fn url_uses_dataset_endpoint() {
        let client = SocrataClient::new(default_dataset().unwrap(), None).unwrap();
        let mut params = SocrataParams::new();
        params.insert("camis".to_string(), ParamValue::text("41234567"));

        assert_eq!(
            client.url_for(&params).unwrap(),
            "https://data.cityofnewyork.us/resource/43nn-pn8j.json?camis=41234567"
        );
        assert_eq!(client.query_config().marker_default_limit, 300);
    }
}
