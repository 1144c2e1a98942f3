//! HTTP handler functions for the inspection map API.

use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, web};
use inspection_map_analytics::{
    aggregate_cuisine_trends, aggregate_cuisine_trends_from_rows, inspection_stats,
};
use inspection_map_analytics_models::{DEFAULT_SCORE_BUCKET_WIDTH, TrendMode};
use inspection_map_inspection::{GroupOptions, group_restaurants, group_restaurants_with};
use inspection_map_inspection_models::{Restaurant, RestaurantMarker};
use inspection_map_server_models::{
    ApiDataset, ApiError, ApiHealth, RestaurantsQueryParams, StatsQueryParams, TrendsQueryParams,
};
use inspection_map_source::SocrataParams;
use inspection_map_source::dataset::all_datasets;
use inspection_map_source::filters::InspectionFilters;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/restaurants`
///
/// Fetches rows matching the filters and returns them grouped by restaurant,
/// or as compact marker summaries when `markerOnly` is set.
pub async fn restaurants(
    state: web::Data<AppState>,
    filters: web::Query<InspectionFilters>,
    params: web::Query<RestaurantsQueryParams>,
) -> HttpResponse {
    let query = match build_query(&state, &filters) {
        Ok(query) => query,
        Err(response) => return response,
    };

    let rows = match state.source.fetch_rows(&query).await {
        Ok(rows) => rows,
        Err(e) => return upstream_error("restaurants", &e),
    };

    let restaurants = group_restaurants_with(
        &rows,
        GroupOptions {
            include_sentinel: params.include_sentinel,
        },
    );

    if filters.is_marker_only() {
        let markers: Vec<RestaurantMarker> = restaurants
            .iter()
            .filter_map(RestaurantMarker::from_restaurant)
            .collect();
        HttpResponse::Ok().json(markers)
    } else {
        HttpResponse::Ok().json(restaurants)
    }
}

/// `GET /api/restaurants/{camis}`
///
/// Returns one restaurant with its full inspection history.
pub async fn restaurant(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<RestaurantsQueryParams>,
) -> HttpResponse {
    let camis = path.into_inner();
    let filters = InspectionFilters {
        camis: Some(camis.clone()),
        ..InspectionFilters::default()
    };
    let query = match build_query(&state, &filters) {
        Ok(query) => query,
        Err(response) => return response,
    };

    let rows = match state.source.fetch_rows(&query).await {
        Ok(rows) => rows,
        Err(e) => return upstream_error("restaurant", &e),
    };

    let found = group_restaurants_with(
        &rows,
        GroupOptions {
            include_sentinel: params.include_sentinel,
        },
    )
    .into_iter()
    .find(|r| r.camis == camis);

    found.map_or_else(
        || HttpResponse::NotFound().json(ApiError::new(format!("Restaurant {camis} not found"))),
        |restaurant| HttpResponse::Ok().json(restaurant),
    )
}

/// `GET /api/trends`
///
/// Inspection counts per year for the top cuisines. `mode=server` lets the
/// upstream API do the grouping; the default groups rows locally.
pub async fn trends(
    state: web::Data<AppState>,
    filters: web::Query<InspectionFilters>,
    params: web::Query<TrendsQueryParams>,
) -> HttpResponse {
    let query = match build_query(&state, &filters) {
        Ok(query) => query,
        Err(response) => return response,
    };
    let top_n = params.top.unwrap_or(state.dataset.trend_top_n);

    let result = match params.mode {
        TrendMode::Client => state
            .source
            .fetch_rows(&query)
            .await
            .map(|rows| aggregate_cuisine_trends(&group_restaurants(&rows), top_n)),
        TrendMode::Server => state
            .source
            .fetch_cuisine_year_counts(&query)
            .await
            .map(|rows| aggregate_cuisine_trends_from_rows(&rows, top_n)),
    };

    match result {
        Ok(trends) => HttpResponse::Ok().json(trends),
        Err(e) => upstream_error("cuisine trends", &e),
    }
}

/// `GET /api/stats`
///
/// Grade distribution, score histogram and borough counts for the
/// restaurants matching the filters.
pub async fn stats(
    state: web::Data<AppState>,
    filters: web::Query<InspectionFilters>,
    params: web::Query<StatsQueryParams>,
) -> HttpResponse {
    let query = match build_query(&state, &filters) {
        Ok(query) => query,
        Err(response) => return response,
    };

    match state.source.fetch_rows(&query).await {
        Ok(rows) => {
            let restaurants: Vec<Restaurant> = group_restaurants(&rows);
            let bucket = params.bucket.unwrap_or(DEFAULT_SCORE_BUCKET_WIDTH);
            HttpResponse::Ok().json(inspection_stats(&restaurants, bucket))
        }
        Err(e) => upstream_error("stats", &e),
    }
}

/// `GET /api/datasets`
///
/// Lists the configured upstream datasets.
pub async fn datasets() -> HttpResponse {
    match all_datasets() {
        Ok(datasets) => {
            let datasets: Vec<ApiDataset> = datasets.iter().map(ApiDataset::from).collect();
            HttpResponse::Ok().json(datasets)
        }
        Err(e) => {
            log::error!("Failed to load datasets: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to load datasets"))
        }
    }
}

/// Validates the filters and builds the upstream query, applying the
/// dataset's default `$limit`.
fn build_query(
    state: &AppState,
    filters: &InspectionFilters,
) -> Result<SocrataParams, HttpResponse> {
    filters
        .validate()
        .map_err(|e| HttpResponse::BadRequest().json(ApiError::new(e.to_string())))?;

    let mut query = filters.to_socrata_params(&state.source.query_config());
    state.dataset.apply_default_limit(&mut query);
    Ok(query)
}

/// Malformed query strings get the same JSON error body as every other
/// non-2xx response.
pub fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected query for {}: {err}", req.path());
    let response = HttpResponse::BadRequest().json(ApiError::new(err.to_string()));
    InternalError::from_response(err, response).into()
}

fn upstream_error(what: &str, e: &inspection_map_source::SourceError) -> HttpResponse {
    log::error!("Failed to fetch {what}: {e}");
    HttpResponse::BadGateway().json(ApiError::new(format!("Failed to fetch {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{App, http::StatusCode, test};
    use async_trait::async_trait;
    use inspection_map_inspection_models::{CuisineYearCount, RawInspectionRow};
    use inspection_map_source::dataset::default_dataset;
    use inspection_map_source::params::{LIMIT, SELECT};
    use inspection_map_source::{InspectionSource, ParamValue, QueryConfig, SourceError};

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        rows: Vec<RawInspectionRow>,
        counts: Vec<CuisineYearCount>,
        fail: bool,
        seen: Mutex<Vec<SocrataParams>>,
    }

    #[async_trait]
    impl InspectionSource for FakeSource {
        fn query_config(&self) -> QueryConfig {
            QueryConfig::default()
        }

        async fn fetch_rows(
            &self,
            params: &SocrataParams,
        ) -> Result<Vec<RawInspectionRow>, SourceError> {
            self.seen.lock().unwrap().push(params.clone());
            if self.fail {
                return Err(SourceError::Upstream {
                    status: 503,
                    snippet: "down".to_string(),
                });
            }
            let camis = params.get("camis").map(ToString::to_string);
            Ok(self
                .rows
                .iter()
                .filter(|r| camis.is_none() || r.camis == camis)
                .cloned()
                .collect())
        }

        async fn fetch_cuisine_year_counts(
            &self,
            params: &SocrataParams,
        ) -> Result<Vec<CuisineYearCount>, SourceError> {
            self.seen.lock().unwrap().push(params.clone());
            Ok(self.counts.clone())
        }
    }

    fn rows() -> Vec<RawInspectionRow> {
        serde_json::from_value(serde_json::json!([
            {
                "camis": "50001", "dba": "JOE'S PIZZA", "boro": "Manhattan",
                "cuisine_description": "Pizza", "latitude": "40.73", "longitude": "-73.99",
                "inspection_date": "2023-02-01T00:00:00.000", "grade": "A", "score": "10",
                "violation_code": "10F", "violation_description": "Surfaces", "critical_flag": "Not Critical"
            },
            {
                "camis": "50001", "dba": "JOE'S PIZZA", "boro": "Manhattan",
                "cuisine_description": "Pizza", "latitude": "40.73", "longitude": "-73.99",
                "inspection_date": "2023-02-01T00:00:00.000",
                "violation_code": "04L", "violation_description": "Mice", "critical_flag": "Critical"
            },
            {
                "camis": "50002", "dba": "SUSHI PLACE", "boro": "Queens",
                "cuisine_description": "Japanese",
                "inspection_date": "2022-06-01T00:00:00.000", "grade": "B", "score": "20"
            },
            {
                "camis": "50003", "dba": "NEW SPOT", "boro": "Brooklyn",
                "cuisine_description": "Thai", "inspection_date": "1900-01-01T00:00:00.000"
            }
        ]))
        .unwrap()
    }

    fn state(source: FakeSource) -> (web::Data<AppState>, Arc<FakeSource>) {
        let source = Arc::new(source);
        let data = web::Data::new(AppState {
            source: source.clone(),
            dataset: default_dataset().unwrap(),
        });
        (data, source)
    }

    async fn get(
        state: web::Data<AppState>,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let app = test::init_service(App::new().app_data(state).configure(crate::configure)).await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let (data, _) = state(FakeSource::default());
        let (status, body) = get(data, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
    }

    #[actix_web::test]
    async fn restaurants_are_grouped() {
        let (data, source) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/restaurants?boro=Manhattan").await;

        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0]["camis"], "50001");
        assert_eq!(list[0]["inspections"].as_array().unwrap().len(), 1);
        assert_eq!(
            list[0]["inspections"][0]["violations"].as_array().unwrap().len(),
            2
        );

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0]["boro"], ParamValue::text("Manhattan"));
        assert_eq!(seen[0][LIMIT], ParamValue::Integer(1_000));
    }

    #[actix_web::test]
    async fn marker_only_returns_markers() {
        let (data, source) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/restaurants?markerOnly=true").await;

        assert_eq!(status, StatusCode::OK);
        let markers = body.as_array().unwrap();
        assert!(markers.iter().all(|m| m.get("inspections").is_none()));
        assert!(markers.iter().any(|m| m["camis"] == "50001"));

        let seen = source.seen.lock().unwrap();
        assert!(seen[0].contains_key(SELECT));
        assert_eq!(seen[0][LIMIT], ParamValue::Integer(300));
        assert!(!seen[0].contains_key("markerOnly"));
    }

    #[actix_web::test]
    async fn sentinel_date_hidden_unless_requested() {
        let (data, _) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (_, body) = get(data.clone(), "/api/restaurants/50003").await;
        assert!(body["inspections"][0].get("inspectionDate").is_none_or(serde_json::Value::is_null));

        let (_, body) = get(data, "/api/restaurants/50003?includeSentinel=true").await;
        assert_eq!(
            body["inspections"][0]["inspectionDate"],
            "1900-01-01T00:00:00.000"
        );
    }

    #[actix_web::test]
    async fn unknown_restaurant_is_404() {
        let (data, _) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/restaurants/99999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("99999"));
    }

    #[actix_web::test]
    async fn upstream_failure_is_502() {
        let (data, _) = state(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/restaurants").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("503"));
    }

    #[actix_web::test]
    async fn invalid_filters_are_400() {
        let (data, source) = state(FakeSource::default());
        let (status, body) = get(data, "/api/restaurants?from=2023-05-01&to=2023-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("inverted"));
        assert!(source.seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn marker_flag_accepts_wire_forms() {
        for flag in ["1", "TRUE", "True", "true"] {
            let (data, source) = state(FakeSource {
                rows: rows(),
                ..FakeSource::default()
            });
            let (status, body) = get(data, &format!("/api/restaurants?markerOnly={flag}")).await;

            assert_eq!(status, StatusCode::OK, "markerOnly={flag}");
            assert!(body.as_array().unwrap().iter().all(|m| m.get("inspections").is_none()));
            assert!(source.seen.lock().unwrap()[0].contains_key(SELECT));
        }
    }

    #[actix_web::test]
    async fn false_marker_flag_returns_full_restaurants() {
        let (data, source) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/restaurants?markerOnly=0").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body[0].get("inspections").is_some());
        assert!(!source.seen.lock().unwrap()[0].contains_key(SELECT));
    }

    #[actix_web::test]
    async fn malformed_bbox_is_ignored() {
        let (data, source) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, _) = get(
            data,
            "/api/restaurants?minLat=north&maxLat=41&minLng=-74&maxLng=-73",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!source.seen.lock().unwrap()[0].contains_key("$where"));
    }

    #[actix_web::test]
    async fn complete_bbox_reaches_upstream() {
        let (data, source) = state(FakeSource::default());
        let (status, _) = get(
            data,
            "/api/restaurants?minLat=40.5&maxLat=41&minLng=-74.25&maxLng=-73.5",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            source.seen.lock().unwrap()[0]["$where"],
            ParamValue::text(
                "latitude between 40.5 and 41 AND longitude between -74.25 and -73.5"
            )
        );
    }

    #[actix_web::test]
    async fn malformed_query_is_json_400() {
        let (data, source) = state(FakeSource::default());
        let (status, body) = get(data, "/api/restaurants?from=yesterday").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert!(source.seen.lock().unwrap().is_empty());

        let (data, _) = state(FakeSource::default());
        let (status, body) = get(data, "/api/trends?mode=sideways").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn client_trends_group_rows() {
        let (data, _) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/trends?top=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topCuisines"], serde_json::json!(["Pizza", "Japanese"]));
        assert_eq!(
            body["data"],
            serde_json::json!([
                {"year": "2022", "Pizza": 0, "Japanese": 1},
                {"year": "2023", "Pizza": 1, "Japanese": 0},
            ])
        );
    }

    #[actix_web::test]
    async fn server_trends_use_upstream_counts() {
        let counts: Vec<CuisineYearCount> = serde_json::from_value(serde_json::json!([
            {"year": "2021", "cuisine_description": "Pizza", "count": "5"},
            {"year": "2021", "cuisine_description": "Thai", "count": "2"},
        ]))
        .unwrap();
        let (data, source) = state(FakeSource {
            counts,
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/trends?mode=server&boro=Queens").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topCuisines"], serde_json::json!(["Pizza", "Thai"]));
        assert_eq!(body["data"][0]["Pizza"], 5);

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0]["boro"], ParamValue::text("Queens"));
    }

    #[actix_web::test]
    async fn stats_summarize_restaurants() {
        let (data, _) = state(FakeSource {
            rows: rows(),
            ..FakeSource::default()
        });
        let (status, body) = get(data, "/api/stats?bucket=5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["restaurantCount"], 3);
        assert_eq!(body["inspectionCount"], 3);
        assert_eq!(body["boroughs"].as_array().unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn lists_datasets() {
        let (data, _) = state(FakeSource::default());
        let (status, body) = get(data, "/api/datasets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "nyc_restaurant_inspections");
    }
}
