#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line client for the restaurant inspection map.
//!
//! Query subcommands print JSON to stdout so the output can be piped into
//! other tools. Logs go to stderr and are controlled by `RUST_LOG`.

mod args;

use clap::{Parser, Subcommand};
use inspection_map_analytics::{
    aggregate_cuisine_trends, aggregate_cuisine_trends_from_rows, inspection_stats,
};
use inspection_map_analytics_models::{DEFAULT_SCORE_BUCKET_WIDTH, TrendMode};
use inspection_map_inspection::{GroupOptions, group_restaurants, group_restaurants_with};
use inspection_map_inspection_models::RestaurantMarker;
use inspection_map_source::dataset::all_datasets;
use inspection_map_source::filters::InspectionFilters;
use inspection_map_source::socrata::SocrataClient;
use inspection_map_source::{InspectionSource as _, SocrataParams};

use crate::args::FilterArgs;

#[derive(Parser)]
#[command(
    name = "inspection_map_cli",
    about = "NYC restaurant inspection data tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch matching rows and print them grouped by restaurant
    Restaurants {
        #[command(flatten)]
        filters: FilterArgs,
        /// Page through every matching row instead of a single request
        #[arg(long)]
        all: bool,
        /// Stop paging after this many rows (with `--all`)
        #[arg(long)]
        max_rows: Option<u64>,
        /// Keep the 1900-01-01 placeholder date on uninspected restaurants
        #[arg(long)]
        include_sentinel: bool,
    },
    /// Print inspection counts per year for the top cuisines
    Trends {
        #[command(flatten)]
        filters: FilterArgs,
        /// Number of cuisines to keep
        #[arg(long)]
        top: Option<usize>,
        /// Aggregate locally (`client`) or upstream (`server`)
        #[arg(long, default_value = "client")]
        mode: TrendMode,
    },
    /// Print grade, score and borough breakdowns
    Stats {
        #[command(flatten)]
        filters: FilterArgs,
        /// Score histogram bucket width
        #[arg(long, default_value_t = DEFAULT_SCORE_BUCKET_WIDTH)]
        bucket: u32,
    },
    /// Print the upstream request URL without sending it
    Url {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// List configured datasets
    Datasets,
    /// Start the API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Restaurants {
            filters,
            all,
            max_rows,
            include_sentinel,
        } => {
            let filters = InspectionFilters::from(filters);
            let client = SocrataClient::from_env()?;
            let params = build_params(&client, &filters)?;

            let rows = if all {
                client.fetch_all_rows(&params, max_rows).await?
            } else {
                client.fetch_rows(&params).await?
            };
            let restaurants = group_restaurants_with(&rows, GroupOptions { include_sentinel });
            log::info!(
                "Grouped {} rows into {} restaurants",
                rows.len(),
                restaurants.len()
            );

            if filters.is_marker_only() {
                let markers: Vec<RestaurantMarker> = restaurants
                    .iter()
                    .filter_map(RestaurantMarker::from_restaurant)
                    .collect();
                print_json(&markers)?;
            } else {
                print_json(&restaurants)?;
            }
        }
        Commands::Trends { filters, top, mode } => {
            let filters = InspectionFilters::from(filters);
            let client = SocrataClient::from_env()?;
            let params = build_params(&client, &filters)?;
            let top_n = top.unwrap_or(client.dataset().trend_top_n);

            let trends = match mode {
                TrendMode::Client => {
                    let rows = client.fetch_rows(&params).await?;
                    aggregate_cuisine_trends(&group_restaurants(&rows), top_n)
                }
                TrendMode::Server => {
                    let rows = client.fetch_cuisine_year_counts(&params).await?;
                    aggregate_cuisine_trends_from_rows(&rows, top_n)
                }
            };
            print_json(&trends)?;
        }
        Commands::Stats { filters, bucket } => {
            let filters = InspectionFilters::from(filters);
            let client = SocrataClient::from_env()?;
            let params = build_params(&client, &filters)?;

            let rows = client.fetch_rows(&params).await?;
            print_json(&inspection_stats(&group_restaurants(&rows), bucket))?;
        }
        Commands::Url { filters } => {
            let filters = InspectionFilters::from(filters);
            let client = SocrataClient::from_env()?;
            let params = build_params(&client, &filters)?;
            println!("{}", client.url_for(&params)?);
        }
        Commands::Datasets => {
            let datasets = all_datasets()?;
            println!("{:<30} NAME", "ID");
            println!("{}", "-".repeat(80));
            for dataset in &datasets {
                println!("{:<30} {}", dataset.id, dataset.name);
            }
        }
        Commands::Serve => {
            // actix-web brings its own runtime; run it off the tokio workers.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(inspection_map_server::run_server())
            })
            .await??;
        }
    }

    Ok(())
}

fn build_params(
    client: &SocrataClient,
    filters: &InspectionFilters,
) -> Result<SocrataParams, Box<dyn std::error::Error>> {
    filters.validate()?;
    let mut params = filters.to_socrata_params(&client.query_config());
    client.dataset().apply_default_limit(&mut params);
    Ok(params)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
