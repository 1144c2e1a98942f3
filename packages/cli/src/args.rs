//! Filter flags shared by every query subcommand.

use chrono::NaiveDate;
use clap::Args;
use inspection_map_inspection_models::Borough;
use inspection_map_source::filters::{DensityTier, InspectionFilters};

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Restrict to one restaurant by CAMIS id
    #[arg(long)]
    pub camis: Option<String>,
    /// Borough (e.g., "Queens", "Staten Island")
    #[arg(long)]
    pub boro: Option<Borough>,
    /// Letter grade
    #[arg(long)]
    pub grade: Option<String>,
    /// "Critical", "Not Critical" or "Not Applicable"
    #[arg(long)]
    pub critical_flag: Option<String>,
    /// Full-text search
    #[arg(long, short)]
    pub query: Option<String>,
    /// Row-count preset: low, medium, high, max
    #[arg(long)]
    pub density: Option<DensityTier>,
    /// Bounding box as `min_lat,max_lat,min_lng,max_lng` (ignored unless all four are given)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bbox: Option<Vec<f64>>,
    /// SoQL sort (e.g., "`inspection_date DESC`")
    #[arg(long)]
    pub order: Option<String>,
    /// First inspection date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last inspection date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long)]
    pub offset: Option<u32>,
    /// Only fetch the columns needed for map markers
    #[arg(long)]
    pub marker_only: bool,
}

impl From<FilterArgs> for InspectionFilters {
    fn from(args: FilterArgs) -> Self {
        let (min_lat, max_lat, min_lng, max_lng) = match args.bbox.as_deref() {
            Some(&[a, b, c, d]) => (Some(a), Some(b), Some(c), Some(d)),
            _ => (None, None, None, None),
        };

        Self {
            camis: args.camis,
            boro: args.boro,
            grade: args.grade,
            critical_flag: args.critical_flag,
            q: args.query,
            density: args.density,
            min_lat,
            max_lat,
            min_lng,
            max_lng,
            order: args.order,
            from: args.from,
            to: args.to,
            limit: args.limit,
            offset: args.offset,
            marker_only: args.marker_only.then_some(true),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        filters: FilterArgs,
    }

    fn parse(args: &[&str]) -> InspectionFilters {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().filters.into()
    }

    #[test]
    fn parses_typed_flags() {
        let filters = parse(&[
            "--boro",
            "staten island",
            "--density",
            "high",
            "--from",
            "2023-01-01",
            "--marker-only",
        ]);

        assert_eq!(filters.boro, Some(Borough::StatenIsland));
        assert_eq!(filters.density, Some(DensityTier::High));
        assert_eq!(filters.from, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(filters.marker_only, Some(true));
    }

    #[test]
    fn parses_bbox() {
        let filters = parse(&["--bbox", "40.5,40.9,-74.25,-73.7"]);
        assert_eq!(filters.min_lat, Some(40.5));
        assert_eq!(filters.max_lat, Some(40.9));
        assert_eq!(filters.min_lng, Some(-74.25));
        assert_eq!(filters.max_lng, Some(-73.7));
    }

    #[test]
    fn unset_flags_stay_unset() {
        let filters = parse(&[]);
        assert_eq!(filters, InspectionFilters::default());
    }

    #[test]
    fn rejects_unknown_borough() {
        assert!(TestCli::try_parse_from(["test", "--boro", "Jersey"]).is_err());
    }
}
