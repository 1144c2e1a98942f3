//! Cuisine-by-year trend series.
//!
//! Both variants feed the same accumulator: a `year → cuisine → count`
//! bucket map plus a running total per cuisine kept in first-seen order.
//! The top-N cuisines are picked with a stable sort on those totals, so ties
//! go to whichever cuisine appeared first.

use std::collections::{BTreeMap, HashMap};

use inspection_map_analytics_models::{CuisineTrendRow, CuisineTrends, UNKNOWN};
use inspection_map_inspection_models::{CuisineYearCount, Restaurant, leading_year};

#[derive(Default)]
struct TrendAccumulator {
    buckets: BTreeMap<String, HashMap<String, u64>>,
    totals: Vec<(String, u64)>,
    total_index: HashMap<String, usize>,
}

impl TrendAccumulator {
    /// Sums saturate: upstream counts are already clamped to `u64::MAX`.
    fn add(&mut self, year: &str, cuisine: &str, count: u64) {
        let bucket = self
            .buckets
            .entry(year.to_string())
            .or_default()
            .entry(cuisine.to_string())
            .or_insert(0);
        *bucket = bucket.saturating_add(count);

        if let Some(&idx) = self.total_index.get(cuisine) {
            self.totals[idx].1 = self.totals[idx].1.saturating_add(count);
        } else {
            self.total_index
                .insert(cuisine.to_string(), self.totals.len());
            self.totals.push((cuisine.to_string(), count));
        }
    }

    fn finish(mut self, top_n: usize) -> CuisineTrends {
        self.totals.sort_by(|a, b| b.1.cmp(&a.1));
        let top_cuisines: Vec<String> = self
            .totals
            .into_iter()
            .take(top_n)
            .map(|(cuisine, _)| cuisine)
            .collect();

        let data = self
            .buckets
            .into_iter()
            .map(|(year, counts)| CuisineTrendRow {
                year,
                counts: top_cuisines
                    .iter()
                    .map(|c| (c.clone(), counts.get(c).copied().unwrap_or(0)))
                    .collect(),
            })
            .collect();

        CuisineTrends { data, top_cuisines }
    }
}

/// Counts inspections per year and cuisine across grouped restaurants.
///
/// Every inspection of every restaurant is counted once under the year
/// taken from the first four characters of its date. Inspections whose date
/// is missing or does not start with four digits are skipped. Only the
/// `top_n` cuisines by total count appear in the output rows.
#[must_use]
pub fn aggregate_cuisine_trends(restaurants: &[Restaurant], top_n: usize) -> CuisineTrends {
    let mut acc = TrendAccumulator::default();
    let mut skipped = 0_u64;

    for restaurant in restaurants {
        let cuisine = restaurant.cuisine.as_deref().unwrap_or(UNKNOWN);
        for inspection in &restaurant.inspections {
            match inspection.year() {
                Some(year) => acc.add(year, cuisine, 1),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} inspections without a usable year");
    }

    acc.finish(top_n)
}

/// Re-buckets rows the upstream API already grouped by year and cuisine.
///
/// Counts arrive as strings; anything that does not parse to a finite,
/// non-negative number counts as zero. Rows without a four-digit year are
/// skipped.
#[must_use]
pub fn aggregate_cuisine_trends_from_rows(rows: &[CuisineYearCount], top_n: usize) -> CuisineTrends {
    let mut acc = TrendAccumulator::default();

    for row in rows {
        let Some(year) = row.year.as_deref().and_then(leading_year) else {
            continue;
        };
        let cuisine = row.cuisine_description.as_deref().unwrap_or(UNKNOWN);
        acc.add(year, cuisine, coerce_count(row.count.as_deref()));
    }

    acc.finish(top_n)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn coerce_count(value: Option<&str>) -> u64 {
    let Some(n) = value.and_then(|v| v.trim().parse::<f64>().ok()) else {
        return 0;
    };
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    if n >= u64::MAX as f64 {
        return u64::MAX;
    }
    n.round() as u64
}
