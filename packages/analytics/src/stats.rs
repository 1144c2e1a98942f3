//! Grade, score and borough breakdowns over grouped restaurants.

use std::collections::{BTreeMap, HashMap};

use inspection_map_analytics_models::{
    BoroughCount, GradeCount, InspectionStats, NOT_GRADED, ScoreBucket, UNKNOWN,
};
use inspection_map_inspection_models::{Borough, Restaurant};

/// Counts restaurants by their current grade.
///
/// Grades are sorted alphabetically, with [`NOT_GRADED`] last.
#[must_use]
pub fn grade_distribution(restaurants: &[Restaurant]) -> Vec<GradeCount> {
    let mut graded: BTreeMap<String, u64> = BTreeMap::new();
    let mut ungraded = 0_u64;

    for restaurant in restaurants {
        match restaurant.current_grade() {
            Some(grade) => *graded.entry(grade.trim().to_uppercase()).or_insert(0) += 1,
            None => ungraded += 1,
        }
    }

    let mut counts: Vec<GradeCount> = graded
        .into_iter()
        .map(|(grade, count)| GradeCount { grade, count })
        .collect();
    if ungraded > 0 {
        counts.push(GradeCount {
            grade: NOT_GRADED.to_string(),
            count: ungraded,
        });
    }
    counts
}

/// Buckets each restaurant's latest score into `[min, min + width)` ranges.
///
/// Restaurants without a score are left out. A `bucket_width` of zero is
/// treated as one.
#[must_use]
pub fn score_histogram(restaurants: &[Restaurant], bucket_width: u32) -> Vec<ScoreBucket> {
    let width = i32::try_from(bucket_width).unwrap_or(i32::MAX).max(1);
    let mut buckets: BTreeMap<i32, u64> = BTreeMap::new();

    for score in restaurants.iter().filter_map(Restaurant::latest_score) {
        let min = score.div_euclid(width) * width;
        *buckets.entry(min).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(min, count)| ScoreBucket {
            min,
            max: min.saturating_add(width),
            count,
        })
        .collect()
}

/// Counts restaurants per borough in [`Borough::all`] order. Restaurants with
/// no borough on file are counted under [`UNKNOWN`]; empty buckets are
/// omitted.
#[must_use]
pub fn borough_counts(restaurants: &[Restaurant]) -> Vec<BoroughCount> {
    let mut by_borough: HashMap<Borough, u64> = HashMap::new();
    let mut unknown = 0_u64;

    for restaurant in restaurants {
        match restaurant.boro {
            Some(boro) => *by_borough.entry(boro).or_insert(0) += 1,
            None => unknown += 1,
        }
    }

    let mut counts: Vec<BoroughCount> = Borough::all()
        .iter()
        .filter_map(|boro| {
            by_borough.get(boro).map(|&count| BoroughCount {
                borough: boro.to_string(),
                count,
            })
        })
        .collect();
    if unknown > 0 {
        counts.push(BoroughCount {
            borough: UNKNOWN.to_string(),
            count: unknown,
        });
    }
    counts
}

/// Computes every summary at once.
#[must_use]
pub fn inspection_stats(restaurants: &[Restaurant], bucket_width: u32) -> InspectionStats {
    InspectionStats {
        restaurant_count: restaurants.len() as u64,
        inspection_count: restaurants.iter().map(|r| r.inspections.len() as u64).sum(),
        grades: grade_distribution(restaurants),
        scores: score_histogram(restaurants, bucket_width),
        boroughs: borough_counts(restaurants),
    }
}

#[cfg(test)]
mod tests {
    use inspection_map_inspection::group_restaurants;
    use inspection_map_inspection_models::RawInspectionRow;

    use super::*;

    fn restaurants() -> Vec<Restaurant> {
        let rows: Vec<RawInspectionRow> = serde_json::from_value(serde_json::json!([
            {"camis": "1", "boro": "Manhattan", "inspection_date": "2023-01-01T00:00:00.000", "grade": "A", "score": "9"},
            {"camis": "1", "boro": "Manhattan", "inspection_date": "2021-01-01T00:00:00.000", "grade": "C", "score": "40"},
            {"camis": "2", "boro": "Queens", "inspection_date": "2023-04-01T00:00:00.000", "score": "15"},
            {"camis": "2", "boro": "Queens", "inspection_date": "2022-04-01T00:00:00.000", "grade": "b", "score": "20"},
            {"camis": "3", "boro": "0", "inspection_date": "2023-05-01T00:00:00.000", "grade": "A", "score": "3"},
            {"camis": "4", "boro": "Manhattan"},
        ]))
        .unwrap();
        group_restaurants(&rows)
    }

    #[test]
    fn grades_use_latest_graded_inspection() {
        assert_eq!(
            grade_distribution(&restaurants()),
            vec![
                GradeCount {
                    grade: "A".to_string(),
                    count: 2
                },
                GradeCount {
                    grade: "B".to_string(),
                    count: 1
                },
                GradeCount {
                    grade: NOT_GRADED.to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn histogram_buckets_latest_scores() {
        let buckets = score_histogram(&restaurants(), 10);
        assert_eq!(
            buckets,
            vec![
                ScoreBucket {
                    min: 0,
                    max: 10,
                    count: 2
                },
                ScoreBucket {
                    min: 10,
                    max: 20,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn histogram_zero_width_is_one() {
        let buckets = score_histogram(&restaurants(), 0);
        assert_eq!(buckets.len(), 3);
        assert!(buckets.iter().all(|b| b.max - b.min == 1));
    }

    #[test]
    fn boroughs_in_enum_order_with_unknown_last() {
        let counts = borough_counts(&restaurants());
        let names: Vec<&str> = counts.iter().map(|c| c.borough.as_str()).collect();
        assert_eq!(names, vec!["Manhattan", "Queens", UNKNOWN]);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn stats_totals() {
        let stats = inspection_stats(&restaurants(), 10);
        assert_eq!(stats.restaurant_count, 4);
        assert_eq!(stats.inspection_count, 6);
    }
}
