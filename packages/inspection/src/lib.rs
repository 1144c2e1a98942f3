#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grouping engine for restaurant inspection rows.
//!
//! The upstream dataset repeats restaurant and inspection fields on every
//! violation row. [`group_restaurants`] folds that flat stream back into
//! [`Restaurant`] → [`Inspection`] → [`Violation`] in a single pass.
//!
//! Rows are matched to inspections through an index keyed by restaurant and
//! inspection date, so the pass is linear in the number of rows regardless of
//! how many inspections a restaurant has.

use std::cmp::Ordering;
use std::collections::HashMap;

use inspection_map_inspection_models::{
    Inspection, RawInspectionRow, Restaurant, Violation, is_sentinel_date,
};

/// Options for [`group_restaurants_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Keep the `1900-01-01` "not yet inspected" date as a real date.
    ///
    /// When `false` (the default) the sentinel is normalized to an absent
    /// date, so those inspections sort last and never land in a yearly
    /// bucket.
    pub include_sentinel: bool,
}

/// Groups rows into restaurants using the default [`GroupOptions`].
#[must_use]
pub fn group_restaurants(rows: &[RawInspectionRow]) -> Vec<Restaurant> {
    group_restaurants_with(rows, GroupOptions::default())
}

/// Groups rows into restaurants.
///
/// Restaurants are returned in first-seen order of `camis`. Identity fields
/// come from the first row for each `camis`. Inspection-level fields are
/// merged across rows sharing a date: the first non-null value wins. Each row
/// with a complete violation triple contributes one [`Violation`].
///
/// Rows without a `camis` are skipped. This function never fails.
#[must_use]
pub fn group_restaurants_with(rows: &[RawInspectionRow], options: GroupOptions) -> Vec<Restaurant> {
    let mut restaurants: Vec<Restaurant> = Vec::new();
    let mut restaurant_index: HashMap<String, usize> = HashMap::new();
    let mut inspection_index: HashMap<(usize, String), usize> = HashMap::new();
    let mut skipped = 0_usize;

    for row in rows {
        let Some(camis) = row.camis.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            skipped += 1;
            continue;
        };

        let r_idx = if let Some(&idx) = restaurant_index.get(camis) {
            idx
        } else {
            let Some(restaurant) = Restaurant::from_row(row) else {
                skipped += 1;
                continue;
            };
            restaurants.push(restaurant);
            restaurant_index.insert(camis.to_string(), restaurants.len() - 1);
            restaurants.len() - 1
        };

        let mut incoming = Inspection::from_row(row);
        let key = inspection_key(&incoming);
        if !options.include_sentinel {
            hide_sentinel_date(&mut incoming);
        }
        let inspections = &mut restaurants[r_idx].inspections;

        let existing = inspection_index.get(&(r_idx, key.clone())).copied();
        let i_idx = match existing {
            Some(idx) => {
                merge_inspection(&mut inspections[idx], incoming);
                idx
            }
            None => {
                inspections.push(incoming);
                inspection_index.insert((r_idx, key), inspections.len() - 1);
                inspections.len() - 1
            }
        };

        if let Some(violation) = Violation::from_row(row) {
            inspections[i_idx].violations.push(violation);
        }
    }

    for restaurant in &mut restaurants {
        restaurant.inspections.sort_by(newest_first);
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} of {} rows without a camis", rows.len());
    }
    log::debug!(
        "Grouped {} rows into {} restaurants",
        rows.len(),
        restaurants.len()
    );

    restaurants
}

/// Clears a `1900-01-01` inspection date. Only affects what is returned;
/// the identity key is taken from the raw date beforehand.
fn hide_sentinel_date(inspection: &mut Inspection) {
    if inspection
        .inspection_date
        .as_deref()
        .is_some_and(is_sentinel_date)
    {
        inspection.inspection_date = None;
    }
}

/// Date component of the inspection identity: inspection date (sentinel
/// included), then grade date, then empty.
fn inspection_key(inspection: &Inspection) -> String {
    inspection
        .inspection_date
        .as_deref()
        .or(inspection.grade_date.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Fills `target` only where it is currently unset.
fn coalesce<T>(target: &mut Option<T>, incoming: Option<T>) {
    if target.is_none() {
        *target = incoming;
    }
}

fn merge_inspection(existing: &mut Inspection, incoming: Inspection) {
    coalesce(&mut existing.inspection_date, incoming.inspection_date);
    coalesce(&mut existing.action, incoming.action);
    coalesce(&mut existing.critical_flag, incoming.critical_flag);
    coalesce(&mut existing.score, incoming.score);
    coalesce(&mut existing.grade, incoming.grade);
    coalesce(&mut existing.grade_date, incoming.grade_date);
    coalesce(&mut existing.inspection_type, incoming.inspection_type);
}

/// Descending by date; undated inspections last. Dates are fixed-width ISO
/// strings so lexicographic order is chronological.
fn newest_first(a: &Inspection, b: &Inspection) -> Ordering {
    match (a.inspection_date.as_deref(), b.inspection_date.as_deref()) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
