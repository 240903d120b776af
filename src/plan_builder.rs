//! Builds scenario plan series from imported tabular rows.
//!
//! The importer hands us a sequence of rows with named fields: a category, an
//! item name, a scenario/assumption label, and one column per projection year
//! ("2025", "[2026] age=60", ...). Rows in the "Accounts" category are grouped
//! by scenario, filtered by item, and summed per year column; each yearly sum
//! becomes the plan value for January 1 of that year.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use serde_json::{Map, Value};

use crate::currency::parse_currency_cell;
use crate::error::{GuardrailsError, Result};
use crate::{PlanPoint, DEFAULT_SCENARIO};

/// One imported spreadsheet row: field name mapped to a string or numeric cell.
pub type Row = Map<String, Value>;

pub const CATEGORY_FIELD: &str = "Category";
pub const ITEM_FIELD: &str = "Item";
pub const SCENARIO_FIELD: &str = "Assumptions";
const ACCOUNTS_CATEGORY: &str = "accounts";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// When set, [`build_plan_series`] returns this scenario's series alone.
    pub selected_scenario: Option<String>,
    /// Item names to keep. Empty means keep everything not excluded.
    pub include_items: Vec<String>,
    /// Item names to drop. Exclusion wins over inclusion.
    pub exclude_items: Vec<String>,
}

/// Case-insensitive field lookup; exports disagree on header casing
/// ("Assumptions" vs "assumptions").
fn get_field<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn field_text(row: &Row, key: &str) -> Option<String> {
    match get_field(row, key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Columns carrying a 4-digit year token anywhere in the name, ascending by
/// year, gathered across all of a scenario's rows. Extra descriptive text
/// around the token is tolerated ("[2025] age=59").
fn extract_year_columns(rows: &[&Row], year_re: &Regex) -> Vec<(i32, String)> {
    let mut cols: Vec<(i32, String)> = rows
        .iter()
        .flat_map(|row| row.keys())
        .filter_map(|key| {
            let m = year_re.captures(key)?;
            let year: i32 = m[1].parse().ok()?;
            Some((year, key.clone()))
        })
        .collect();
    cols.sort();
    cols.dedup();
    cols
}

fn lowered_set(items: &[String]) -> HashSet<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// Build a plan series per scenario present in the rows.
///
/// Fails with [`GuardrailsError::NoRowsProduced`] when filtering leaves every
/// scenario empty, so callers never silently persist an empty plan.
pub fn build_plan_set(
    rows: &[Row],
    opts: &BuildOptions,
) -> Result<BTreeMap<String, Vec<PlanPoint>>> {
    let include = lowered_set(&opts.include_items);
    let exclude = lowered_set(&opts.exclude_items);
    let year_re = Regex::new(r"(\d{4})").expect("valid year pattern");

    let mut by_scenario: BTreeMap<String, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        let category = match field_text(row, CATEGORY_FIELD) {
            Some(c) => c,
            None => continue,
        };
        if !category.eq_ignore_ascii_case(ACCOUNTS_CATEGORY) {
            continue;
        }

        let item = match field_text(row, ITEM_FIELD) {
            Some(i) if !i.is_empty() => i,
            _ => continue,
        };
        let item_low = item.to_lowercase();
        if exclude.contains(&item_low) {
            continue;
        }
        if !include.is_empty() && !include.contains(&item_low) {
            continue;
        }

        let scenario = field_text(row, SCENARIO_FIELD)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());
        by_scenario.entry(scenario).or_default().push(row);
    }

    let mut result = BTreeMap::new();
    for (scenario, scenario_rows) in by_scenario {
        let year_cols = extract_year_columns(&scenario_rows, &year_re);

        // Later columns naming the same year overwrite earlier ones, keeping
        // dates unique within the series.
        let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
        for (year, key) in &year_cols {
            let sum: f64 = scenario_rows
                .iter()
                .filter_map(|r| r.get(key))
                .map(parse_currency_cell)
                .sum();
            totals.insert(*year, sum);
        }

        let series: Vec<PlanPoint> = totals
            .into_iter()
            .filter_map(|(year, value)| {
                NaiveDate::from_ymd_opt(year, 1, 1).map(|date| PlanPoint { date, value })
            })
            .collect();
        if !series.is_empty() {
            debug!(
                "built scenario '{}': {} points from {} rows",
                scenario,
                series.len(),
                scenario_rows.len()
            );
            result.insert(scenario, series);
        }
    }

    if result.is_empty() {
        return Err(GuardrailsError::NoRowsProduced);
    }
    Ok(result)
}

/// Build a single series: the selected scenario when
/// [`BuildOptions::selected_scenario`] is set, the default scenario
/// otherwise. A missing scenario counts as no rows produced.
pub fn build_plan_series(rows: &[Row], opts: &BuildOptions) -> Result<Vec<PlanPoint>> {
    let mut set = build_plan_set(rows, opts)?;
    let wanted = opts
        .selected_scenario
        .as_deref()
        .unwrap_or(DEFAULT_SCENARIO);
    set.remove(wanted).ok_or(GuardrailsError::NoRowsProduced)
}
