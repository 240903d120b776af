//! # Savings Guardrails
//!
//! Tracks a financial plan (a time series of target values) against recorded
//! actuals and flags deviations outside percentage tolerance bands
//! ("guardrails"). Plan series are built from imported spreadsheet-like rows
//! under multiple scenario assumptions and persisted through a uniform
//! storage contract with two interchangeable backends: an embedded SQLite
//! store and a thin client over a hosted HTTP API.
//!
//! ## Core Concepts
//!
//! - **Plan point**: one (date, target value) sample of a savings trajectory
//! - **Actual entry**: a recorded real-world value for a date, compared
//!   against the interpolated plan
//! - **Scenario**: a named plan variant (e.g. Pessimistic/Average/Optimistic),
//!   each with its own independent series
//! - **Guardrail**: a percentage band around the interpolated plan value;
//!   actuals outside it are flagged (above the band is a surplus, which is
//!   favorable)
//!
//! ## Example
//!
//! ```rust,ignore
//! use savings_guardrails::*;
//! use chrono::NaiveDate;
//!
//! let set = build_plan_set(&rows, &BuildOptions::default())?;
//!
//! let config = StorageConfig::from_env();
//! let store = storage::factory::connect(&config).await?;
//! store.save_plans(&set, true, None).await?;
//!
//! let snapshot = store.get_plan(None).await?;
//! let today = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
//! if let Some(plan) = plan_value_at(&snapshot.series, today) {
//!     let settings = store.get_settings().await?;
//!     let band = classify(plan, actual, settings.lower_pct as f64, settings.upper_pct as f64);
//!     println!("{}", band.status);
//! }
//! ```

pub mod currency;
pub mod dates;
pub mod error;
pub mod guardrail;
pub mod interpolate;
pub mod plan_builder;
pub mod storage;

pub use currency::{parse_currency_cell, parse_currency_checked, parse_currency_str};
pub use dates::{iso_today, normalize_date_key, parse_date_key};
pub use error::{GuardrailsError, Result};
pub use guardrail::{classify, GuardrailBand, GuardrailStatus};
pub use interpolate::plan_value_at;
pub use plan_builder::{build_plan_series, build_plan_set, BuildOptions, Row};
pub use storage::factory::{connect, StorageConfig};
pub use storage::{
    ActualsSnapshot, ItemFilter, PlanSnapshot, Settings, StorageAdapter, UploadMeta,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scenario rows without an explicit assumption label fall into this series.
pub const DEFAULT_SCENARIO: &str = "Average";

/// One (date, target value) sample of a plan trajectory. Dates are
/// day-precision and serialize as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One recorded real-world value, at most one per calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualEntry {
    pub date: NaiveDate,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_point_serializes_day_precision_dates() {
        let point = PlanPoint {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            value: 1500.0,
        };
        assert_eq!(
            serde_json::to_value(point).unwrap(),
            json!({"date": "2025-01-01", "value": 1500.0})
        );
    }

    #[test]
    fn test_build_then_interpolate_then_classify() {
        let mut row = serde_json::Map::new();
        row.insert("Category".into(), json!("Accounts"));
        row.insert("Item".into(), json!("401k"));
        row.insert("Assumptions".into(), json!("Average"));
        row.insert("2025".into(), json!("$100,000"));
        row.insert("2027".into(), json!("$300,000"));

        let set = build_plan_set(&[row], &BuildOptions::default()).unwrap();
        let series = &set[DEFAULT_SCENARIO];

        // Jan 1 2026 is 365 of 730 days in: the exact midpoint.
        let mid = plan_value_at(series, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).unwrap();
        assert_eq!(mid, 200_000.0);

        let band = classify(mid, mid * 0.85, 10.0, 15.0);
        assert_eq!(band.status, GuardrailStatus::Below);
    }
}
