//! Persistence contract shared by every backend.
//!
//! Two interchangeable adapters implement [`StorageAdapter`]: an embedded
//! SQLite store ([`local::LocalStore`]) and a thin client over a hosted HTTP
//! API ([`remote::RemoteStore`]). Callers pick one via
//! [`factory::StorageConfig`] at startup and use the trait identically
//! afterwards.

pub mod factory;
pub mod local;
pub mod remote;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GuardrailsError, Result};
use crate::{ActualEntry, PlanPoint};

pub const DEFAULT_LOWER_PCT: u32 = 10;
pub const DEFAULT_UPPER_PCT: u32 = 15;

/// Guardrail band widths, percentages below/above the plan value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub lower_pct: u32,
    pub upper_pct: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lower_pct: DEFAULT_LOWER_PCT,
            upper_pct: DEFAULT_UPPER_PCT,
        }
    }
}

/// Which line items the last import aggregated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Record of the most recent plan import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    pub filename: String,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub items: ItemFilter,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanSnapshot {
    pub series: Vec<PlanPoint>,
    pub last_updated: Option<DateTime<Utc>>,
    pub meta: Option<UploadMeta>,
    pub scenarios: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActualsSnapshot {
    pub actuals: Vec<ActualEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Uniform persistence contract.
///
/// Semantics every implementation must honor:
/// - whole-scenario plan writes are atomic: all points land or none do;
/// - `upsert_actual` creates or overwrites, `update_actual` fails with
///   [`GuardrailsError::ActualNotFound`] when the date has no record, and
///   `delete_actual` is idempotent;
/// - at most one actual per calendar date, keyed by normalized `YYYY-MM-DD`;
/// - settings are validated non-negative and rounded to whole percentages
///   before persistence, defaulting to 10/15 when unset.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Plan series for one scenario (default scenario when `None`), with the
    /// latest upload meta and the full scenario list.
    async fn get_plan(&self, scenario: Option<&str>) -> Result<PlanSnapshot>;

    /// Replace the stored series for `meta`'s scenario (default scenario when
    /// absent) and append an upload record when `meta` carries a filename.
    async fn save_plan(&self, series: &[PlanPoint], meta: Option<UploadMeta>) -> Result<()>;

    /// Replace plan series for many scenarios in one atomic write. With
    /// `replace_all`, scenarios missing from `plans` are removed too.
    async fn save_plans(
        &self,
        plans: &BTreeMap<String, Vec<PlanPoint>>,
        replace_all: bool,
        meta: Option<UploadMeta>,
    ) -> Result<()>;

    async fn get_actuals(&self) -> Result<ActualsSnapshot>;

    /// Create or overwrite the actual for `date`.
    async fn upsert_actual(&self, date: NaiveDate, value: f64) -> Result<()>;

    /// Overwrite an existing actual; `ActualNotFound` when absent.
    async fn update_actual(&self, date: NaiveDate, value: f64) -> Result<()>;

    /// Remove the actual for `date`; deleting a missing date is not an error.
    async fn delete_actual(&self, date: NaiveDate) -> Result<()>;

    async fn get_settings(&self) -> Result<Settings>;

    async fn save_settings(&self, lower_pct: f64, upper_pct: f64) -> Result<()>;

    /// Names of every scenario with at least one stored plan point.
    async fn get_scenarios(&self) -> Result<Vec<String>>;
}

/// Validate and round guardrail percentages ahead of any write, so both
/// backends reject bad input before touching storage or the network.
pub(crate) fn validate_settings(lower_pct: f64, upper_pct: f64) -> Result<Settings> {
    for pct in [lower_pct, upper_pct] {
        if !pct.is_finite() || pct < 0.0 {
            return Err(GuardrailsError::InvalidPercentage(pct));
        }
    }
    Ok(Settings {
        lower_pct: lower_pct.round() as u32,
        upper_pct: upper_pct.round() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_band() {
        let s = Settings::default();
        assert_eq!(s.lower_pct, 10);
        assert_eq!(s.upper_pct, 15);
    }

    #[test]
    fn test_validate_settings_rounds_to_whole_percent() {
        let s = validate_settings(9.6, 14.2).unwrap();
        assert_eq!(s.lower_pct, 10);
        assert_eq!(s.upper_pct, 14);
    }

    #[test]
    fn test_validate_settings_rejects_negative_and_non_finite() {
        assert!(validate_settings(-1.0, 15.0).is_err());
        assert!(validate_settings(10.0, f64::NAN).is_err());
        assert!(validate_settings(f64::INFINITY, 15.0).is_err());
        assert!(validate_settings(0.0, 0.0).is_ok());
    }
}
