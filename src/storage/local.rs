//! Embedded SQLite backend.
//!
//! The whole store lives in one database file on the client device. Schema
//! evolution is tracked through `PRAGMA user_version` and an ordered list of
//! `(from_version, step)` migrations, each applied exactly once inside its
//! own transaction the first time an older store is opened. A failed step
//! rolls back and aborts initialization rather than leaving a mixed-version
//! store.
//!
//! Blocking rusqlite work runs under `spawn_blocking` so trait methods never
//! stall the async runtime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tokio::task;

use crate::dates::{normalize_date_key, parse_date_key, DATE_FMT};
use crate::error::{GuardrailsError, Result};
use crate::storage::{
    validate_settings, ActualsSnapshot, ItemFilter, PlanSnapshot, Settings, StorageAdapter,
    UploadMeta,
};
use crate::{ActualEntry, PlanPoint, DEFAULT_SCENARIO};

/// Schema version this build writes and migrates up to.
const TARGET_VERSION: u32 = 3;

/// Key for the singleton settings row.
const SETTINGS_KEY: &str = "default";

/// Tables as of the current schema version. Fresh databases are created here
/// directly; older ones arrive via [`MIGRATIONS`].
const CURRENT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scenario_points (
    scenario TEXT NOT NULL,
    date TEXT NOT NULL,
    value REAL NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (scenario, date)
);

CREATE TABLE IF NOT EXISTS actuals (
    date TEXT PRIMARY KEY,
    value REAL NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    name TEXT PRIMARY KEY,
    lower_pct INTEGER NOT NULL,
    upper_pct INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS plan_uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    scenario TEXT,
    items_json TEXT NOT NULL,
    uploaded_at INTEGER NOT NULL
);
";

type MigrationStep = fn(&Transaction<'_>) -> Result<()>;

/// Ordered upgrade hooks: `(from_version, step)`. Opening a store at version
/// `n` applies every step with `from_version >= n`, in order.
const MIGRATIONS: &[(u32, MigrationStep)] = &[(1, migrate_v1_to_v2), (2, migrate_v2_to_v3)];

/// v1 kept plan points keyed by date alone, one implicit scenario. v2
/// re-keys them by (scenario, date) under the default scenario, preserving
/// the original update stamps. Rows processed oldest-first so that when two
/// legacy dates normalize to the same key, the most recently updated wins.
fn migrate_v1_to_v2(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS scenario_points (
            scenario TEXT NOT NULL,
            date TEXT NOT NULL,
            value REAL NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (scenario, date)
        );",
    )?;

    let mut stmt =
        tx.prepare("SELECT date, value, updated_at FROM plan_points ORDER BY updated_at ASC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (date, value, updated_at) in rows {
        let key = normalize_date_key(&date)?;
        tx.execute(
            "INSERT OR REPLACE INTO scenario_points (scenario, date, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![DEFAULT_SCENARIO, key, value, updated_at],
        )?;
    }
    Ok(())
}

/// v3 removes the legacy single-scenario table now that every point lives in
/// `scenario_points`.
fn migrate_v2_to_v3(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch("DROP TABLE IF EXISTS plan_points;")?;
    Ok(())
}

/// One-time cleanup for keys written with a time-of-day suffix by earlier
/// buggy builds. Rewrites each such key to its day-only form, most recent
/// update winning on collision, and removes the stale key. After this pass
/// every date key in the store is canonical.
fn normalize_legacy_date_keys(tx: &Transaction<'_>) -> Result<usize> {
    let mut fixed = 0;
    for (table, key_cols) in [("scenario_points", true), ("actuals", false)] {
        let select = if key_cols {
            "SELECT scenario, date, value, updated_at FROM scenario_points"
        } else {
            "SELECT '', date, value, updated_at FROM actuals"
        };
        let mut stmt = tx.prepare(select)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (scenario, date, value, updated_at) in rows {
            let key = match normalize_date_key(&date) {
                Ok(k) => k,
                Err(_) => {
                    warn!("leaving unparseable {} key untouched: {}", table, date);
                    continue;
                }
            };
            if key == date {
                continue;
            }

            let existing: Option<i64> = if key_cols {
                tx.query_row(
                    "SELECT updated_at FROM scenario_points WHERE scenario = ?1 AND date = ?2",
                    params![scenario, key],
                    |row| row.get(0),
                )
                .optional()?
            } else {
                tx.query_row(
                    "SELECT updated_at FROM actuals WHERE date = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?
            };

            if existing.map_or(true, |ts| ts <= updated_at) {
                if key_cols {
                    tx.execute(
                        "INSERT OR REPLACE INTO scenario_points (scenario, date, value, updated_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![scenario, key, value, updated_at],
                    )?;
                } else {
                    tx.execute(
                        "INSERT OR REPLACE INTO actuals (date, value, updated_at)
                         VALUES (?1, ?2, ?3)",
                        params![key, value, updated_at],
                    )?;
                }
            }
            if key_cols {
                tx.execute(
                    "DELETE FROM scenario_points WHERE scenario = ?1 AND date = ?2",
                    params![scenario, date],
                )?;
            } else {
                tx.execute("DELETE FROM actuals WHERE date = ?1", params![date])?;
            }
            fixed += 1;
        }
    }
    Ok(fixed)
}

pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Open (creating if needed) the store at `path`, applying any pending
    /// schema migrations and the date-key normalization pass.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = task::spawn_blocking(move || open_blocking(&path))
            .await
            .map_err(|e| GuardrailsError::Storage(e.to_string()))??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| GuardrailsError::Storage("connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| GuardrailsError::Storage(e.to_string()))?
    }
}

fn open_blocking(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version == 0 {
        let tx = conn.transaction()?;
        tx.execute_batch(CURRENT_SCHEMA)?;
        tx.pragma_update(None, "user_version", TARGET_VERSION)?;
        tx.commit()?;
        info!("created local store at {} (schema v{TARGET_VERSION})", path.display());
    } else {
        for (from, step) in MIGRATIONS {
            if *from < version {
                continue;
            }
            let next = from + 1;
            let tx = conn.transaction()?;
            step(&tx).map_err(|e| GuardrailsError::Migration {
                version: next,
                details: e.to_string(),
            })?;
            tx.pragma_update(None, "user_version", next)?;
            tx.commit().map_err(|e| GuardrailsError::Migration {
                version: next,
                details: e.to_string(),
            })?;
            info!("migrated local store schema v{from} -> v{next}");
        }
    }

    let tx = conn.transaction()?;
    let fixed = normalize_legacy_date_keys(&tx)?;
    tx.commit()?;
    if fixed > 0 {
        info!("normalized {fixed} legacy date key(s)");
    }

    Ok(conn)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn insert_scenario_series(
    tx: &Transaction<'_>,
    scenario: &str,
    series: &[PlanPoint],
    stamp: i64,
) -> Result<()> {
    tx.execute(
        "DELETE FROM scenario_points WHERE scenario = ?1",
        params![scenario],
    )?;
    for point in series {
        tx.execute(
            "INSERT OR REPLACE INTO scenario_points (scenario, date, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![scenario, date_key(point.date), point.value, stamp],
        )?;
    }
    Ok(())
}

fn insert_upload_row(tx: &Transaction<'_>, meta: &UploadMeta) -> Result<()> {
    if meta.filename.is_empty() {
        return Ok(());
    }
    let items_json = serde_json::to_string(&meta.items)?;
    tx.execute(
        "INSERT INTO plan_uploads (filename, scenario, items_json, uploaded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            meta.filename,
            meta.scenario,
            items_json,
            meta.uploaded_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

fn latest_upload(conn: &Connection) -> Result<Option<UploadMeta>> {
    let row = conn
        .query_row(
            "SELECT filename, scenario, items_json, uploaded_at
             FROM plan_uploads ORDER BY uploaded_at DESC, id DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((filename, scenario, items_json, uploaded_at)) => {
            let items: ItemFilter = serde_json::from_str(&items_json)?;
            Ok(Some(UploadMeta {
                filename,
                scenario,
                items,
                uploaded_at: millis_to_utc(uploaded_at).unwrap_or_else(Utc::now),
            }))
        }
        None => Ok(None),
    }
}

fn scenario_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT scenario FROM scenario_points ORDER BY scenario")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

#[async_trait::async_trait]
impl StorageAdapter for LocalStore {
    async fn get_plan(&self, scenario: Option<&str>) -> Result<PlanSnapshot> {
        let scenario = scenario.unwrap_or(DEFAULT_SCENARIO).to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date, value, updated_at FROM scenario_points
                 WHERE scenario = ?1 ORDER BY date ASC",
            )?;
            let rows = stmt
                .query_map(params![scenario], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            let mut series = Vec::with_capacity(rows.len());
            let mut latest: Option<i64> = None;
            for (date, value, updated_at) in rows {
                series.push(PlanPoint {
                    date: parse_date_key(&date)?,
                    value,
                });
                latest = Some(latest.map_or(updated_at, |l| l.max(updated_at)));
            }

            Ok(PlanSnapshot {
                series,
                last_updated: latest.and_then(millis_to_utc),
                meta: latest_upload(conn)?,
                scenarios: scenario_names(conn)?,
            })
        })
        .await
    }

    async fn save_plan(&self, series: &[PlanPoint], meta: Option<UploadMeta>) -> Result<()> {
        let series = series.to_vec();
        self.with_conn(move |conn| {
            let scenario = meta
                .as_ref()
                .and_then(|m| m.scenario.clone())
                .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());
            let tx = conn.transaction()?;
            insert_scenario_series(&tx, &scenario, &series, now_millis())?;
            if let Some(meta) = &meta {
                insert_upload_row(&tx, meta)?;
            }
            tx.commit()?;
            debug!("saved {} plan point(s) for scenario '{scenario}'", series.len());
            Ok(())
        })
        .await
    }

    async fn save_plans(
        &self,
        plans: &BTreeMap<String, Vec<PlanPoint>>,
        replace_all: bool,
        meta: Option<UploadMeta>,
    ) -> Result<()> {
        let plans = plans.clone();
        self.with_conn(move |conn| {
            let stamp = now_millis();
            let tx = conn.transaction()?;
            if replace_all {
                tx.execute("DELETE FROM scenario_points", [])?;
            }
            for (scenario, series) in &plans {
                insert_scenario_series(&tx, scenario, series, stamp)?;
            }
            if let Some(meta) = &meta {
                insert_upload_row(&tx, meta)?;
            }
            tx.commit()?;
            debug!("saved plan series for {} scenario(s)", plans.len());
            Ok(())
        })
        .await
    }

    async fn get_actuals(&self) -> Result<ActualsSnapshot> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT date, value, updated_at FROM actuals ORDER BY date ASC")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut actuals = Vec::with_capacity(rows.len());
            let mut latest: Option<i64> = None;
            for (date, value, updated_at) in rows {
                actuals.push(ActualEntry {
                    date: parse_date_key(&date)?,
                    value,
                });
                latest = Some(latest.map_or(updated_at, |l| l.max(updated_at)));
            }
            Ok(ActualsSnapshot {
                actuals,
                last_updated: latest.and_then(millis_to_utc),
            })
        })
        .await
    }

    async fn upsert_actual(&self, date: NaiveDate, value: f64) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO actuals (date, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET value = excluded.value,
                                                 updated_at = excluded.updated_at",
                params![date_key(date), value, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_actual(&self, date: NaiveDate, value: f64) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE actuals SET value = ?2, updated_at = ?3 WHERE date = ?1",
                params![date_key(date), value, now_millis()],
            )?;
            if changed == 0 {
                return Err(GuardrailsError::ActualNotFound(date));
            }
            Ok(())
        })
        .await
    }

    async fn delete_actual(&self, date: NaiveDate) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM actuals WHERE date = ?1", params![date_key(date)])?;
            Ok(())
        })
        .await
    }

    async fn get_settings(&self) -> Result<Settings> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT lower_pct, upper_pct FROM settings WHERE name = ?1",
                    params![SETTINGS_KEY],
                    |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
                )
                .optional()?;
            Ok(row.map_or_else(Settings::default, |(lower_pct, upper_pct)| Settings {
                lower_pct,
                upper_pct,
            }))
        })
        .await
    }

    async fn save_settings(&self, lower_pct: f64, upper_pct: f64) -> Result<()> {
        let settings = validate_settings(lower_pct, upper_pct)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (name, lower_pct, upper_pct, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    SETTINGS_KEY,
                    settings.lower_pct,
                    settings.upper_pct,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_scenarios(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| scenario_names(conn)).await
    }
}
