//! Interpolating plan lookup.
//!
//! Evaluates a plan series at an arbitrary date by linear interpolation
//! between the surrounding points, weighted by elapsed days. Dates outside
//! the series range clamp to the nearest endpoint so charts draw a connected
//! line across the full axis.

use chrono::NaiveDate;

use crate::dates::day_number;
use crate::PlanPoint;

/// Plan value at `date`, or `None` for an empty series.
///
/// An exact date match returns the stored value untouched, with no
/// interpolation arithmetic applied.
pub fn plan_value_at(series: &[PlanPoint], date: NaiveDate) -> Option<f64> {
    if series.is_empty() {
        return None;
    }

    let mut pts: Vec<&PlanPoint> = series.iter().collect();
    pts.sort_by_key(|p| p.date);

    if date <= pts[0].date {
        return Some(pts[0].value);
    }
    let last = pts[pts.len() - 1];
    if date >= last.date {
        return Some(last.value);
    }

    // Find the bracketing pair: lo.date < date <= hi.date.
    let mut hi = 1;
    while hi < pts.len() && date > pts[hi].date {
        hi += 1;
    }
    let p0 = pts[hi - 1];
    let p1 = pts[hi];

    if date == p1.date {
        return Some(p1.value);
    }
    if p0.date == p1.date {
        return Some(p0.value);
    }

    let t0 = day_number(p0.date) as f64;
    let t1 = day_number(p1.date) as f64;
    let t = day_number(date) as f64;
    let r = (t - t0) / (t1 - t0);
    Some(p0.value + r * (p1.value - p0.value))
}
