//! Guardrail classification: compares an actual value against a percentage
//! tolerance band around the interpolated plan value.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailStatus {
    Below,
    Within,
    Above,
}

impl fmt::Display for GuardrailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardrailStatus::Below => "Below guardrail",
            GuardrailStatus::Within => "Within guardrails",
            GuardrailStatus::Above => "Above guardrail",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailBand {
    pub status: GuardrailStatus,
    pub lower: f64,
    pub upper: f64,
}

/// Classify `actual` against the band `[plan * (1 - lower_pct/100),
/// plan * (1 + upper_pct/100)]`. Both boundaries are inclusive. Above the
/// band means surplus, which this domain treats as favorable.
pub fn classify(plan: f64, actual: f64, lower_pct: f64, upper_pct: f64) -> GuardrailBand {
    let lower = plan * (1.0 - lower_pct / 100.0);
    let upper = plan * (1.0 + upper_pct / 100.0);
    let status = if actual < lower {
        GuardrailStatus::Below
    } else if actual > upper {
        GuardrailStatus::Above
    } else {
        GuardrailStatus::Within
    };
    GuardrailBand {
        status,
        lower,
        upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_bounds() {
        let band = classify(100_000.0, 90_000.0, 10.0, 15.0);
        assert_eq!(band.lower, 90_000.0);
        assert_eq!(band.upper, 115_000.0);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(
            classify(100_000.0, 90_000.0, 10.0, 15.0).status,
            GuardrailStatus::Within
        );
        assert_eq!(
            classify(100_000.0, 115_000.0, 10.0, 15.0).status,
            GuardrailStatus::Within
        );
    }

    #[test]
    fn test_below_guardrail() {
        let band = classify(100_000.0, 89_999.0, 10.0, 15.0);
        assert_eq!(band.status, GuardrailStatus::Below);
        assert_eq!(band.status.to_string(), "Below guardrail");
    }

    #[test]
    fn test_above_guardrail() {
        let band = classify(100_000.0, 115_001.0, 10.0, 15.0);
        assert_eq!(band.status, GuardrailStatus::Above);
        assert_eq!(band.status.to_string(), "Above guardrail");
    }

    #[test]
    fn test_zero_widths_collapse_band_to_plan() {
        let band = classify(5000.0, 5000.0, 0.0, 0.0);
        assert_eq!(band.status, GuardrailStatus::Within);
        assert_eq!(band.lower, 5000.0);
        assert_eq!(band.upper, 5000.0);
    }
}
