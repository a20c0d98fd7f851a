//! Outlier filtering of raw revenue points.
//!
//! Lending snapshots occasionally report absurd daily revenue (oracle glitches,
//! mis-scaled tokens), and every source reports zero-revenue days. Both are
//! dropped here before anything is summed.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::revenue::RawPoint;

/// Exclusive bounds a raw value must fall within to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierThresholds {
    pub min_valid: Decimal,
    /// `None` disables the upper cap.
    pub max_valid: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// At or below `min_valid`.
    NonPositive,
    /// At or above `max_valid`.
    Anomalous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub point: RawPoint,
    pub reason: RejectReason,
}

/// Result of filtering one source's raw points.
#[derive(Debug, Clone, Default)]
pub struct FilteredPoints {
    pub points: Vec<RawPoint>,
    pub rejections: Vec<Rejection>,
}

impl FilteredPoints {
    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejections.iter().filter(|r| r.reason == reason).count()
    }
}

impl OutlierThresholds {
    pub fn check(&self, value: Decimal) -> Option<RejectReason> {
        if value <= self.min_valid {
            return Some(RejectReason::NonPositive);
        }
        match self.max_valid {
            Some(max) if value >= max => Some(RejectReason::Anomalous),
            _ => None,
        }
    }
}

/// Keep only points strictly inside the thresholds. Input order is preserved.
pub fn filter_outliers(
    source_id: &str,
    raw: &[RawPoint],
    thresholds: &OutlierThresholds,
) -> FilteredPoints {
    let mut out = FilteredPoints {
        points: Vec::with_capacity(raw.len()),
        rejections: Vec::new(),
    };

    for point in raw {
        match thresholds.check(point.value) {
            None => out.points.push(*point),
            Some(reason) => {
                if reason == RejectReason::Anomalous {
                    debug!(
                        source = source_id,
                        timestamp = point.timestamp,
                        value = %point.value,
                        "Skipping anomalous revenue value"
                    );
                }
                out.rejections.push(Rejection {
                    point: *point,
                    reason,
                });
            }
        }
    }

    if !out.rejections.is_empty() {
        info!(
            source = source_id,
            kept = out.points.len(),
            non_positive = out.rejected_count(RejectReason::NonPositive),
            anomalous = out.rejected_count(RejectReason::Anomalous),
            "Filtered raw revenue points"
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lending() -> OutlierThresholds {
        OutlierThresholds {
            min_valid: Decimal::ZERO,
            max_valid: Some(dec!(10000000)),
        }
    }

    #[test]
    fn test_keeps_values_inside_bounds() {
        let raw = vec![RawPoint::new(1, dec!(0.01)), RawPoint::new(2, dec!(9999999.99))];
        let out = filter_outliers("s", &raw, &lending());
        assert_eq!(out.points, raw);
        assert!(out.rejections.is_empty());
    }

    #[test]
    fn test_rejects_zero_negative_and_anomalous() {
        let raw = vec![
            RawPoint::new(1, dec!(0)),
            RawPoint::new(2, dec!(-12.5)),
            RawPoint::new(3, dec!(10000000)),
            RawPoint::new(4, dec!(250)),
            RawPoint::new(5, dec!(3000000000000)),
        ];
        let out = filter_outliers("s", &raw, &lending());

        assert_eq!(out.points, vec![RawPoint::new(4, dec!(250))]);
        assert_eq!(out.rejected_count(RejectReason::NonPositive), 2);
        assert_eq!(out.rejected_count(RejectReason::Anomalous), 2);
    }

    #[test]
    fn test_uncapped_only_requires_positive() {
        let dex = OutlierThresholds {
            min_valid: Decimal::ZERO,
            max_valid: None,
        };
        let raw = vec![RawPoint::new(1, dec!(0)), RawPoint::new(2, dec!(50000000000))];
        let out = filter_outliers("s", &raw, &dex);
        assert_eq!(out.points.len(), 1);
        assert_eq!(out.points[0].value, dec!(50000000000));
    }

    #[test]
    fn test_empty_input() {
        let out = filter_outliers("s", &[], &lending());
        assert!(out.points.is_empty());
        assert!(out.rejections.is_empty());
    }
}
