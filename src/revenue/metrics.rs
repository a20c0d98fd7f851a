//! Per-deployment headline figures.
//!
//! `monthly` here is a trailing window of daily points. It is deliberately a
//! different quantity from the calendar-month buckets in
//! [`crate::revenue::buckets`]; the two are reported side by side and must not
//! be conflated.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::revenue::series::DailySeries;
use crate::revenue::{checked_sum, round_half_up, RevenueTotals};

/// Window sizes, in daily points, for the trailing "monthly" figure and for annualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueWindows {
    pub trailing_days: usize,
    pub annualization_days: usize,
}

impl Default for RevenueWindows {
    fn default() -> Self {
        Self {
            trailing_days: 30,
            annualization_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentMetrics {
    pub source_id: String,
    /// Dimension tags such as `version` and `chain`.
    pub tags: BTreeMap<String, String>,
    /// Most recent day's revenue.
    pub daily: Decimal,
    /// Sum of the trailing window of daily points.
    pub monthly: Decimal,
    pub annualized: Decimal,
    pub point_count: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DeploymentMetrics {
    /// Derive metrics from a daily series. Returns `None` for an empty series
    /// or when a figure does not fit in a `Decimal`.
    ///
    /// ```text
    /// daily      = last point
    /// monthly    = sum(last min(trailing_days, len) points)
    /// annualized = sum(all)                          if len >= annualization_days
    ///            = sum(all) / len * annualization_days  otherwise
    /// ```
    /// Values are rounded to cents only after computation.
    pub fn from_series(
        source_id: &str,
        tags: BTreeMap<String, String>,
        series: &DailySeries,
        windows: &RevenueWindows,
    ) -> Option<Self> {
        let first = series.first()?;
        let last = series.last()?;
        let points = series.points();
        let count = points.len();

        let trailing_start = count - windows.trailing_days.min(count);
        let monthly = checked_sum(points[trailing_start..].iter().map(|p| p.revenue))?;

        let total = series.checked_total()?;
        let annualized = if count >= windows.annualization_days {
            total
        } else {
            total
                .checked_div(Decimal::from(count as u64))?
                .checked_mul(Decimal::from(windows.annualization_days as u64))?
        };

        Some(Self {
            source_id: source_id.to_string(),
            tags,
            daily: round_half_up(last.revenue, 2),
            monthly: round_half_up(monthly, 2),
            annualized: round_half_up(annualized, 2),
            point_count: count,
            start_date: first.date,
            end_date: last.date,
        })
    }

    pub fn totals(&self) -> RevenueTotals {
        RevenueTotals {
            daily: self.daily,
            monthly: self.monthly,
            annualized: self.annualized,
        }
    }

    pub fn tag(&self, dimension: &str) -> Option<&str> {
        self.tags.get(dimension).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revenue::series::DailyPoint;
    use rust_decimal_macros::dec;

    fn series_of(values: &[Decimal]) -> DailySeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyPoint {
                date: start + chrono::Duration::days(i as i64),
                revenue: *v,
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_empty_series_has_no_metrics() {
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &DailySeries::default(),
            &RevenueWindows::default(),
        );
        assert!(m.is_none());
    }

    #[test]
    fn test_short_history_extrapolates() {
        let series = series_of(&[dec!(10), dec!(20), dec!(30)]);
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series,
            &RevenueWindows::default(),
        )
        .unwrap();

        assert_eq!(m.daily, dec!(30));
        assert_eq!(m.monthly, dec!(60));
        // 60 / 3 * 365
        assert_eq!(m.annualized, dec!(7300));
        assert_eq!(m.point_count, 3);
        assert_eq!(m.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(m.end_date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_monthly_is_trailing_window() {
        let values: Vec<Decimal> = (1..=40).map(Decimal::from).collect();
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series_of(&values),
            &RevenueWindows::default(),
        )
        .unwrap();
        // 11 + 12 + ... + 40
        assert_eq!(m.monthly, dec!(765));
        assert_eq!(m.daily, dec!(40));
    }

    #[test]
    fn test_full_year_sums_everything() {
        let values = vec![dec!(1); 400];
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series_of(&values),
            &RevenueWindows::default(),
        )
        .unwrap();
        assert_eq!(m.annualized, dec!(400));
    }

    #[test]
    fn test_exactly_one_year_is_plain_sum() {
        // 122×1 + 122×2 + 121×3
        let values: Vec<Decimal> = (0..365).map(|i| Decimal::from(i % 3 + 1)).collect();
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series_of(&values),
            &RevenueWindows::default(),
        )
        .unwrap();
        assert_eq!(m.point_count, 365);
        assert_eq!(m.annualized, dec!(729));
    }

    #[test]
    fn test_one_day_short_of_a_year_extrapolates() {
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series_of(&vec![dec!(2); 364]),
            &RevenueWindows::default(),
        )
        .unwrap();
        // 728 / 364 * 365
        assert_eq!(m.annualized, dec!(730));
    }

    #[test]
    fn test_unrepresentable_annualization_has_no_metrics() {
        let series = series_of(&[dec!(50000000000000000000000000000)]);
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series,
            &RevenueWindows::default(),
        );
        assert!(m.is_none());
    }

    #[test]
    fn test_rounding_happens_at_output() {
        let series = series_of(&[dec!(0.004), dec!(0.004), dec!(0.004)]);
        let m = DeploymentMetrics::from_series(
            "s",
            BTreeMap::new(),
            &series,
            &RevenueWindows::default(),
        )
        .unwrap();
        // Each point rounds to 0.00 on its own, but the sum 0.012 rounds to 0.01.
        assert_eq!(m.daily, dec!(0.00));
        assert_eq!(m.monthly, dec!(0.01));
        assert_eq!(m.annualized, dec!(1.46));
    }

    #[test]
    fn test_custom_windows() {
        let windows = RevenueWindows {
            trailing_days: 2,
            annualization_days: 3,
        };
        let series = series_of(&[dec!(1), dec!(2), dec!(3), dec!(4)]);
        let m = DeploymentMetrics::from_series("s", BTreeMap::new(), &series, &windows).unwrap();
        assert_eq!(m.monthly, dec!(7));
        assert_eq!(m.annualized, dec!(10));
    }
}
