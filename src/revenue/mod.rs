//! Revenue normalization: outlier filtering, daily series, deployment
//! metrics, calendar bucketing and multi-source aggregation.
//!
//! Every function here is a pure transform over finite sequences. Money is
//! carried as [`Decimal`] and only rounded where a figure is reported.

pub mod aggregate;
pub mod buckets;
pub mod filter;
pub mod metrics;
pub mod series;

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::RevenueError;
use crate::revenue::buckets::MonthlyBucket;
use crate::revenue::filter::OutlierThresholds;
use crate::revenue::metrics::{DeploymentMetrics, RevenueWindows};
use crate::revenue::series::DailySeries;

pub use crate::revenue::aggregate::AggregateRevenue;

/// One timestamped revenue observation as delivered by a remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Epoch seconds.
    pub timestamp: i64,
    /// Revenue in USD-equivalent.
    pub value: Decimal,
}

impl RawPoint {
    pub fn new(timestamp: i64, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// The three headline revenue figures reported per deployment and per project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueTotals {
    /// Latest day.
    pub daily: Decimal,
    /// Trailing window of daily points, not a calendar month.
    pub monthly: Decimal,
    pub annualized: Decimal,
}

impl RevenueTotals {
    /// Element-wise sum, `None` if any figure leaves the `Decimal` range.
    pub fn checked_add(&self, other: &RevenueTotals) -> Option<Self> {
        Some(Self {
            daily: self.daily.checked_add(other.daily)?,
            monthly: self.monthly.checked_add(other.monthly)?,
            annualized: self.annualized.checked_add(other.annualized)?,
        })
    }

    pub fn rounded(&self) -> Self {
        Self {
            daily: round_half_up(self.daily, 2),
            monthly: round_half_up(self.monthly, 2),
            annualized: round_half_up(self.annualized, 2),
        }
    }
}

/// Everything one successfully processed source contributes to its project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRevenue {
    pub metrics: DeploymentMetrics,
    pub monthly_buckets: Vec<MonthlyBucket>,
}

impl SourceRevenue {
    /// Run one source's raw points through filter → daily series → metrics and buckets.
    ///
    /// Fails with [`RevenueError::NoUsableData`] when nothing survives filtering
    /// and with [`RevenueError::RevenueOverflow`] when the figures cannot be
    /// represented.
    pub fn from_raw(
        source_id: &str,
        tags: &BTreeMap<String, String>,
        raw: &[RawPoint],
        thresholds: &OutlierThresholds,
        windows: &RevenueWindows,
    ) -> Result<Self, RevenueError> {
        let filtered = filter::filter_outliers(source_id, raw, thresholds);
        let series = DailySeries::from_points(&filtered.points);

        let no_data = || RevenueError::NoUsableData {
            source_id: source_id.to_string(),
            raw_points: raw.len(),
        };

        if series.is_empty() {
            return Err(no_data());
        }

        let overflow = || {
            warn!(source = source_id, points = series.len(), "Revenue overflows Decimal range, rejecting source");
            RevenueError::RevenueOverflow {
                source_id: source_id.to_string(),
            }
        };
        let metrics = DeploymentMetrics::from_series(source_id, tags.clone(), &series, windows)
            .ok_or_else(overflow)?;
        let monthly_buckets = buckets::monthly_buckets(&series);

        Ok(Self {
            metrics,
            monthly_buckets,
        })
    }
}

/// Sum that yields `None` instead of panicking when the result leaves the
/// `Decimal` range.
pub fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// Round half away from zero for positives and half toward +∞ for negatives,
/// matching the conventional "round half up" used for reported figures.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    let strategy = if value.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    value.round_dp_with_strategy(dp, strategy)
}
