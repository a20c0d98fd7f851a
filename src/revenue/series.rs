//! Canonical per-source daily series.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::revenue::RawPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoint {
    /// UTC calendar date.
    pub date: NaiveDate,
    pub revenue: Decimal,
}

/// Filtered points collapsed to one value per UTC date, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DailySeries(Vec<DailyPoint>);

impl DailySeries {
    /// Sort by timestamp and keep one point per date. When two points fall on
    /// the same date the later timestamp wins, so re-fetched snapshots replace
    /// earlier ones.
    pub fn from_points(points: &[RawPoint]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.timestamp);

        let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for point in sorted {
            let Some(datetime) = DateTime::from_timestamp(point.timestamp, 0) else {
                warn!(timestamp = point.timestamp, "Dropping point with out-of-range timestamp");
                continue;
            };
            by_date.insert(datetime.date_naive(), point.value);
        }

        Self(
            by_date
                .into_iter()
                .map(|(date, revenue)| DailyPoint { date, revenue })
                .collect(),
        )
    }

    pub fn points(&self) -> &[DailyPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&DailyPoint> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&DailyPoint> {
        self.0.last()
    }

    /// Sum of every daily value, `None` if it leaves the `Decimal` range.
    pub fn checked_total(&self) -> Option<Decimal> {
        crate::revenue::checked_sum(self.0.iter().map(|p| p.revenue))
    }
}

impl From<Vec<DailyPoint>> for DailySeries {
    fn from(points: Vec<DailyPoint>) -> Self {
        let by_date: BTreeMap<NaiveDate, Decimal> =
            points.into_iter().map(|p| (p.date, p.revenue)).collect();
        Self(
            by_date
                .into_iter()
                .map(|(date, revenue)| DailyPoint { date, revenue })
                .collect(),
        )
    }
}
