//! Calendar-month and calendar-quarter revenue buckets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::revenue::series::DailySeries;

/// A UTC calendar month, rendered and sorted as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn quarter(&self) -> QuarterKey {
        QuarterKey {
            year: self.year,
            quarter: self.month.div_ceil(3),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("Expected YYYY-MM, got '{s}'"))?;
        let year: i32 = year.parse().with_context(|| format!("Invalid year in '{s}'"))?;
        let month: u32 = month.parse().with_context(|| format!("Invalid month in '{s}'"))?;
        Self::new(year, month).ok_or_else(|| anyhow!("Month out of range in '{s}'"))
    }
}

/// A calendar quarter, rendered and sorted as `YYYY-Qn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuarterKey {
    year: i32,
    quarter: u32,
}

impl QuarterKey {
    pub fn new(year: i32, quarter: u32) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u32 {
        self.quarter
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-Q{}", self.year, self.quarter)
    }
}

impl FromStr for QuarterKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, quarter) = s
            .split_once("-Q")
            .ok_or_else(|| anyhow!("Expected YYYY-Qn, got '{s}'"))?;
        let year: i32 = year.parse().with_context(|| format!("Invalid year in '{s}'"))?;
        let quarter: u32 = quarter
            .parse()
            .with_context(|| format!("Invalid quarter in '{s}'"))?;
        Self::new(year, quarter).ok_or_else(|| anyhow!("Quarter out of range in '{s}'"))
    }
}

macro_rules! string_serde {
    ($key:ty) => {
        impl Serialize for $key {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $key {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(MonthKey);
string_serde!(QuarterKey);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub month: MonthKey,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterBucket {
    pub quarter: QuarterKey,
    pub revenue: Decimal,
    /// Quarter-over-quarter growth in percent. Unset for the first quarter and
    /// after a quarter with no revenue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<Decimal>,
}

/// Bucket sums saturate at the `Decimal` bounds rather than panic.
fn accumulate(slot: &mut Decimal, value: Decimal) {
    *slot = slot.saturating_add(value);
}

/// Sum daily points into calendar months. Empty months are not emitted.
pub fn monthly_buckets(series: &DailySeries) -> Vec<MonthlyBucket> {
    let mut months: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for point in series.points() {
        let key = MonthKey {
            year: point.date.year(),
            month: point.date.month(),
        };
        accumulate(months.entry(key).or_default(), point.revenue);
    }

    months
        .into_iter()
        .map(|(month, revenue)| MonthlyBucket { month, revenue })
        .collect()
}

/// Fold monthly buckets into calendar quarters, sorted chronologically.
/// Growth is left unset; see [`crate::scoring::growth`].
pub fn quarterly_buckets(months: &[MonthlyBucket]) -> Vec<QuarterBucket> {
    let mut quarters: BTreeMap<QuarterKey, Decimal> = BTreeMap::new();
    for bucket in months {
        accumulate(quarters.entry(bucket.month.quarter()).or_default(), bucket.revenue);
    }

    quarters
        .into_iter()
        .map(|(quarter, revenue)| QuarterBucket {
            quarter,
            revenue,
            growth: None,
        })
        .collect()
}

/// Merge bucket sequences from several sources, summing revenue per month.
pub fn merge_monthly<'a, I>(sequences: I) -> Vec<MonthlyBucket>
where
    I: IntoIterator<Item = &'a [MonthlyBucket]>,
{
    let mut months: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for sequence in sequences {
        for bucket in sequence {
            accumulate(months.entry(bucket.month).or_default(), bucket.revenue);
        }
    }

    months
        .into_iter()
        .map(|(month, revenue)| MonthlyBucket { month, revenue })
        .collect()
}
