//! Magnitude score: log-scaled revenue size relative to a benchmark.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::revenue::buckets::MonthlyBucket;
use crate::revenue::round_half_up;

/// Ceiling applied when a project is compared against its own average.
pub const SELF_COMPARISON_CAP: u32 = 95;
pub const MAGNITUDE_CEILING: u32 = 100;

/// Mean monthly revenue across calendar-month buckets, rounded to cents.
pub fn average_monthly_revenue(buckets: &[MonthlyBucket]) -> Decimal {
    if buckets.is_empty() {
        return Decimal::ZERO;
    }
    let total = buckets
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc.saturating_add(b.revenue));
    round_half_up(total / Decimal::from(buckets.len() as u64), 2)
}

pub fn magnitude_score(avg_monthly_revenue: Decimal, benchmark: Decimal) -> u32 {
    if benchmark <= Decimal::ZERO {
        warn!(
            component = "magnitude",
            benchmark = %benchmark,
            "Degenerate benchmark, magnitude score set to 0"
        );
        return 0;
    }

    let avg = avg_monthly_revenue.to_f64().unwrap_or(0.0).max(0.0);
    let bench = benchmark.to_f64().unwrap_or(0.0);
    let raw = 100.0 * (avg + 1.0).ln() / (bench + 1.0).ln();
    let rounded = (raw + 0.5).floor();

    let score = if avg_monthly_revenue == benchmark {
        rounded.min(SELF_COMPARISON_CAP as f64)
    } else {
        rounded
    };
    let score = score.clamp(0.0, MAGNITUDE_CEILING as f64) as u32;

    debug!(
        component = "magnitude",
        avg_monthly_revenue = %avg_monthly_revenue,
        benchmark = %benchmark,
        raw,
        score,
        "Magnitude score computed"
    );

    score
}
