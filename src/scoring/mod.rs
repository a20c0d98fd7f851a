//! Earnings Quality Score (EQS).
//!
//! Combines a stability score (how steadily quarterly revenue grows) with a
//! magnitude score (how much revenue there is relative to a benchmark):
//! `eqs = round(stability × magnitude / 100)`.

pub mod explain;
pub mod growth;
pub mod magnitude;
pub mod stability;

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::info;

use crate::revenue::buckets::{self, MonthlyBucket, QuarterBucket};

/// Quarters needed before a collapsing final quarter is treated as partial.
const PARTIAL_QUARTER_MIN_QUARTERS: usize = 5;
/// Growth below this (percent) on the final quarter marks it as partial.
const PARTIAL_QUARTER_GROWTH: Decimal = dec!(-80);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityCategory {
    High,
    Moderate,
    Low,
}

impl QualityCategory {
    /// Thresholds for the stability and magnitude components.
    pub fn from_component_score(score: u32) -> Self {
        match score {
            80.. => Self::High,
            50..=79 => Self::Moderate,
            _ => Self::Low,
        }
    }

    /// Thresholds for the combined score.
    pub fn from_eqs_score(score: u32) -> Self {
        match score {
            70.. => Self::High,
            40..=69 => Self::Moderate,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub stability: String,
    pub magnitude: String,
    pub overall: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqsDetails {
    /// Every calendar quarter with its growth, including a trailing partial one.
    pub quarters: Vec<QuarterBucket>,
    pub penalties: Vec<Decimal>,
    pub avg_monthly_revenue: Decimal,
    pub benchmark_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqsResult {
    pub project_name: String,
    pub stability_score: u32,
    pub stability_category: QualityCategory,
    pub magnitude_score: u32,
    pub magnitude_category: QualityCategory,
    pub eqs_score: u32,
    pub quality_category: QualityCategory,
    pub explanation: Explanation,
    pub details: EqsDetails,
}

impl EqsResult {
    /// Quarters for presentation. With five or more quarters, a final quarter
    /// whose revenue collapsed by more than 80% is assumed to be still in
    /// progress and left out. Scoring always uses every quarter.
    pub fn complete_quarters(&self) -> &[QuarterBucket] {
        let quarters = &self.details.quarters;
        match quarters.split_last() {
            Some((last, rest))
                if quarters.len() >= PARTIAL_QUARTER_MIN_QUARTERS
                    && matches!(last.growth, Some(g) if g < PARTIAL_QUARTER_GROWTH) =>
            {
                rest
            }
            _ => quarters,
        }
    }
}

/// `round(stability × magnitude / 100)` with both inputs in 0..=100.
pub fn combine(stability: u32, magnitude: u32) -> u32 {
    (stability * magnitude + 50) / 100
}

/// Score one project from its calendar-month revenue.
///
/// Without a benchmark the project is compared against its own average, which
/// caps magnitude at [`magnitude::SELF_COMPARISON_CAP`].
pub fn calculate_eqs(
    project_name: &str,
    monthly_buckets: &[MonthlyBucket],
    benchmark: Option<Decimal>,
) -> EqsResult {
    let quarters = growth::with_growth(&buckets::quarterly_buckets(monthly_buckets));
    let stability = stability::stability_score(&quarters);

    let avg_monthly_revenue = magnitude::average_monthly_revenue(monthly_buckets);
    let benchmark_revenue = benchmark.unwrap_or(avg_monthly_revenue);
    let magnitude_score = magnitude::magnitude_score(avg_monthly_revenue, benchmark_revenue);

    let eqs_score = combine(stability.score, magnitude_score);
    let stability_category = QualityCategory::from_component_score(stability.score);
    let magnitude_category = QualityCategory::from_component_score(magnitude_score);
    let quality_category = QualityCategory::from_eqs_score(eqs_score);

    info!(
        project = project_name,
        stability = stability.score,
        magnitude = magnitude_score,
        eqs = eqs_score,
        quarters = quarters.len(),
        "EQS calculated"
    );

    EqsResult {
        project_name: project_name.to_string(),
        stability_score: stability.score,
        stability_category,
        magnitude_score,
        magnitude_category,
        eqs_score,
        quality_category,
        explanation: Explanation {
            stability: explain::stability_text(project_name, stability_category),
            magnitude: explain::magnitude_text(magnitude_category).to_string(),
            overall: explain::overall_text(project_name, quality_category),
        },
        details: EqsDetails {
            quarters,
            penalties: stability.penalties,
            avg_monthly_revenue,
            benchmark_revenue,
        },
    }
}

/// Score several projects against a shared benchmark: the highest average
/// monthly revenue among them. Sorted by EQS descending, then by name.
pub fn score_against_peers<'a, I>(projects: I) -> Vec<EqsResult>
where
    I: IntoIterator<Item = (&'a str, &'a [MonthlyBucket])>,
{
    let projects: Vec<(&str, &[MonthlyBucket])> = projects.into_iter().collect();
    let benchmark = projects
        .iter()
        .map(|(_, months)| magnitude::average_monthly_revenue(months))
        .max()
        .unwrap_or(Decimal::ZERO);

    let mut results: Vec<EqsResult> = projects
        .iter()
        .map(|(name, months)| calculate_eqs(name, months, Some(benchmark)))
        .collect();

    results.sort_by(|a, b| {
        b.eqs_score
            .cmp(&a.eqs_score)
            .then_with(|| a.project_name.cmp(&b.project_name))
    });
    results
}

impl fmt::Display for EqsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Earnings Quality: {} ===", self.project_name)?;
        writeln!(
            f,
            "EQS: {} ({}) | Stability: {} ({}) | Magnitude: {} ({})",
            self.eqs_score,
            self.quality_category,
            self.stability_score,
            self.stability_category,
            self.magnitude_score,
            self.magnitude_category,
        )?;
        writeln!(
            f,
            "Avg Monthly Revenue: ${} | Benchmark: ${}",
            self.details.avg_monthly_revenue, self.details.benchmark_revenue
        )?;
        writeln!(f, "Quarters:")?;
        for q in self.complete_quarters() {
            let growth = q
                .growth
                .map(|g| format!("{g:+.2}%"))
                .unwrap_or_else(|| "N/A".to_string());
            writeln!(f, "  {}  ${:.2}  {}", q.quarter, q.revenue, growth)?;
        }
        writeln!(f, "{}", self.explanation.stability)?;
        writeln!(f, "{}", self.explanation.magnitude)?;
        write!(f, "{}", self.explanation.overall)
    }
}
