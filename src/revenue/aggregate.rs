//! Project-level aggregation across deployments.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::errors::RevenueError;
use crate::revenue::buckets::{self, MonthlyBucket};
use crate::revenue::metrics::DeploymentMetrics;
use crate::revenue::{RevenueTotals, SourceRevenue};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRevenue {
    pub total: RevenueTotals,
    /// dimension name → dimension value → totals, e.g. `"chain" → "polygon" → {..}`.
    pub by_dimension: BTreeMap<String, BTreeMap<String, RevenueTotals>>,
    /// Calendar-month revenue summed across sources.
    pub monthly_buckets: Vec<MonthlyBucket>,
    pub sources: Vec<DeploymentMetrics>,
}

impl AggregateRevenue {
    /// Fold every successful source of one project. `sources` keeps the
    /// order it is given in.
    ///
    /// An empty input is an error: a silent all-zero result would read as
    /// "this protocol earns nothing".
    pub fn from_sources(
        project: &str,
        attempted: usize,
        sources: &[SourceRevenue],
        dimensions: &[String],
    ) -> Result<Self, RevenueError> {
        if sources.is_empty() {
            return Err(RevenueError::AllSourcesFailed {
                project: project.to_string(),
                attempted,
            });
        }

        let overflow = || RevenueError::AggregateOverflow {
            project: project.to_string(),
        };

        let metrics: Vec<DeploymentMetrics> = sources.iter().map(|s| s.metrics.clone()).collect();

        let total = metrics
            .iter()
            .try_fold(RevenueTotals::default(), |acc, m| acc.checked_add(&m.totals()))
            .ok_or_else(overflow)?;

        let by_dimension: BTreeMap<String, BTreeMap<String, RevenueTotals>> = dimensions
            .iter()
            .map(|dimension| {
                let breakdown = breakdown_by(&metrics, |m| m.tag(dimension)).ok_or_else(overflow)?;
                Ok((dimension.clone(), breakdown))
            })
            .collect::<Result<_, RevenueError>>()?;

        let monthly_buckets =
            buckets::merge_monthly(sources.iter().map(|s| s.monthly_buckets.as_slice()));

        let aggregate = Self {
            total: total.rounded(),
            by_dimension,
            monthly_buckets,
            sources: metrics,
        };

        info!(
            project,
            sources = aggregate.sources.len(),
            attempted,
            annualized = %aggregate.total.annualized,
            months = aggregate.monthly_buckets.len(),
            "Aggregated project revenue"
        );

        Ok(aggregate)
    }

    pub fn breakdown(&self, dimension: &str) -> Option<&BTreeMap<String, RevenueTotals>> {
        self.by_dimension.get(dimension)
    }
}

/// Sum metrics grouped by a tag extracted from each source. Sources for which
/// `tag` yields `None` are left out of the breakdown. Returns `None` if a
/// group's sum does not fit in a `Decimal`.
pub fn breakdown_by<'a, F>(
    metrics: &'a [DeploymentMetrics],
    tag: F,
) -> Option<BTreeMap<String, RevenueTotals>>
where
    F: Fn(&'a DeploymentMetrics) -> Option<&'a str>,
{
    let mut groups: BTreeMap<String, RevenueTotals> = BTreeMap::new();
    for m in metrics {
        if let Some(value) = tag(m) {
            let group = groups.entry(value.to_string()).or_default();
            *group = group.checked_add(&m.totals())?;
        }
    }

    Some(
        groups
            .into_iter()
            .map(|(value, totals)| (value, totals.rounded()))
            .collect(),
    )
}
