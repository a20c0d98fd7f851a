//! Project collection and analysis.
//!
//! Each active source of a project is fetched on its own task with its own
//! timeout. A failing source is logged and left out; the project only fails
//! when none of its sources produced usable data.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, ProjectConfig};
use crate::data::{self, RevenueFeed};
use crate::errors::RevenueError;
use crate::revenue::{AggregateRevenue, SourceRevenue};
use crate::scoring::{self, EqsResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRevenue {
    pub name: String,
    pub symbol: String,
    pub category: String,
    pub revenue: AggregateRevenue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAnalysis {
    pub revenue: ProjectRevenue,
    pub eqs: EqsResult,
}

pub struct RevenuePipeline {
    config: Arc<AppConfig>,
    feed: Arc<dyn RevenueFeed>,
}

impl RevenuePipeline {
    pub fn new(config: Arc<AppConfig>, feed: Arc<dyn RevenueFeed>) -> Self {
        Self { config, feed }
    }

    pub async fn collect_project(&self, project: &ProjectConfig) -> Result<ProjectRevenue, RevenueError> {
        self.collect_project_at(project, Utc::now()).await
    }

    /// Collect one project with query windows ending at `now`.
    #[instrument(skip(self, project), fields(project = %project.name))]
    pub async fn collect_project_at(
        &self,
        project: &ProjectConfig,
        now: DateTime<Utc>,
    ) -> Result<ProjectRevenue, RevenueError> {
        let timeout = self.config.ingestion.source_timeout();
        let page_size = self.config.ingestion.page_size;
        let windows = self.config.windows.revenue_windows();

        let mut tasks = JoinSet::new();
        let mut attempted = 0usize;

        for (index, source) in project.active_sources().enumerate() {
            attempted += 1;
            let feed = Arc::clone(&self.feed);
            let source = source.clone();
            let profile = self.config.source_profiles.get(source.kind).clone();

            tasks.spawn(async move {
                let fetched = tokio::time::timeout(
                    timeout,
                    data::collect_source_points(feed.as_ref(), &source, &profile, page_size, now),
                )
                .await;

                let result = match fetched {
                    Err(_) => Err(RevenueError::SourceUnavailable {
                        source_id: source.id.clone(),
                        reason: format!("timed out after {}s", timeout.as_secs()),
                    }),
                    Ok(Err(e)) => Err(RevenueError::SourceUnavailable {
                        source_id: source.id.clone(),
                        reason: format!("{e:#}"),
                    }),
                    Ok(Ok(raw)) => SourceRevenue::from_raw(
                        &source.id,
                        &source.tags,
                        &raw,
                        &profile.thresholds(),
                        &windows,
                    ),
                };
                (index, source.id, result)
            });
        }

        let mut settled = Vec::with_capacity(attempted);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => settled.push(outcome),
                Err(e) => error!(error = %e, "Source task aborted"),
            }
        }
        settled.sort_by_key(|(index, _, _)| *index);

        // Successful sources in configuration order.
        let mut sources = Vec::with_capacity(settled.len());
        for (_, source_id, result) in settled {
            match result {
                Ok(revenue) => sources.push(revenue),
                Err(e) => warn!(source = %source_id, error = %e, "Source excluded"),
            }
        }

        let revenue = AggregateRevenue::from_sources(
            &project.name,
            attempted,
            &sources,
            &self.config.scoring.dimensions,
        )?;

        Ok(ProjectRevenue {
            name: project.name.clone(),
            symbol: project.symbol.clone(),
            category: project.category.clone(),
            revenue,
        })
    }

    /// Collect a project and score it. `benchmark` overrides the configured one;
    /// with neither, the project is compared against itself.
    pub async fn analyze_project(
        &self,
        project: &ProjectConfig,
        benchmark: Option<Decimal>,
    ) -> Result<ProjectAnalysis, RevenueError> {
        let revenue = self.collect_project(project).await?;
        Ok(analyze(revenue, benchmark.or(self.config.scoring.benchmark_monthly_revenue)))
    }

    /// Score every project against the best performer among them.
    pub async fn compare_projects(&self, projects: &[ProjectConfig]) -> Vec<EqsResult> {
        let mut collected = Vec::with_capacity(projects.len());
        for project in projects {
            match self.collect_project(project).await {
                Ok(revenue) => collected.push(revenue),
                Err(e) => warn!(project = %project.name, error = %e, "Project left out of comparison"),
            }
        }
        compare(&collected)
    }
}

pub fn analyze(revenue: ProjectRevenue, benchmark: Option<Decimal>) -> ProjectAnalysis {
    let eqs = scoring::calculate_eqs(&revenue.name, &revenue.revenue.monthly_buckets, benchmark);
    ProjectAnalysis { revenue, eqs }
}

pub fn compare(projects: &[ProjectRevenue]) -> Vec<EqsResult> {
    let results = scoring::score_against_peers(
        projects
            .iter()
            .map(|p| (p.name.as_str(), p.revenue.monthly_buckets.as_slice())),
    );
    info!(projects = results.len(), "Comparison complete");
    results
}

impl fmt::Display for ProjectRevenue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = &self.revenue.total;
        writeln!(f, "=== Revenue: {} ({}, {}) ===", self.name, self.symbol, self.category)?;
        writeln!(
            f,
            "Daily: ${} | Monthly (trailing): ${} | Annualized: ${}",
            total.daily, total.monthly, total.annualized
        )?;
        for (dimension, groups) in &self.revenue.by_dimension {
            writeln!(f, "By {dimension}:")?;
            for (value, totals) in groups {
                writeln!(
                    f,
                    "  {value}: ${} daily, ${} monthly, ${} annualized",
                    totals.daily, totals.monthly, totals.annualized
                )?;
            }
        }
        write!(
            f,
            "Sources: {} | Months of history: {}",
            self.revenue.sources.len(),
            self.revenue.monthly_buckets.len()
        )
    }
}

impl fmt::Display for ProjectAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.revenue)?;
        write!(f, "{}", self.eqs)
    }
}
