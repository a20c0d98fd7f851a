use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;

use crate::data::QueryShape;
use crate::revenue::filter::OutlierThresholds;
use crate::revenue::metrics::RevenueWindows;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub ingestion: IngestionConfig,
    pub rate_limit: RateLimitConfig,
    pub windows: WindowsConfig,
    pub scoring: ScoringConfig,
    pub source_profiles: SourceProfiles,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    pub page_size: usize,
    pub source_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
}

impl IngestionConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowsConfig {
    pub trailing_days: usize,
    pub annualization_days: usize,
}

impl WindowsConfig {
    pub fn revenue_windows(&self) -> RevenueWindows {
        RevenueWindows {
            trailing_days: self.trailing_days,
            annualization_days: self.annualization_days,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Cross-project benchmark for magnitude scoring. Falls back to self-comparison when unset.
    pub benchmark_monthly_revenue: Option<Decimal>,
    /// Source tags to break aggregate revenue down by (e.g. "version", "chain").
    #[serde(default)]
    pub dimensions: Vec<String>,
}

/// Which kind of remote entity a source exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Lending-protocol `financialsDailySnapshots` (one snapshot per day, revenue in USD).
    LendingSnapshots,
    /// DEX `*DayData` entities with a daily `feesUSD` field.
    DexDayData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceProfiles {
    pub lending_snapshots: SourceProfile,
    pub dex_day_data: SourceProfile,
}

impl SourceProfiles {
    pub fn get(&self, kind: SourceKind) -> &SourceProfile {
        match kind {
            SourceKind::LendingSnapshots => &self.lending_snapshots,
            SourceKind::DexDayData => &self.dex_day_data,
        }
    }
}

/// Per-source-type ingestion and filtering settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceProfile {
    pub min_valid: Decimal,
    pub max_valid: Option<Decimal>,
    /// Safety cap on the total number of points pulled for one source.
    pub max_points: usize,
    /// Query window length; `None` for entities that are paged newest-first without a window.
    pub lookback_days: Option<i64>,
}

impl SourceProfile {
    pub fn thresholds(&self) -> OutlierThresholds {
        OutlierThresholds {
            min_valid: self.min_valid,
            max_valid: self.max_valid,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub symbol: String,
    pub category: String,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl ProjectConfig {
    pub fn active_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.active)
    }
}

/// One deployment of a protocol (one chain/version), queried as one ingestion source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub endpoint: String,
    pub kind: SourceKind,
    /// Overrides the entity collection queried for this source.
    pub entity: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub launch_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_active() -> bool {
    true
}

impl SourceConfig {
    pub fn query_shape(&self) -> QueryShape {
        QueryShape::for_source(self.kind, self.entity.as_deref())
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub subgraph_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            subgraph_api_key: std::env::var("SUBGRAPH_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables for secrets.
    pub fn load(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        config.validate()?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingestion.page_size == 0 {
            bail!("ingestion.page_size must be greater than zero");
        }
        if self.rate_limit.requests_per_second == 0 || self.rate_limit.burst_size == 0 {
            bail!("rate_limit.requests_per_second and rate_limit.burst_size must be greater than zero");
        }
        if self.windows.trailing_days == 0 || self.windows.annualization_days == 0 {
            bail!("windows.trailing_days and windows.annualization_days must be greater than zero");
        }
        if let Some(benchmark) = self.scoring.benchmark_monthly_revenue {
            if benchmark.is_sign_negative() {
                bail!("scoring.benchmark_monthly_revenue must not be negative, got {benchmark}");
            }
        }

        for (name, profile) in [
            ("lending_snapshots", &self.source_profiles.lending_snapshots),
            ("dex_day_data", &self.source_profiles.dex_day_data),
        ] {
            if profile.min_valid.is_sign_negative() {
                bail!("source_profiles.{name}.min_valid must not be negative");
            }
            if let Some(max_valid) = profile.max_valid {
                if max_valid <= profile.min_valid {
                    bail!(
                        "source_profiles.{name}.max_valid ({max_valid}) must exceed min_valid ({})",
                        profile.min_valid
                    );
                }
            }
            if profile.max_points == 0 {
                bail!("source_profiles.{name}.max_points must be greater than zero");
            }
            if matches!(profile.lookback_days, Some(days) if days <= 0) {
                bail!("source_profiles.{name}.lookback_days must be positive");
            }
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            for source in &project.sources {
                if !seen.insert(source.id.as_str()) {
                    bail!("Duplicate source id '{}' in project '{}'", source.id, project.name);
                }
            }
        }

        Ok(())
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.symbol.eq_ignore_ascii_case(name))
    }
}
