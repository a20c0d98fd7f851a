use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use revenue_eqs::config::{AppConfig, ProjectConfig, DEFAULT_CONFIG_PATH};
use revenue_eqs::data::subgraph::SubgraphClient;
use revenue_eqs::monitoring::logger;
use revenue_eqs::pipeline::RevenuePipeline;

#[derive(Parser)]
#[command(name = "revenue-eqs", about = "Protocol revenue and earnings quality scoring")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Print JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate revenue for one project, broken down by the configured dimensions
    Revenue {
        /// Project name or symbol
        project: String,
    },
    /// Compute the Earnings Quality Score for one project
    Analyze {
        /// Project name or symbol
        project: String,
        /// Monthly revenue benchmark for the magnitude score
        #[arg(long)]
        benchmark: Option<Decimal>,
    },
    /// Score every configured project against the top earner among them
    Compare,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load(&cli.config)?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        config = %cli.config.display(),
        projects = config.projects.len(),
        "revenue-eqs starting"
    );

    let config = Arc::new(config);
    let client = SubgraphClient::new(&config.ingestion, &config.rate_limit, secrets.subgraph_api_key)?;
    let pipeline = RevenuePipeline::new(Arc::clone(&config), Arc::new(client));

    match cli.cmd {
        Commands::Revenue { project } => {
            let project = find_project(&config, &project)?;
            let revenue = pipeline.collect_project(project).await?;
            report(&revenue, cli.json)
        }
        Commands::Analyze { project, benchmark } => {
            let project = find_project(&config, &project)?;
            let analysis = pipeline.analyze_project(project, benchmark).await?;
            report(&analysis, cli.json)
        }
        Commands::Compare => {
            let results = pipeline.compare_projects(&config.projects).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{:<4} {:<16} {:>5} {:>10} {:>10} {:<9}", "#", "Project", "EQS", "Stability", "Magnitude", "Quality");
                for (rank, r) in results.iter().enumerate() {
                    println!(
                        "{:<4} {:<16} {:>5} {:>10} {:>10} {:<9}",
                        rank + 1,
                        r.project_name,
                        r.eqs_score,
                        r.stability_score,
                        r.magnitude_score,
                        r.quality_category.to_string(),
                    );
                }
            }
            Ok(())
        }
    }
}

fn find_project<'a>(config: &'a AppConfig, name: &str) -> Result<&'a ProjectConfig> {
    config
        .project(name)
        .with_context(|| format!("Unknown project '{name}'"))
}

fn report<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value}");
    }
    Ok(())
}
