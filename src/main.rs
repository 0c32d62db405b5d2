//! nika-observe CLI - inspect workflow history, graphs and metrics

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use nika_observe::error::{FixSuggestion, ObserveError, Result};
use nika_observe::{DashboardReport, MetricsQuery, ObserveConfig};

#[derive(Parser)]
#[command(name = "nika-observe")]
#[command(about = "Inspect Nika workflow runs: events, graphs, metrics, dashboards")]
#[command(version)]
struct Cli {
    /// Storage root (overrides config and NIKA_OBSERVE_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: ~/.config/nika/observe.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow or fleet dashboard
    Dashboard {
        /// Single workflow (all workflows if omitted)
        #[arg(short, long)]
        workflow: Option<String>,

        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },

    /// Export a workflow as an OpenTelemetry trace
    Export {
        workflow_id: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a workflow's execution graph
    Graph {
        workflow_id: String,

        #[arg(short, long, value_enum, default_value_t = GraphFormat::Mermaid)]
        format: GraphFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a workflow's raw events
    Events {
        workflow_id: String,

        /// Show only the last N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Metrics summaries and retention
    Metrics {
        #[command(subcommand)]
        action: MetricsAction,
    },
}

#[derive(Subcommand)]
enum MetricsAction {
    /// Aggregate recorded metrics
    Summary {
        /// Group by skill
        #[arg(long)]
        by_skill: bool,

        /// Only this workflow
        #[arg(short, long)]
        workflow: Option<String>,
    },

    /// Delete expired date partitions
    Cleanup {
        /// Keep this many days (default from config)
        #[arg(long)]
        retention_days: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Json,
    Yaml,
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormat {
    Dot,
    Mermaid,
    Summary,
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so report output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.root, cli.config).and_then(|config| match cli.command {
        Commands::Dashboard { workflow, format } => show_dashboard(&config, workflow, format),
        Commands::Export {
            workflow_id,
            output,
        } => export_trace(&config, &workflow_id, output),
        Commands::Graph {
            workflow_id,
            format,
            output,
        } => render_graph(&config, &workflow_id, format, output),
        Commands::Events { workflow_id, limit } => show_events(&config, &workflow_id, limit),
        Commands::Metrics { action } => handle_metrics_command(&config, action),
    });

    match result {
        Ok(()) => {}
        Err(e) if e.is_informational() => {
            println!("{} {}", "ℹ".blue(), e);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

fn load_config(root: Option<PathBuf>, path: Option<PathBuf>) -> Result<ObserveConfig> {
    let config = match path {
        Some(path) => ObserveConfig::load_from(path)?,
        None => ObserveConfig::load()?,
    };
    let mut config = config.with_env()?;
    if let Some(root) = root {
        config.storage.root = root;
    }
    Ok(config)
}

fn render<T: Serialize>(value: &T, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        ReportFormat::Yaml => serde_yaml::to_string(value).map_err(|e| ObserveError::DashboardError {
            reason: format!("YAML serialization failed: {}", e),
        }),
    }
}

fn show_dashboard(
    config: &ObserveConfig,
    workflow: Option<String>,
    format: ReportFormat,
) -> Result<()> {
    let report = config.dashboard().generate_dashboard(workflow.as_deref())?;
    println!("{}", render(&report, format)?);

    match &report {
        DashboardReport::Workflow(report) => {
            for (field, error) in report.errors() {
                eprintln!("{} {} unavailable: {}", "⚠".yellow(), field, error);
            }
        }
        DashboardReport::Fleet(fleet) => {
            if let Some(error) = &fleet.discovery_error {
                eprintln!("{} discovery failed: {}", "⚠".yellow(), error);
            }
        }
    }
    Ok(())
}

fn export_trace(config: &ObserveConfig, workflow_id: &str, output: Option<PathBuf>) -> Result<()> {
    let dashboard = config.dashboard();
    match output {
        Some(path) => {
            let export = dashboard.write_otel_trace(workflow_id, &path)?;
            println!(
                "{} Exported {} span(s) to {}",
                "✓".green(),
                export.spans().count(),
                path.display()
            );
        }
        None => {
            let export = dashboard.export_otel_trace(workflow_id)?;
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
    }
    Ok(())
}

fn render_graph(
    config: &ObserveConfig,
    workflow_id: &str,
    format: GraphFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let graph = nika_observe::GraphGenerator::new(config.event_log()).generate(workflow_id)?;

    match output {
        Some(path) => {
            match format {
                GraphFormat::Dot => graph.save_dot(&path)?,
                GraphFormat::Mermaid => graph.save_mermaid(&path)?,
                GraphFormat::Summary => graph.save_summary(&path)?,
            }
            println!(
                "{} Wrote graph ({} nodes, {} edges) to {}",
                "✓".green(),
                graph.metadata.node_count,
                graph.metadata.edge_count,
                path.display()
            );
        }
        None => {
            let text = match format {
                GraphFormat::Dot => graph.to_dot(),
                GraphFormat::Mermaid => graph.to_mermaid(),
                GraphFormat::Summary => graph.summary(),
            };
            print!("{}", text);
        }
    }
    Ok(())
}

fn show_events(config: &ObserveConfig, workflow_id: &str, limit: Option<usize>) -> Result<()> {
    let log = config.event_log();
    if !log.workflow_exists(workflow_id) {
        return Err(ObserveError::WorkflowNotFound {
            workflow_id: workflow_id.to_string(),
        });
    }
    let events = log.read_events(workflow_id, limit)?;

    println!("{} events for '{}':\n", events.len(), workflow_id.cyan());
    println!(
        "{:>5}  {:<24}  {:<14}  {:<20}  {}",
        "SEQ", "TIMESTAMP", "TYPE", "STEP", "STATUS"
    );
    for event in &events {
        let status = event.status.map(|s| s.to_string()).unwrap_or_default();
        let status = match status.as_str() {
            "failed" => status.red().to_string(),
            "completed" => status.green().to_string(),
            _ => status,
        };
        println!(
            "{:>5}  {:<24}  {:<14}  {:<20}  {}",
            event.seq,
            nika_observe::util::format_utc(&event.timestamp),
            event.event_type.as_str(),
            event.step_id().unwrap_or("-"),
            status
        );
    }
    Ok(())
}

fn handle_metrics_command(config: &ObserveConfig, action: MetricsAction) -> Result<()> {
    let collector = config.metrics_collector();
    match action {
        MetricsAction::Summary { by_skill, workflow } => {
            let mut query = MetricsQuery::new();
            if let Some(id) = workflow {
                query = query.workflow(id);
            }
            let json = if by_skill {
                serde_json::to_string_pretty(&collector.get_summary_by_skill(&query)?)?
            } else {
                serde_json::to_string_pretty(&collector.get_summary(&query)?)?
            };
            println!("{}", json);
        }
        MetricsAction::Cleanup { retention_days } => {
            let days = retention_days.unwrap_or(config.metrics.retention_days);
            let deleted = collector.cleanup_old_metrics(days)?;
            println!(
                "{} Deleted {} metrics partition(s) older than {} day(s)",
                "✓".green(),
                deleted,
                days
            );
        }
    }
    Ok(())
}
