//! Collector CLI - one reconciliation run, printed to the terminal
//!
//! Usage:
//!   # Sources from the environment (.env):
//!   cargo run --bin collector
//!
//!   # Sources from a config file, only styles waiting for photography:
//!   cargo run --bin collector -- --config config/sources.json --stage NOT_PHOTOGRAPHED
//!
//!   # Full report as JSON:
//!   cargo run --bin collector -- --json

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use collector::{run_once, Settings, SheetLoader, SourcesConfig};
use reconciler::{RunReport, SourceStatus, Stage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Reports the lifecycle stage of every style")]
struct Args {
    /// Path to sources config file (JSON); environment variables otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only list styles in this stage (code or Korean label)
    #[arg(long)]
    stage: Option<String>,

    /// Only list styles of this brand
    #[arg(long)]
    brand: Option<String>,

    /// Maximum number of styles to list
    #[arg(long, default_value = "30")]
    limit: usize,

    /// Print the report as JSON instead of a summary
    #[arg(long, default_value = "false")]
    json: bool,
}

fn print_sources(report: &RunReport) {
    println!("\nSources:");
    println!("{:-<72}", "");
    for source in &report.sources {
        let label = source.brand.as_deref().unwrap_or("base");
        match &source.status {
            SourceStatus::Loaded => {
                println!(
                    "  ✓ {} [{}] rows: {}, facts: {}",
                    label, source.source, source.rows, source.facts
                );
                match source.matched_styles {
                    Some(0) if source.facts > 0 => {
                        println!("      ⚠ no base style matched {} style codes", label)
                    }
                    Some(matched) => println!("      matched base styles: {}", matched),
                    None => {}
                }
            }
            SourceStatus::Empty => println!("  - {} [{}] no usable rows", label, source.source),
            SourceStatus::Unavailable { reason } => {
                println!("  ✗ {} [{}] {}", label, source.source, reason)
            }
        }
        if !source.missing_fields.is_empty() {
            println!("      missing: {}", source.missing_fields.join(", "));
        }
    }
    println!("{:-<72}", "");
}

fn print_counts(report: &RunReport) {
    println!("\nStages ({} styles):", report.stage_counts.total());
    for stage in Stage::ALL {
        println!("  {:<8} {:>6}", stage.label(), report.stage_counts.get(stage));
    }
    let m = &report.milestone_counts;
    println!("\nMilestones:");
    println!("  입고 {}  출고 {}  촬영 {}  등록 {}  판매 {}", m.received, m.shipped, m.photographed, m.registered, m.on_sale);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("collector=info,reconciler=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let stage = match &args.stage {
        Some(raw) => Some(raw.parse::<Stage>().map_err(anyhow::Error::msg)?),
        None => None,
    };

    let sources = match &args.config {
        Some(path) => SourcesConfig::load(path).await?,
        None => SourcesConfig::from_env()?,
    };

    let loader = Arc::new(SheetLoader::new(settings.backend()?, settings.cache_ttl));
    let report = run_once(loader, &sources).await;
    let view = report.view(stage, args.brand.as_deref());

    if args.json {
        if stage.is_some() || args.brand.is_some() {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    println!("=== Merchandise Status ===");
    println!("Run: {} at {}", report.run_id, report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    print_sources(&report);
    print_counts(&report);

    println!("\nStyles ({} of {}):", view.len().min(args.limit), view.len());
    for item in view.iter().take(args.limit) {
        println!(
            "  [{}] {} {} {} - {} (입고 {}, 출고 {}, 판매 {})",
            item.stage.label(),
            item.brand,
            item.year_season,
            item.style_code,
            if item.product_name.is_empty() { "-" } else { &item.product_name },
            item.inbound_qty,
            item.outbound_qty,
            item.sales_qty,
        );
    }

    Ok(())
}
