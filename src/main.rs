use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod aggregator;
mod config;
mod dashboard;
mod error;
mod exporter;
mod frame_drop;
mod frame_locator;
mod gaps;
mod geodesy;
mod identity;
mod models;
mod pipeline;
mod plot;
mod sortie;
mod srt_parser;
mod timeline;
mod window;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Analyse the SRT telemetry of a multi-drone recording session")]
struct Cli {
    /// Session location of the drone flight
    session_location: Option<PathBuf>,

    /// Show the flight plot in a window as well as saving it
    #[arg(long)]
    showplot: bool,

    /// Drift threshold in meters (default 5)
    #[arg(long)]
    drift: Option<f64>,

    /// Climb above nominal altitude, in meters, that marks a relay video (default 7)
    #[arg(long)]
    height: Option<f64>,

    /// TOML file replacing the built-in configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn prompt_session_location() -> Result<PathBuf> {
    print!("Enter the session location: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading session location")?;
    Ok(PathBuf::from(line.trim()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::load_default()?,
    }
    .with_overrides(cli.drift, cli.height);

    let location = match cli.session_location {
        Some(path) => path,
        None => prompt_session_location()?,
    };
    info!("analysing session {}", location.display());

    // Structural failures abort before any report is written
    let session = match pipeline::analyze_session(&location, &config).await {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let report = exporter::export_session(&session, &config).await?;
    info!(
        "{} rows, {} anomalies, summary {}",
        report.rows,
        report.anomalies,
        if report.wrote_summary { "written" } else { "not needed" }
    );

    if let Some(manifest) = &report.manifest {
        info!(
            "manifest {} lists {} videos",
            report.paths.manifest.display(),
            manifest.num_videos
        );
    }

    let timeline = timeline::concurrency_timeline(&session, config.report.plot_sample_interval_s)?;
    if config.report.write_plot {
        plot::render_png(&timeline, &report.paths.plot)?;
    }
    if cli.showplot {
        dashboard::show_timeline(&report.paths.stem, timeline)?;
    }

    Ok(())
}
