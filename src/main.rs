use anyhow::Context;
use clap::Parser;
use rangefetch::{DownloadConfig, Downloader, Strategy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rangefetch")]
#[command(about = "Download a file over HTTP with parallel range requests", long_about = None)]
#[command(version)]
struct Args {
    /// URL of the resource to download
    url: String,

    /// Destination file
    #[arg(short, long)]
    output: PathBuf,

    /// Number of parallel range requests
    #[arg(short, long, default_value_t = 4)]
    chunks: u32,

    /// Upper bound on parallel range requests
    #[arg(long, default_value_t = 20)]
    max_chunks: u32,

    /// Folder for temporary chunk files
    #[arg(long, default_value = ".rangefetch.parts")]
    chunk_dir: PathBuf,

    /// Pause between retries (e.g. "500ms", "2s")
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Per-request timeout (e.g. "30s"); unlimited when omitted
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Print the download report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("rangefetch={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    info!("rangefetch - parallel HTTP downloader");
    info!("Source: {}", args.url);
    info!("Destination: {:?}", args.output);

    let config = DownloadConfig {
        url: args.url,
        destination: args.output,
        chunk_dir: args.chunk_dir,
        requested_chunks: args.chunks,
        max_chunks: args.max_chunks,
        retry_delay: args.retry_delay,
        request_timeout: args.timeout,
        ..DownloadConfig::default()
    };

    let progress = if atty::is(atty::Stream::Stderr) {
        let progress_bar = indicatif::ProgressBar::new(0);
        progress_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} | {elapsed_precise} elapsed, ETA {eta_precise}")
                .context("invalid progress template")?
                .progress_chars("█▓▒░ "),
        );
        progress_bar
    } else {
        indicatif::ProgressBar::hidden()
    };

    let downloader = Downloader::new(config)
        .context("failed to build HTTP client")?
        .with_progress(progress.clone());
    let report = downloader.run().await.context("download could not start")?;
    progress.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let strategy = match report.strategy {
        Strategy::Parallel { chunks } => format!("{} parallel chunks", chunks),
        Strategy::SingleStream => "a single stream".to_string(),
    };
    let elapsed = humantime::format_duration(Duration::from_millis(report.elapsed_ms));

    for chunk in report.chunks.iter().filter(|c| !c.succeeded) {
        if let Some(reason) = &chunk.last_error {
            error!("{}", reason);
        }
    }

    let report = report.into_result()?;
    info!(
        "Downloaded {} bytes using {} in {}",
        report.bytes_written, strategy, elapsed
    );
    Ok(())
}
