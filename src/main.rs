//! CLI entry point for the gallery downloader.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use imagefap_downloader::app::EXIT_FATAL;
use imagefap_downloader::fetch::HttpTimeouts;
use imagefap_downloader::{RunOptions, SiteConfig, run_gallery};
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_byte(EXIT_FATAL))
        }
    }
}

fn init_tracing(args: &Args) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: Args) -> Result<u8> {
    debug!(?args, "CLI arguments parsed");

    let site = SiteConfig::new(&args.site_origin)
        .with_context(|| format!("invalid site origin '{}'", args.site_origin))?;
    let options = RunOptions {
        output_dir: args.output_dir,
        concurrency: usize::from(args.concurrency),
        fail_fast: args.fail_fast,
        timeouts: HttpTimeouts {
            connect_secs: args.connect_timeout,
            read_secs: args.read_timeout,
        },
        site,
        show_progress: !args.quiet && io::stderr().is_terminal(),
    };

    let summary = run_gallery(&args.url, &options).await?;

    for failure in summary.stats.failures() {
        warn!(page_url = %failure.page_url, error = %failure.error, "not downloaded");
    }
    if summary.stats.skipped() > 0 {
        warn!(skipped = summary.stats.skipped(), "stopped early after a failure");
    }
    info!(
        "Downloaded {} of {} images to {}",
        summary.completed(),
        summary.total,
        summary.directory.display()
    );

    Ok(exit_byte(summary.exit_code()))
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
