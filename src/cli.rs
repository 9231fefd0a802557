//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use imagefap_downloader::download::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use imagefap_downloader::fetch::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use imagefap_downloader::site::DEFAULT_ORIGIN;

/// Download every full-resolution image of an imagefap gallery.
///
/// Accepts any of the gallery URL forms (`/gallery/<id>`, `/pictures/<id>/...`,
/// `/gallery.php?gid=<id>`, `/photo/<n>/?gid=<id>`) and stores the images in a
/// folder named after the gallery title.
#[derive(Parser, Debug)]
#[command(name = "imagefap-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Gallery or photo URL on imagefap.com
    pub url: String,

    /// Directory in which the gallery folder is created
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum concurrent photo downloads (1-16; 1 keeps gallery order)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=MAX_CONCURRENCY as i64))]
    pub concurrency: u8,

    /// Stop scheduling downloads after the first failed image
    #[arg(long)]
    pub fail_fast: bool,

    /// HTTP connect timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Site origin used for gallery and robots.txt requests
    #[arg(long, default_value = DEFAULT_ORIGIN, hide = true)]
    pub site_origin: String,
}
