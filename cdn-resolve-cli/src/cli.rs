use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media URLs to resolve. Read one per line from stdin when omitted
    pub urls: Vec<String>,

    /// Play info captured from the page (ingested without overwrite)
    #[arg(short, long = "manifest", value_name = "FILE")]
    pub manifests: Vec<PathBuf>,

    /// Playurl API response bodies (ingested with overwrite)
    #[arg(long = "playurl", value_name = "FILE")]
    pub playurl_responses: Vec<PathBuf>,

    /// Captured network response as `REQUEST_URL=FILE`. Only playurl API
    /// responses are ingested, others are ignored
    #[arg(long = "response", value_name = "URL=FILE", value_parser = parse_captured_response)]
    pub responses: Vec<CapturedResponse>,

    /// Seed for reproducible picks among equal candidates
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the policy cache capacity
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Configuration file path
    #[arg(short, long, env = "CDN_RESOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Response body saved to disk, along with the URL it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    pub url: String,
    pub path: PathBuf,
}

// Request URLs contain `=` in their query, file names normally don't.
fn parse_captured_response(value: &str) -> Result<CapturedResponse, String> {
    match value.rsplit_once('=') {
        Some((url, path)) if !url.is_empty() && !path.is_empty() => Ok(CapturedResponse {
            url: url.to_string(),
            path: PathBuf::from(path),
        }),
        _ => Err(format!("expected REQUEST_URL=FILE, got `{value}`")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
    JsonCompact,
}
