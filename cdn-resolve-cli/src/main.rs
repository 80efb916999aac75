mod cli;
mod config;
mod error;
mod output;

use std::{
    fs,
    io::{self, BufRead},
    path::Path,
    process,
};

use anyhow::Context;
use cdn_resolver::{
    CdnResolver, IngestReport, Resolution, SeededRandom,
    patterns::{is_blob_url, is_known_non_video_url},
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use tracing::{Level, debug, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, CapturedResponse, OutputFormat},
    config::AppConfig,
    error::AppError,
    output::{OutputManager, ResolvedRecord},
};

fn main() {
    let args = Args::parse();
    let output_format = args.output;

    if let Err(e) = run(args) {
        match output_format {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": format!("{e:#}"),
                });
                println!("{error_json}");
            }
            OutputFormat::Pretty => {
                error!("Application error: {:#}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {:#}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {e:#}");
                }
            }
        }
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    init_logging(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(capacity) = args.cache_capacity {
        config.resolver.cache_capacity = capacity;
        config.resolver.validate()?;
    }

    if args.show_config {
        println!("{}", config.show()?);
        return Ok(());
    }

    let mut resolver = match args.seed {
        Some(seed) => CdnResolver::with_random(config.resolver.clone(), SeededRandom::new(seed)),
        None => CdnResolver::new(config.resolver.clone()),
    }?;

    // Page play info first, playurl responses take precedence.
    for path in &args.manifests {
        ingest_file(&mut resolver, path, false)?;
    }
    for path in &args.playurl_responses {
        ingest_file(&mut resolver, path, true)?;
    }
    for response in &args.responses {
        ingest_response(&mut resolver, response)?;
    }

    let urls = if args.urls.is_empty() {
        read_urls(io::stdin().lock())?
    } else {
        args.urls
    };
    if urls.is_empty() {
        return Err(AppError::InvalidInput("no URLs to resolve".to_string()).into());
    }

    let resolutions: Vec<Resolution> = urls
        .iter()
        .map(|url| {
            if is_blob_url(url) || is_known_non_video_url(url) {
                debug!(url = %url, "Not a media CDN URL, leaving it untouched");
                Resolution::passthrough(url.as_str())
            } else {
                resolver.resolve_detailed(url, "cli")
            }
        })
        .collect();

    let records: Vec<ResolvedRecord<'_>> = urls
        .iter()
        .zip(&resolutions)
        .map(|(input, resolution)| ResolvedRecord {
            input: input.as_str(),
            resolution,
        })
        .collect();

    let output = OutputManager::new(config.colored);
    println!("{}", output.format_records(&records, args.output)?);

    info!(
        resolved = records.len(),
        cached = resolver.cache_len(),
        evictions = resolver.cache().evictions(),
        "Done"
    );
    Ok(())
}

fn ingest_file(resolver: &mut CdnResolver, path: &Path, overwrite: bool) -> anyhow::Result<IngestReport> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read play info from {}", path.display()))?;
    let meta = path.display().to_string();
    let report = resolver.ingest_json(&body, &meta, overwrite);
    debug!(file = %meta, ?report, "Ingested play info");
    Ok(report)
}

fn ingest_response(
    resolver: &mut CdnResolver,
    response: &CapturedResponse,
) -> anyhow::Result<Option<IngestReport>> {
    let body = fs::read_to_string(&response.path).with_context(|| {
        format!("Failed to read response body from {}", response.path.display())
    })?;
    let report = resolver.ingest_response(&response.url, &body);
    if report.is_none() {
        info!(url = %response.url, "Skipping response that is not from the playurl API");
    }
    Ok(report)
}

fn read_urls(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            urls.push(line.to_string());
        }
    }
    Ok(urls)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(io::stderr),
        )
        .init();
}
