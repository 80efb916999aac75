use cdn_resolver::{Resolution, ResolutionSource};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

/// One resolved input, as printed.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecord<'a> {
    pub input: &'a str,
    #[serde(flatten)]
    pub resolution: &'a Resolution,
}

pub struct OutputManager {
    #[cfg_attr(not(feature = "colored-output"), allow(dead_code))]
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_records(&self, records: &[ResolvedRecord<'_>], format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(records
                .iter()
                .map(|r| self.format_pretty(r))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
            OutputFormat::JsonCompact => {
                let lines = records
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(lines.join("\n"))
            }
        }
    }

    fn format_pretty(&self, record: &ResolvedRecord<'_>) -> String {
        let tier = record
            .resolution
            .tier
            .map_or("-", |tier| tier.as_str());
        let source = match record.resolution.source {
            ResolutionSource::Cached => "cached",
            ResolutionSource::Fallback => "fallback",
            ResolutionSource::Passthrough => "passthrough",
        };
        let changed = record.input != record.resolution.url;

        format!(
            "{} [{} / {}]\n  {} {}",
            self.paint(record.input, Paint::Input),
            self.paint(tier, Paint::Label),
            self.paint(source, Paint::Label),
            if changed { "->" } else { "==" },
            self.paint(&record.resolution.url, if changed { Paint::Changed } else { Paint::Input }),
        )
    }

    #[cfg(feature = "colored-output")]
    fn paint(&self, text: &str, paint: Paint) -> String {
        if !self.colored {
            return text.to_string();
        }
        match paint {
            Paint::Input => text.cyan().to_string(),
            Paint::Label => text.yellow().to_string(),
            Paint::Changed => text.green().bold().to_string(),
        }
    }

    #[cfg(not(feature = "colored-output"))]
    fn paint(&self, text: &str, _paint: Paint) -> String {
        text.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum Paint {
    Input,
    Label,
    Changed,
}
