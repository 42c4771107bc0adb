use std::path::Path;

use conv_harness::perf::{aggregate_dir, format_chart, format_markdown, format_text, PerfReport};

const CHART_WIDTH: usize = 50;

/// Output format for the `perf` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfFormat {
    Text,
    Json,
    Markdown,
    Chart,
}

impl PerfFormat {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "markdown" => Ok(Self::Markdown),
            "chart" => Ok(Self::Chart),
            other => Err(format!(
                "unknown format '{other}', expected 'text', 'json', 'markdown', or 'chart'"
            )),
        }
    }
}

pub fn run(dir: &Path, format: PerfFormat) -> Result<(), Box<dyn std::error::Error>> {
    let report = aggregate_dir(dir)?;
    print!("{}", render(&report, format)?);
    Ok(())
}

fn render(report: &PerfReport, format: PerfFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        PerfFormat::Text => {
            let mut out = format_text(report);
            if let Some(k) = report.kernel_elements {
                out.push_str(&format!("Kernel elements: {k}\n"));
            }
            out
        }
        PerfFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        PerfFormat::Markdown => format_markdown(report),
        PerfFormat::Chart => format_chart(report, CHART_WIDTH),
    })
}
