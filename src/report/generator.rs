//! Dashboard generation.
//!
//! This module renders aggregated service statistics and health probes as
//! Markdown or JSON.

use crate::models::{Breakdown, ServiceStatistics};
use crate::stats::{AggregationResult, SourceResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Everything a dashboard shows, as produced by one aggregation call.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub statistics: AggregationResult<Value>,
}

impl Dashboard {
    pub fn new(base_url: impl Into<String>, statistics: AggregationResult<Value>) -> Self {
        Self {
            generated_at: Utc::now(),
            base_url: base_url.into(),
            statistics,
        }
    }
}

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# Campus Dashboard\n\n");
    output.push_str(&generate_metadata_section(dashboard));
    output.push_str(&generate_overview_table(&dashboard.statistics));

    for (source, result) in dashboard.statistics.iter() {
        output.push_str(&generate_service_section(source, result));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(dashboard: &Dashboard) -> String {
    let stats = &dashboard.statistics;
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **API:** {}\n", dashboard.base_url));
    section.push_str(&format!(
        "- **Services answered:** {} of {}\n",
        stats.successes().count(),
        stats.len()
    ));
    section.push('\n');

    section
}

/// One row per service with its first headline figure.
fn generate_overview_table(stats: &AggregationResult<Value>) -> String {
    let mut table = String::new();

    table.push_str("## Overview\n\n");
    table.push_str("| Service | Status | Headline |\n");
    table.push_str("|---|---|---|\n");

    for (source, result) in stats.iter() {
        let (status, headline) = match result {
            SourceResult::Data(value) => {
                let headline = ServiceStatistics::parse(source, value)
                    .and_then(|parsed| parsed.headline().into_iter().next())
                    .map(|(label, figure)| format!("{}: {}", label, figure))
                    .unwrap_or_default();
                ("ok", headline)
            }
            SourceResult::Error(message) => ("unavailable", escape_cell(message)),
        };
        table.push_str(&format!("| {} | {} | {} |\n", source, status, headline));
    }
    table.push('\n');

    table
}

fn generate_service_section(source: &str, result: &SourceResult<Value>) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title_case(source)));

    match result {
        SourceResult::Error(message) => {
            section.push_str(&format!("> Unavailable: {}\n\n", message));
        }
        SourceResult::Data(value) => match ServiceStatistics::parse(source, value) {
            Some(parsed) => {
                section.push_str("| Metric | Value |\n");
                section.push_str("|---|---:|\n");
                for (label, figure) in parsed.headline() {
                    section.push_str(&format!("| {} | {} |\n", label, figure));
                }
                section.push('\n');

                if let Some((label, breakdown)) = parsed.breakdown() {
                    section.push_str(&generate_breakdown_table(label, breakdown));
                }
            }
            // Unknown payload shape: show it raw.
            None => {
                section.push_str("```json\n");
                section.push_str(&serde_json::to_string_pretty(value).unwrap_or_default());
                section.push_str("\n```\n\n");
            }
        },
    }

    section
}

fn generate_breakdown_table(label: &str, breakdown: &Breakdown) -> String {
    let mut table = String::new();

    table.push_str(&format!("### {}\n\n", label));
    table.push_str("| Name | Count |\n");
    table.push_str("|---|---:|\n");
    for (name, value) in breakdown {
        table.push_str(&format!("| {} | {} |\n", escape_cell(name), display_value(value)));
    }
    table.push('\n');

    table
}

/// Generate a Markdown table of health probe results.
pub fn generate_health_table(health: &AggregationResult<Value>) -> String {
    let mut table = String::new();

    table.push_str("| Service | Status | Detail |\n");
    table.push_str("|---|---|---|\n");

    for (source, result) in health.iter() {
        let (status, detail) = match result {
            SourceResult::Data(value) => (
                value
                    .get("status")
                    .map(display_value)
                    .unwrap_or_else(|| "ok".to_string()),
                String::new(),
            ),
            SourceResult::Error(message) => ("down".to_string(), escape_cell(message)),
        };
        table.push_str(&format!("| {} | {} | {} |\n", source, status, detail));
    }

    table
}

fn generate_footer() -> String {
    "---\n\n*Generated by campusctl*\n".to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => escape_cell(s),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn title_case(source: &str) -> String {
    let mut chars = source.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Generate a JSON dashboard.
pub fn generate_json_dashboard(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Write rendered content to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;

    Ok(())
}
