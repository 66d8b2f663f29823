//! Report generation.
//!
//! JSON output is the wire format consumed by dashboards. Markdown output
//! is a human-readable summary of the same response.

use crate::models::{AggregateResponse, ChartResponse, MonthlySeries, SeriesForecast};
use anyhow::Result;

/// Generate the JSON aggregate response.
pub fn generate_json_report(response: &AggregateResponse) -> Result<String> {
    serde_json::to_string_pretty(response).map_err(Into::into)
}

/// Generate the JSON chart response.
pub fn generate_chart_json(chart: &ChartResponse) -> Result<String> {
    serde_json::to_string_pretty(chart).map_err(Into::into)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(response: &AggregateResponse) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Activity Report: {}\n\n", response.full_name));

    output.push_str(&generate_metadata_section(response));
    output.push_str(&generate_series_section("Issues Created", &response.created));
    output.push_str(&generate_series_section("Issues Closed", &response.closed));
    output.push_str(&generate_forecast_section(&response.forecasts()));
    output.push_str(&generate_footer());

    output
}

/// Generate a Markdown chart summary.
pub fn generate_chart_markdown(chart: &ChartResponse) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Reference {} Chart\n\n",
        capitalize(chart.metric.count_key())
    ));
    match chart.url {
        Some(ref url) => output.push_str(&format!("![chart]({})\n", url)),
        None => output.push_str("*chart unavailable*\n"),
    }

    output
}

/// Generate the metadata section.
fn generate_metadata_section(response: &AggregateResponse) -> String {
    let activity = &response.activity;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Repository:** {}\n", response.full_name));
    section.push_str(&format!("- **Stars:** {}\n", response.star_count));
    section.push_str(&format!("- **Forks:** {}\n", response.fork_count));
    section.push_str(&format!(
        "- **Issues Collected:** {} ({} open, {} closed)\n",
        activity.issues, activity.open_issues, activity.closed_issues
    ));
    section.push_str(&format!("- **Pull Requests:** {}\n", activity.pulls));
    section.push_str(&format!("- **Branches:** {}\n", activity.branches));
    section.push_str(&format!(
        "- **Windows Scanned:** {} ({} months in the created series)\n",
        activity.windows,
        response.created.len()
    ));
    if activity.failed_windows > 0 {
        section.push_str(&format!(
            "- **Windows Failed:** {}\n",
            activity.failed_windows
        ));
    }

    if !activity.top_labels.is_empty() {
        let labels: Vec<String> = activity
            .top_labels
            .iter()
            .map(|(label, count)| format!("`{}` ({})", label, count))
            .collect();
        section.push_str(&format!("- **Top Labels:** {}\n", labels.join(", ")));
    }
    section.push('\n');

    section
}

/// Generate a month-by-month table.
fn generate_series_section(title: &str, series: &MonthlySeries) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    if series.is_empty() {
        section.push_str("No activity in the scanned period.\n\n");
        return section;
    }

    section.push_str("| Month | Count |\n");
    section.push_str("|:---|---:|\n");
    for (month, count) in series.entries() {
        section.push_str(&format!("| {} | {} |\n", month, count));
    }
    section.push_str(&format!("| **Total** | **{}** |\n\n", series.total()));

    section
}

/// Generate the forecast artifact section.
fn generate_forecast_section(forecasts: &[&SeriesForecast]) -> String {
    let mut section = String::new();

    section.push_str("## Forecasts\n\n");

    for forecast in forecasts {
        section.push_str(&format!("### {}\n\n", forecast.kind));

        if !forecast.is_available() {
            section.push_str("*forecast unavailable*\n\n");
            continue;
        }

        for (key, url) in forecast.artifacts() {
            if let Some(url) = url {
                section.push_str(&format!("- `{}`: {}\n", key, url));
            }
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by repocast v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
