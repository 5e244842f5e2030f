//! Output formatting for haystack-bench

use anyhow::{Context, Result};
use bench_core::{ResourceSnapshot, ResultRow};
use bench_runner::{Average, Summary};
use clap::ValueEnum;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::fmt::Display;
use std::path::Path;
use sysinfo::System;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON summary
    Json,
    /// YAML summary
    Yaml,
}

impl OutputFormat {
    /// Whether banners, progress and live stats may be written to the terminal
    pub fn is_interactive(self) -> bool {
        self == OutputFormat::Table
    }
}

/// Host description shown before a run
#[derive(Debug, Clone)]
pub struct SystemSpecs {
    pub os: String,
    pub kernel: String,
    pub cpu: String,
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub total_memory: u64,
}

impl SystemSpecs {
    pub fn collect() -> Self {
        let system = System::new_all();
        let os = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{} {}", name, version),
            (Some(name), None) => name,
            _ => "unknown".to_string(),
        };

        Self {
            os,
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            cpu: system
                .cpus()
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            physical_cores: system.physical_core_count(),
            logical_cores: system.cpus().len(),
            total_memory: system.total_memory(),
        }
    }
}

pub fn print_banner(specs: &SystemSpecs) {
    println!("{}", "haystack-bench".bold().cyan());
    println!("{}", "System Specifications".bold());
    println!("  OS: {}", specs.os);
    println!("  Kernel: {}", specs.kernel);
    println!("  CPU: {}", specs.cpu);
    println!(
        "  Cores: {} physical, {} logical",
        specs
            .physical_cores
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        specs.logical_cores
    );
    println!("  Total Memory: {:.2} GB", specs.total_memory as f64 / 1024f64.powi(3));
    println!();
    println!("{}", "Press Ctrl+C at any time to stop the benchmark.".yellow());
    println!();
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn or_na<T: Display>(value: Option<T>, unit: &str) -> String {
    value
        .map(|v| format!("{}{}", v, unit))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Live resource table for one snapshot
pub fn stats_table(snapshot: &ResourceSnapshot) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Metric", "Value"]));

    let rows = [
        ("CPU Load", or_na(snapshot.cpu_load.map(|v| format!("{:.1}", v)), "%")),
        ("GPU Load", or_na(snapshot.gpu_load, "%")),
        ("GPU Temperature", or_na(snapshot.gpu_temperature, "°C")),
        ("GPU Core Clock", or_na(snapshot.gpu_core_clock, " MHz")),
        ("GPU Fan Speed", or_na(snapshot.gpu_fan_speed, "%")),
        ("GPU Power Draw", or_na(snapshot.gpu_power_draw.map(|w| format!("{:.1}", w)), " W")),
        ("GPU Free Memory", or_na(snapshot.gpu_free_memory.map(format_bytes), "")),
    ];
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value)]);
    }
    table
}

/// Per (model, resolution) timing table
pub fn summary_table(summary: &Summary) -> Option<Table> {
    let report = summary.report()?;

    let mut table = new_table();
    table.set_header(header(&["Model", "Resolution", "Images", "Failed", "Mean (s)", "Sum (s)"]));

    for group in &report.groups {
        let failed = if group.failed > 0 {
            Cell::new(group.failed).fg(Color::Red)
        } else {
            Cell::new(group.failed)
        };
        table.add_row(vec![
            Cell::new(&group.model),
            Cell::new(&group.resolution),
            Cell::new(group.images).set_alignment(CellAlignment::Right),
            failed.set_alignment(CellAlignment::Right),
            Cell::new(or_na(group.mean_secs.map(|s| format!("{:.2}", s)), ""))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", group.sum_secs)).set_alignment(CellAlignment::Right),
        ]);
    }
    Some(table)
}

fn verdict_line<K: Display>(label: &str, best: Option<&Average<K>>) -> String {
    match best.and_then(|b| b.average_secs.map(|avg| (&b.key, avg))) {
        Some((key, avg)) => format!("{}: {} (Average Time: {:.2} seconds)", label, key, avg),
        None => format!("{}: N/A (no successful predictions)", label),
    }
}

/// Verdict lines naming the fastest model and resolution
pub fn verdict_lines(summary: &Summary) -> Vec<String> {
    match summary.report() {
        Some(report) => vec![
            verdict_line("Best Model", report.best_model.as_ref()),
            verdict_line("Best Resolution", report.best_resolution.as_ref()),
        ],
        None => Vec::new(),
    }
}

pub fn print_summary(summary: &Summary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(summary)?),
        OutputFormat::Table => match summary_table(summary) {
            Some(table) => {
                println!();
                println!("{}", "Benchmark Results".bold());
                println!("{}", table);
                for line in verdict_lines(summary) {
                    println!("{}", line.green().bold());
                }
            }
            None => println!("{}", "No results to display. Benchmark was incomplete.".yellow()),
        },
    }
    Ok(())
}

/// Write every row as a JSON array
pub fn save_rows(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let content = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(())
}

/// Helper function to format bytes
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::{RowOutcome, MIB};
    use bench_runner::summarize;

    fn row(model: &str, resolution: &str, secs: f64) -> ResultRow {
        ResultRow {
            model: model.into(),
            resolution: resolution.into(),
            image: "a.jpg".to_string(),
            outcome: RowOutcome::Completed { elapsed_secs: secs },
            snapshot: ResourceSnapshot::unavailable(),
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(6 * 1024 * MIB), "6.0 GB");
    }

    #[test]
    fn test_stats_table_marks_unavailable_metrics() {
        let snapshot = ResourceSnapshot::unavailable().with_cpu_load(12.5);
        let rendered = stats_table(&snapshot).to_string();
        assert!(rendered.contains("12.5%"));
        assert!(rendered.contains("N/A"));
    }

    #[test]
    fn test_verdict_lines() {
        let summary = summarize(&[row("fast", "720p", 1.234), row("slow", "720p", 2.0)]);
        let lines = verdict_lines(&summary);
        assert_eq!(lines[0], "Best Model: fast (Average Time: 1.23 seconds)");
        assert_eq!(lines[1], "Best Resolution: 720p (Average Time: 1.62 seconds)");

        assert!(verdict_lines(&summarize(&[])).is_empty());
        assert!(summary_table(&summarize(&[])).is_none());
    }

    #[test]
    fn test_summary_table_has_a_row_per_group() {
        let summary = summarize(&[row("a", "720p", 1.0), row("a", "4k", 2.0)]);
        let rendered = summary_table(&summary).unwrap().to_string();
        assert!(rendered.contains("Mean (s)"));
        assert!(rendered.contains("4k"));
        assert!(rendered.contains("2.00"));
    }

    #[test]
    fn test_save_rows_writes_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        save_rows(&path, &[row("a", "720p", 1.0)]).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved[0]["outcome"]["status"], "completed");
        assert_eq!(saved[0]["model"], "a");
    }
}
