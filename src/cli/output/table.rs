//! Table output formatting for CLI commands
//!
//! Renders search reports and flow results using comfy-table.

use crate::domain::models::{FlowResult, FmaxReport, MetricValue, ReportOutcome, SearchPhase};
use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::env;

/// Result entries shown for the best run. Everything else stays in the
/// report file.
pub const BEST_RESULT_SUBSET: &[&str] = &[
    "clock_period",
    "clock_frequency",
    "wns",
    "lut",
    "ff",
    "slice",
];

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Summary of a finished search: how it ended, then the best result.
    pub fn format_report(&self, report: &FmaxReport) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Fmax search").add_attribute(Attribute::Bold),
            Cell::new(format!("{} / {}", report.design, report.flow)).add_attribute(Attribute::Bold),
        ]);

        let outcome = match report.best_frequency() {
            Some(freq) => format!("{freq:.3} MHz"),
            None => "no successful result".to_string(),
        };
        let outcome_cell = if self.use_colors {
            Cell::new(outcome).fg(outcome_color(report.outcome))
        } else {
            Cell::new(outcome)
        };
        table.add_row(vec![Cell::new("Fmax"), outcome_cell]);

        let phase_cell = if self.use_colors {
            Cell::new(report.phase).fg(phase_color(report.phase))
        } else {
            Cell::new(report.phase)
        };
        table.add_row(vec![Cell::new("Ended"), phase_cell]);
        if let Some(reason) = &report.abort_reason {
            table.add_row(vec![Cell::new("Reason"), Cell::new(truncate_text(reason, 72))]);
        }
        table.add_row(vec![Cell::new("Iterations"), Cell::new(report.iterations)]);
        table.add_row(vec![
            Cell::new("Candidates tried"),
            Cell::new(report.candidates_tried),
        ]);
        table.add_row(vec![
            Cell::new("Runtime"),
            Cell::new(format!("{} minute(s)", report.runtime_minutes)),
        ]);
        if let Some(best) = &report.best {
            table.add_row(vec![Cell::new("Best run"), Cell::new(best.run_dir.display())]);
        }
        if let Some(path) = &report.path {
            table.add_row(vec![Cell::new("Report"), Cell::new(path.display())]);
        }

        let mut out = table.to_string();
        if let Some(best) = &report.best {
            out.push('\n');
            out.push_str(&self.format_results(&best.results, "Best Results", BEST_RESULT_SUBSET));
        }
        out
    }

    /// Flow result entries, restricted to `subset` unless it is empty.
    /// Private entries (leading `_`) are never shown.
    pub fn format_results(&self, results: &FlowResult, title: &str, subset: &[&str]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new(title).add_attribute(Attribute::Bold),
            Cell::new(""),
        ]);

        for (name, value) in results.entries() {
            if !subset.is_empty() && !subset.contains(&name.as_str()) {
                continue;
            }
            let alignment = match value {
                MetricValue::List(_) => CellAlignment::Left,
                _ => CellAlignment::Right,
            };
            table.add_row(vec![
                Cell::new(&name),
                Cell::new(value.to_string()).set_alignment(alignment),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if the terminal supports colors
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

const fn outcome_color(outcome: ReportOutcome) -> Color {
    match outcome {
        ReportOutcome::Found => Color::Green,
        ReportOutcome::NoSuccessfulResult => Color::Yellow,
    }
}

const fn phase_color(phase: SearchPhase) -> Color {
    match phase {
        SearchPhase::Converged => Color::Green,
        SearchPhase::Stagnated => Color::Yellow,
        SearchPhase::Aborted => Color::Red,
        SearchPhase::Searching => Color::Blue,
    }
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BestResult, Fingerprint, JobSettings};
    use chrono::Utc;
    use std::path::PathBuf;

    fn report(best: Option<BestResult>) -> FmaxReport {
        FmaxReport {
            design: "aes".to_string(),
            flow: "vivado_synth".to_string(),
            timestamp: "2024-03-05-142301123".to_string(),
            phase: SearchPhase::Converged,
            outcome: if best.is_some() {
                ReportOutcome::Found
            } else {
                ReportOutcome::NoSuccessfulResult
            },
            best,
            iterations: 7,
            runtime_minutes: 3,
            elapsed_seconds: 190.0,
            candidates_tried: 28,
            finished_at: Utc::now(),
            abort_reason: None,
            path: None,
        }
    }

    #[test]
    fn test_table_formatter_with_config() {
        let formatter = TableFormatter::with_config(false, Some(120));
        assert!(!formatter.use_colors);
        assert_eq!(formatter.max_width, Some(120));
    }

    #[test]
    fn test_format_results_subset() {
        let results = FlowResult::new(true, 0.012, 4.0)
            .with_metric("lut", 1234_i64)
            .with_metric("dsp", 4_i64)
            .with_metric("_internal", "hidden");

        let formatter = TableFormatter::with_config(false, None);
        let out = formatter.format_results(&results, "Best Results", BEST_RESULT_SUBSET);
        assert!(out.contains("Best Results"));
        assert!(out.contains("lut"));
        assert!(out.contains("1234"));
        assert!(out.contains("4.000000"));
        assert!(!out.contains("dsp"));
        assert!(!out.contains("_internal"));
    }

    #[test]
    fn test_format_report_with_best() {
        let best = BestResult::new(
            250.0,
            FlowResult::new(true, 0.0, 4.0),
            JobSettings::default(),
            Fingerprint::from_hex("0123456789abcdef0123456789abcdef"),
            PathBuf::from("fmax_run/aes/vivado_0123"),
        );
        let formatter = TableFormatter::with_config(false, None);
        let out = formatter.format_report(&report(Some(best)));
        assert!(out.contains("250.000 MHz"));
        assert!(out.contains("fmax_run/aes/vivado_0123"));
        assert!(out.contains("converged"));
        assert!(out.contains("Best Results"));
    }

    #[test]
    fn test_format_report_without_best() {
        let formatter = TableFormatter::with_config(false, None);
        let out = formatter.format_report(&report(None));
        assert!(out.contains("no successful result"));
        assert!(!out.contains("Best Results"));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("this is a long reason", 10), "this is...");
    }
}
