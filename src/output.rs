//! Output and Reporting
//!
//! Renders [`ValidationResults`] as a human-readable report, a one-line
//! summary or JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error_reporter::VerbosityLevel;
use crate::validator::{NodeStatus, NodeValidationResult, ValidationResults};

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Human,
    Json,
    Summary,
}

/// Formatter for validation results
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    max_failures: usize,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel, max_failures: usize) -> Self {
        Self {
            format,
            verbosity,
            max_failures,
            show_colors: false,
        }
    }

    /// Wrap status labels in ANSI colors
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn render(&self, results: &ValidationResults) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(results),
            OutputFormat::Summary => Ok(self.format_one_line(results)),
            OutputFormat::Human => Ok(self.format_results(results)),
        }
    }

    fn format_one_line(&self, results: &ValidationResults) -> String {
        format!(
            "{} nodes: {} valid, {} discarded, {} failed ({})",
            results.total_nodes,
            results.valid_nodes,
            results.discarded_nodes,
            results.failed_nodes,
            format_duration(results.duration)
        )
    }

    pub fn format_results(&self, results: &ValidationResults) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            if results.has_errors() {
                output.push_str(&format!("Failed: {}\n", results.failed_nodes));
            }
            return output;
        }

        output.push_str(&self.format_summary(results));

        let mut shown = 0;
        for result in &results.node_results {
            let listed = match result.status {
                NodeStatus::Failed { .. } => true,
                NodeStatus::Discarded => self.verbosity >= VerbosityLevel::Verbose,
                NodeStatus::Valid => self.verbosity == VerbosityLevel::Debug,
            };
            if !listed {
                continue;
            }
            if result.status.is_failed() {
                if shown == self.max_failures {
                    continue;
                }
                shown += 1;
            }
            output.push_str(&self.format_node_result(result));
            output.push('\n');
        }
        if results.failed_nodes > shown {
            output.push_str(&format!(
                "  ... {} more failures\n",
                results.failed_nodes - shown
            ));
        }

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str(&self.format_debug_info(results));
        }
        output
    }

    pub fn format_node_result(&self, result: &NodeValidationResult) -> String {
        match &result.status {
            NodeStatus::Valid => format!("{}  {}", self.colorize("✓ VALID", "32"), result.path),
            NodeStatus::Discarded => {
                format!("{}  {}", self.colorize("- DISCARDED", "36"), result.path)
            }
            NodeStatus::Failed { kind, message } => {
                let mut output = format!(
                    "{}  {} - {}",
                    self.colorize("✗ FAILED", "31"),
                    result.path,
                    message
                );
                if self.verbosity >= VerbosityLevel::Verbose {
                    output.push_str(&format!(" [{}]", kind));
                }
                output
            }
        }
    }

    fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total nodes: {}\n", results.total_nodes));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            results.valid_nodes
        ));
        if results.discarded_nodes > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Discarded:", "36"),
                results.discarded_nodes
            ));
        }
        if results.failed_nodes > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Failed:", "31"),
                results.failed_nodes
            ));
        }
        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!("  Duration: {}\n", format_duration(results.duration)));
        output
    }

    fn format_debug_info(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("\nDeferred Requests:\n");
        output.push_str(&format!("  Pending: {}\n", results.pending_requests));
        output.push_str(&format!("  Pruned: {}\n", results.pruned_requests));
        output
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn create_test_results() -> ValidationResults {
        let failures = (0..3).map(|i| {
            NodeValidationResult::failed(
                format!("/rt:routing/route[{}]", i),
                "route".to_string(),
                ValidationError::DuplicateInstance {
                    element: "route".to_string(),
                    parent: "routing".to_string(),
                },
            )
        });
        let mut nodes = vec![
            NodeValidationResult::valid("/rt:routing".to_string(), "routing".to_string()),
            NodeValidationResult::discarded("/rt:routing/id".to_string(), "id".to_string()),
        ];
        nodes.extend(failures);
        ValidationResults::aggregate(nodes, Duration::from_millis(120)).with_queue(2, 1)
    }

    #[test]
    fn test_output_summary() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Normal, 50);
        let formatted = output.render(&create_test_results()).unwrap();

        assert!(formatted.contains("Validation Summary:"));
        assert!(formatted.contains("Total nodes: 5"));
        assert!(formatted.contains("Discarded: 1"));
        assert!(formatted.contains("✗ FAILED  /rt:routing/route[2] - Duplicate instance of \"route\" in \"routing\""));
        assert!(!formatted.contains("DISCARDED  /rt:routing/id"));
        assert!(!formatted.contains("Pending"));
    }

    #[test]
    fn test_failure_limit() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Normal, 1);
        let formatted = output.format_results(&create_test_results());

        assert_eq!(formatted.matches("✗ FAILED").count(), 1);
        assert!(formatted.contains("... 2 more failures"));
    }

    #[test]
    fn test_verbose_and_debug() {
        let verbose = Output::new(OutputFormat::Human, VerbosityLevel::Verbose, 50)
            .format_results(&create_test_results());
        assert!(verbose.contains("- DISCARDED  /rt:routing/id"));
        assert!(verbose.contains("[duplicate-instance]"));

        let debug = Output::new(OutputFormat::Human, VerbosityLevel::Debug, 50)
            .format_results(&create_test_results());
        assert!(debug.contains("✓ VALID  /rt:routing"));
        assert!(debug.contains("Pending: 2"));
        assert!(debug.contains("Pruned: 1"));
    }

    #[test]
    fn test_quiet() {
        let quiet = Output::new(OutputFormat::Human, VerbosityLevel::Quiet, 50);
        assert_eq!(quiet.format_results(&create_test_results()), "Failed: 3\n");
        assert_eq!(quiet.format_results(&ValidationResults::default()), "");
    }

    #[test]
    fn test_summary_and_json_formats() {
        let results = create_test_results();
        let line = Output::new(OutputFormat::Summary, VerbosityLevel::Normal, 50)
            .render(&results)
            .unwrap();
        assert_eq!(line, "5 nodes: 1 valid, 1 discarded, 3 failed (120ms)");

        let json = Output::new(OutputFormat::Json, VerbosityLevel::Normal, 50)
            .render(&results)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failed_nodes"], 3);
        assert_eq!(value["node_results"][1]["status"], "discarded");
    }

    #[test]
    fn test_colors() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Normal, 50).with_colors(true);
        assert_eq!(output.colorize("Valid:", "32"), "\x1b[32mValid:\x1b[0m");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
