use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{ErrorKind, ValidationError};
use crate::validator::ValidationResults;

/// Verbosity levels for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard error information
    Normal,
    /// Show detailed error information with hints
    Verbose,
    /// Show all available debugging information
    Debug,
}

/// Error reporter with configurable verbosity
///
/// Diagnostics go through the `log` facade; validation results themselves
/// are returned by the engine and never depend on a logger being installed.
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
    show_error_kinds: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
            show_error_kinds: false,
        }
    }

    pub fn with_options(verbosity: VerbosityLevel, show_timestamps: bool, show_error_kinds: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
            show_error_kinds,
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Report the failure of the node at `path`
    pub fn report_failure(&self, path: &str, error: &ValidationError) {
        if let Some(message) = self.format_failure(path, error) {
            error!("{}", message);
        }
    }

    /// Report every failure of a pass, at most `limit` of them
    pub fn report_results(&self, results: &ValidationResults, limit: usize) {
        let mut reported = 0;
        for result in results.failures() {
            if reported == limit {
                warn!(
                    "{} more failures not shown",
                    results.failed_nodes.saturating_sub(limit)
                );
                break;
            }
            if let Some(error) = &result.error {
                self.report_failure(&result.path, error);
            }
            reported += 1;
        }
    }

    /// Report a configuration error
    pub fn report_config_error(&self, err: &ConfigError) {
        let formatted = match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", err),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!("Configuration Error: {}\n{}", err, config_help(err))
            }
            VerbosityLevel::Debug => {
                format!(
                    "Configuration Error: {}\nDebug: {:?}\n{}",
                    err,
                    err,
                    config_help(err)
                )
            }
        };
        error!("{}", formatted);
    }

    /// Render a failure for the current verbosity, `None` when it is not shown
    pub fn format_failure(&self, path: &str, error: &ValidationError) -> Option<String> {
        match self.verbosity {
            VerbosityLevel::Quiet => is_critical(error).then(|| format_brief(path, error)),
            VerbosityLevel::Normal => Some(self.format_normal(path, error)),
            VerbosityLevel::Verbose => Some(self.format_verbose(path, error)),
            VerbosityLevel::Debug => Some(self.format_debug(path, error)),
        }
    }

    fn format_normal(&self, path: &str, error: &ValidationError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };
        let kind = if self.show_error_kinds {
            format!("[{}] ", error.kind())
        } else {
            String::new()
        };
        format!("{}{}{}: {}", timestamp, kind, path, error)
    }

    fn format_verbose(&self, path: &str, error: &ValidationError) -> String {
        let mut output = self.format_normal(path, error);
        if let Some(element) = error.element() {
            output.push_str(&format!("\nElement: {}", element));
        }
        if let Some(hint) = hint(error) {
            output.push_str(&format!("\nSuggestion: {}", hint));
        }
        output
    }

    fn format_debug(&self, path: &str, error: &ValidationError) -> String {
        let mut output = self.format_verbose(path, error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }
        output
    }
}

/// Errors that point at misuse rather than at bad data
fn is_critical(error: &ValidationError) -> bool {
    matches!(error.kind(), ErrorKind::InvalidOptions | ErrorKind::Internal)
}

fn format_brief(path: &str, error: &ValidationError) -> String {
    format!("ERROR: {} ({})", path, error.kind())
}

fn hint(error: &ValidationError) -> Option<&'static str> {
    Some(match error {
        ValidationError::FeatureDisabled { .. } => "Enable the feature or remove the element",
        ValidationError::StateData { .. } => "State data is only allowed in get replies and plain data trees",
        ValidationError::OutOfOrder { .. } => "Reorder the arguments as declared in the schema",
        ValidationError::MisplacedKey { .. } => "List keys must come first, in declaration order",
        ValidationError::MissingElement { .. } | ValidationError::TooFew { .. } => {
            "Add the required instances"
        }
        ValidationError::TooMany { .. } => "Remove the extra instance",
        ValidationError::ConflictingCase { .. } => "Keep data of one case only",
        ValidationError::DuplicateInstance { .. } | ValidationError::NotUnique { .. } => {
            "Give every instance distinct values"
        }
        ValidationError::ObsoleteData { .. } | ValidationError::ObsoleteType { .. } => {
            "Migrate away from the obsolete definition"
        }
        ValidationError::DeferredResolutionFailed { .. } => "Check that the referenced data exists",
        ValidationError::ConflictingModes { .. } => "Select a single kind of data",
        ValidationError::Tree(_) => return None,
    })
}

fn config_help(err: &ConfigError) -> String {
    match err {
        ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
        ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
            "Check the configuration file syntax (TOML/JSON format expected)".to_string()
        }
        ConfigError::UnsupportedFormat(ext) => {
            format!("Rename the file to .toml or .json (found .{})", ext)
        }
        ConfigError::Validation(reason) | ConfigError::Environment(reason) => {
            format!("Fix the value: {}", reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolveError, TreeError};
    use crate::unres::RequestKind;

    fn missing() -> ValidationError {
        ValidationError::MissingElement {
            element: "name".to_string(),
            parent: "interface".to_string(),
        }
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(VerbosityLevel::Quiet < VerbosityLevel::Normal);
        assert!(VerbosityLevel::Verbose < VerbosityLevel::Debug);
        assert_eq!(ErrorReporter::new(VerbosityLevel::Debug).verbosity(), VerbosityLevel::Debug);
    }

    #[test]
    fn test_quiet_shows_only_critical() {
        let reporter = ErrorReporter::new(VerbosityLevel::Quiet);
        assert_eq!(reporter.format_failure("/if:interface", &missing()), None);

        let stale = ValidationError::Tree(TreeError::SchemaMismatch {
            to: "a".to_string(),
            from: "b".to_string(),
        });
        let brief = reporter.format_failure("/a", &stale).unwrap();
        assert_eq!(brief, "ERROR: /a (internal)");
    }

    #[test]
    fn test_timestamp_prefix() {
        let line = ErrorReporter::with_options(VerbosityLevel::Normal, true, false)
            .format_failure("/if:interface", &missing())
            .unwrap();
        // "[HH:MM:SS] " ahead of the path
        let (stamp, rest) = line.split_at(11);
        assert!(stamp.starts_with('[') && stamp.ends_with("] "));
        assert_eq!(stamp.matches(':').count(), 2);
        assert!(rest.starts_with("/if:interface: Missing required element"));
    }

    #[test]
    fn test_normal_and_verbose() {
        let normal = ErrorReporter::with_options(VerbosityLevel::Normal, false, true)
            .format_failure("/if:interface", &missing())
            .unwrap();
        assert_eq!(
            normal,
            "[missing-element] /if:interface: Missing required element \"name\" in \"interface\""
        );

        let verbose = ErrorReporter::new(VerbosityLevel::Verbose)
            .format_failure("/if:interface", &missing())
            .unwrap();
        assert!(verbose.contains("Element: name"));
        assert!(verbose.contains("Suggestion: Add the required instances"));
    }

    #[test]
    fn test_debug_includes_source_chain() {
        let error = ValidationError::DeferredResolutionFailed {
            element: "lower-layer".to_string(),
            request: RequestKind::Leafref,
            source: ResolveError::TargetNotFound {
                path: "/interfaces/interface[name='eth9']".to_string(),
            },
        };
        let debug = ErrorReporter::new(VerbosityLevel::Debug)
            .format_failure("/if:interfaces/lower-layer", &error)
            .unwrap();

        assert!(debug.contains("Debug Info: DeferredResolutionFailed"));
        assert!(debug.contains("Error Chain:\n  1: target \"/interfaces/interface[name='eth9']\" does not exist"));
    }

    #[test]
    fn test_timestamps() {
        let formatted = ErrorReporter::with_options(VerbosityLevel::Normal, true, false)
            .format_failure("/x", &missing())
            .unwrap();
        assert!(formatted.starts_with('['));
        assert_eq!(formatted.find(']'), Some(9));
    }

    #[test]
    fn test_config_help() {
        assert!(config_help(&ConfigError::UnsupportedFormat("yaml".to_string())).contains(".yaml"));
        assert!(config_help(&ConfigError::Validation("too big".to_string())).contains("too big"));
    }
}
