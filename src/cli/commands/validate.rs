//! `validate` command
//!
//! Loads each file through the full configuration pipeline and reports
//! every error and warning found, without resolving anything.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{CacheTxError, ConfigError, Severity, ValidationIssue};

/// Run the `validate` command.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationFailed`] if any file is invalid.
pub fn run(args: &ValidateArgs) -> Result<(), CacheTxError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| validate_file(&loader, path, args.strict))
        .collect();

    let rendered = match args.format {
        OutputFormat::Human => render_human(&reports),
        OutputFormat::Json => render_json(&reports)?,
    };
    print!("{rendered}");

    let invalid = reports.iter().filter(|r| !r.valid).count();
    if invalid > 0 {
        return Err(ConfigError::ValidationFailed { count: invalid }.into());
    }
    Ok(())
}

/// Validation outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

fn validate_file(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating configuration");

    let (mut errors, mut warnings) = match loader.load(path) {
        Ok(result) => {
            let warnings = result
                .warnings
                .into_iter()
                .map(|w| ValidationIssue {
                    path: w.location.unwrap_or_default(),
                    message: w.message,
                    severity: Severity::Warning,
                })
                .collect();
            (Vec::new(), warnings)
        }
        Err(ConfigError::ValidationError { errors, .. }) => (errors, Vec::new()),
        Err(other) => (
            vec![ValidationIssue {
                path: String::new(),
                message: other.to_string(),
                severity: Severity::Error,
            }],
            Vec::new(),
        ),
    };

    if strict {
        errors.extend(warnings.drain(..).map(|issue| ValidationIssue {
            severity: Severity::Error,
            ..issue
        }));
    }

    FileReport {
        path: path.display().to_string(),
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn render_human(reports: &[FileReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let status = if report.valid { "valid" } else { "invalid" };
        let _ = writeln!(out, "{}: {status}", report.path);
        for issue in report.errors.iter().chain(&report.warnings) {
            let _ = writeln!(out, "  {issue}");
        }
    }
    let invalid = reports.iter().filter(|r| !r.valid).count();
    let _ = writeln!(out, "{} file(s) checked, {invalid} invalid", reports.len());
    out
}

#[derive(Serialize)]
struct ValidateReport<'a> {
    files: &'a [FileReport],
    summary: ValidateSummary,
}

#[derive(Serialize)]
struct ValidateSummary {
    total: usize,
    valid: usize,
    invalid: usize,
}

fn render_json(reports: &[FileReport]) -> Result<String, CacheTxError> {
    let valid = reports.iter().filter(|r| r.valid).count();
    let report = ValidateReport {
        files: reports,
        summary: ValidateSummary {
            total: reports.len(),
            valid,
            invalid: reports.len() - valid,
        },
    };
    Ok(serde_json::to_string_pretty(&report)? + "\n")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const WARNS: &str = "container:\n  name: web\ncaches:\n  orders:\n    transaction:\n      mode: FULL_XA\n";

    #[test]
    fn valid_file_with_warning() {
        let file = yaml_file(WARNS);
        let report = validate_file(&ConfigLoader::with_defaults(), file.path(), false);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path, "caches.orders.transaction.mode");
    }

    #[test]
    fn strict_promotes_warnings() {
        let file = yaml_file(WARNS);
        let report = validate_file(&ConfigLoader::with_defaults(), file.path(), true);
        assert!(!report.valid);
        assert!(report.warnings.is_empty());
        assert_eq!(report.errors[0].severity, Severity::Error);
    }

    #[test]
    fn invalid_attributes_listed() {
        let file = yaml_file(
            "container:\n  name: web\ncaches:\n  a:\n    transaction:\n      mode: XA\n      stop-timeout: -5\n",
        );
        let report = validate_file(&ConfigLoader::with_defaults(), file.path(), false);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn missing_file_is_invalid() {
        let report = validate_file(
            &ConfigLoader::with_defaults(),
            Path::new("/nonexistent/container.yaml"),
            false,
        );
        assert!(!report.valid);
        assert!(report.errors[0].message.contains("file not found"));
    }

    #[test]
    fn json_summary_counts() {
        let good = yaml_file(WARNS);
        let loader = ConfigLoader::with_defaults();
        let reports = vec![
            validate_file(&loader, good.path(), false),
            validate_file(&loader, Path::new("/nonexistent.yaml"), false),
        ];
        let json: serde_json::Value = serde_json::from_str(&render_json(&reports).unwrap()).unwrap();
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["valid"], 1);
        assert_eq!(json["summary"]["invalid"], 1);
        assert_eq!(json["files"][0]["warnings"][0]["severity"], "warning");
    }

    #[test]
    fn human_output_lists_issues() {
        let file = yaml_file(WARNS);
        let reports = vec![validate_file(&ConfigLoader::with_defaults(), file.path(), false)];
        let out = render_human(&reports);
        assert!(out.contains(": valid\n"));
        assert!(out.contains("  warning: Mode FULL_XA requires a transaction manager"));
        assert!(out.ends_with("1 file(s) checked, 0 invalid\n"));
    }
}
