//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check and BOM removal
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing
//! 4. Deserialization to typed config
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::Path;
use std::sync::Arc;

use serde_yaml::Value;

use crate::config::schema::ContainerConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Origin reported for configurations loaded from memory.
const INLINE_ORIGIN: &str = "<inline>";

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,
}

/// Limits that keep a configuration file within sane bounds.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of caches in one container.
    pub max_caches: usize,

    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_caches: env_or("CACHETX_MAX_CACHES", 1000),
            max_config_size: env_or("CACHETX_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<ContainerConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file and returns the frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - An environment reference cannot be expanded
    /// - YAML parsing or deserialization fails
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        // Checked before reading so an oversized file is never loaded.
        self.check_size(usize::try_from(metadata.len()).unwrap_or(usize::MAX))?;

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: None,
            message: format!("cannot read file: {e}"),
        })?;

        self.load_source(&raw, path)
    }

    /// Loads a configuration from an in-memory YAML document.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_from_str(&self, yaml: &str) -> Result<LoadResult, ConfigError> {
        self.load_source(yaml, Path::new(INLINE_ORIGIN))
    }

    fn check_size(&self, size: usize) -> Result<(), ConfigError> {
        let max = self.options.config_limits.max_config_size;
        if size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }
        Ok(())
    }

    fn load_source(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        self.check_size(raw.len())?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::default();
        let substituted = env_sub.substitute(raw, path)?;
        let mut warnings = env_sub.warnings;

        let root: Value = serde_yaml::from_str(&substituted).map_err(|e| parse_error(path, &e))?;
        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Configuration file is empty".to_string(),
            });
        }

        // Re-parse from text rather than from `root` so errors keep their line.
        let config: ContainerConfig =
            serde_yaml::from_str(&substituted).map_err(|e| parse_error(path, &e))?;

        let validation = Validator::new().validate(&config, &self.options.config_limits);
        if validation.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: validation.errors,
            });
        }

        warnings.extend(validation.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path).filter(|p| !p.is_empty()),
        }));

        tracing::debug!(
            container = %config.container.name,
            caches = config.caches.len(),
            warnings = warnings.len(),
            "configuration loaded"
        );

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

fn parse_error(path: &Path, err: &serde_yaml::Error) -> ConfigError {
    ConfigError::ParseError {
        path: path.to_path_buf(),
        line: err.location().map(|l| l.line()),
        message: err.to_string(),
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Supports:
/// - `${VAR}` - value, or empty string with a warning when unset
/// - `${VAR:-default}` - `default` when unset
/// - `${VAR:?message}` - error when unset
/// - `$$` - literal `$`
#[derive(Debug, Default)]
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    fn substitute(&mut self, raw: &str, source: &Path) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(idx) = rest.find('$') {
            out.push_str(&rest[..idx]);
            let after = &rest[idx + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let Some(end) = body.find('}') else {
                    let offset = raw.len() - rest.len() + idx;
                    return Err(ConfigError::ParseError {
                        path: source.to_path_buf(),
                        line: Some(raw[..offset].matches('\n').count() + 1),
                        message: "unterminated '${' expression".to_string(),
                    });
                };
                out.push_str(&self.expand(&body[..end], source)?);
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = after;
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn expand(&mut self, reference: &str, source: &Path) -> Result<String, ConfigError> {
        // The name ends at the first ':'; the next character picks the form.
        let (name, fallback) = match reference.split_once(':') {
            Some((name, rest)) => {
                if let Some(default) = rest.strip_prefix('-') {
                    (name, Fallback::Default(default))
                } else if let Some(message) = rest.strip_prefix('?') {
                    (name, Fallback::Required(message))
                } else {
                    (reference, Fallback::Empty)
                }
            }
            None => (reference, Fallback::Empty),
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::ParseError {
                path: source.to_path_buf(),
                line: None,
                message: format!("invalid environment variable name '{name}'"),
            });
        }

        if let Ok(value) = std::env::var(name) {
            return Ok(value);
        }

        match fallback {
            Fallback::Default(default) => Ok(default.to_string()),
            Fallback::Required(message) => Err(ConfigError::EnvVarNotSet {
                var: name.to_string(),
                location: if message.is_empty() {
                    source.display().to_string()
                } else {
                    message.to_string()
                },
            }),
            Fallback::Empty => {
                self.warnings.push(LoadWarning {
                    message: format!(
                        "Environment variable '{name}' is not set, using empty string"
                    ),
                    location: Some(source.display().to_string()),
                });
                Ok(String::new())
            }
        }
    }
}

/// What to do when a referenced variable is unset.
enum Fallback<'a> {
    Default(&'a str),
    Required(&'a str),
    Empty,
}

/// Reads a numeric limit from the environment, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn substitute(raw: &str) -> Result<(String, Vec<LoadWarning>), ConfigError> {
        let mut sub = EnvSubstitution::default();
        let out = sub.substitute(raw, Path::new("test.yaml"))?;
        Ok((out, sub.warnings))
    }

    #[test]
    fn load_minimal_config() {
        let result = ConfigLoader::with_defaults()
            .load_from_str("container:\n  name: web\ncaches:\n  a: {}\n")
            .unwrap();
        assert_eq!(result.config.container.name, "web");
        assert_eq!(result.config.caches.len(), 1);
    }

    #[test]
    fn empty_document_rejected() {
        let err = ConfigLoader::with_defaults()
            .load_from_str("# nothing here\n")
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn bom_is_stripped() {
        let result = ConfigLoader::with_defaults()
            .load_from_str("\u{feff}container:\n  name: web\n")
            .unwrap();
        assert_eq!(result.config.container.name, "web");
    }

    #[test]
    fn syntax_error_reports_line() {
        let err = ConfigLoader::with_defaults()
            .load_from_str("container:\n  name: [web\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { line: Some(_), .. }), "{err:?}");
    }

    #[test]
    fn validation_errors_abort_loading() {
        let yaml = "container:\n  name: web\ncaches:\n  a:\n    transaction:\n      mode: XA\n";
        let err = ConfigLoader::with_defaults().load_from_str(yaml).unwrap_err();
        let ConfigError::ValidationError { errors, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "caches.a.transaction.mode");
    }

    #[test]
    fn validation_warnings_are_returned() {
        let yaml = "container:\n  name: web\ncaches:\n  a:\n    transaction:\n      mode: FULL_XA\n";
        let result = ConfigLoader::with_defaults().load_from_str(yaml).unwrap();
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.location.as_deref() == Some("caches.a.transaction.mode"))
        );
    }

    #[test]
    fn oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.yaml");
        std::fs::write(&path, "container:\n  name: web\n").unwrap();

        let loader = ConfigLoader::new(LoaderOptions {
            config_limits: ConfigLimits {
                max_caches: 10,
                max_config_size: 4,
            },
        });
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "file_size"));
    }

    #[test]
    fn missing_file_reported() {
        let err = ConfigLoader::with_defaults()
            .load(Path::new("/nonexistent/cachetx/container.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn substitution_literal_dollar() {
        let (out, warnings) = substitute("price: $$5 and $x").unwrap();
        assert_eq!(out, "price: $5 and $x");
        assert!(warnings.is_empty());
    }

    #[test]
    fn substitution_default_used_when_unset() {
        let (out, _) = substitute("mode: ${CACHETX_TEST_SURELY_UNSET_1:-BATCH}").unwrap();
        assert_eq!(out, "mode: BATCH");
    }

    #[test]
    fn substitution_unset_without_default_warns() {
        let (out, warnings) = substitute("mode: '${CACHETX_TEST_SURELY_UNSET_2}'").unwrap();
        assert_eq!(out, "mode: ''");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("CACHETX_TEST_SURELY_UNSET_2"));
    }

    #[test]
    fn substitution_required_fails_when_unset() {
        let err = substitute("tm: ${CACHETX_TEST_SURELY_UNSET_3:?transaction manager name}")
            .unwrap_err();
        let ConfigError::EnvVarNotSet { var, location } = err else {
            panic!("expected EnvVarNotSet");
        };
        assert_eq!(var, "CACHETX_TEST_SURELY_UNSET_3");
        assert_eq!(location, "transaction manager name");
    }

    #[test]
    fn substitution_reads_set_variable() {
        // PATH is set in any environment that can run the test binary.
        let (out, _) = substitute("p: ${PATH}").unwrap();
        assert_ne!(out, "p: ");
    }

    #[test]
    fn substitution_unterminated_reports_line() {
        let err = substitute("a: 1\nb: ${OOPS\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { line: Some(2), .. }), "{err:?}");
    }

    #[test]
    fn substitution_rejects_bad_names() {
        assert!(substitute("x: ${not a name}").is_err());
        assert!(substitute("x: ${}").is_err());
    }

    #[test]
    fn substitution_form_chosen_at_first_colon() {
        let err = substitute("tm: ${CACHETX_TEST_SURELY_UNSET_5:?see docs:-x}").unwrap_err();
        let ConfigError::EnvVarNotSet { var, location } = err else {
            panic!("expected EnvVarNotSet, got {err:?}");
        };
        assert_eq!(var, "CACHETX_TEST_SURELY_UNSET_5");
        assert_eq!(location, "see docs:-x");

        let (out, _) = substitute("m: ${CACHETX_TEST_SURELY_UNSET_6:-a:?b}").unwrap();
        assert_eq!(out, "m: a:?b");
    }

    #[test]
    fn inline_source_size_limited() {
        let loader = ConfigLoader::new(LoaderOptions {
            config_limits: ConfigLimits {
                max_caches: 10,
                max_config_size: 8,
            },
        });
        let err = loader
            .load_from_str("container:\n  name: web\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "file_size"));
    }

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("CACHETX_TEST_SURELY_UNSET_4", 7usize), 7);
    }
}
