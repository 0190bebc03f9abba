//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod dependencies;
pub mod resolve;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, ContainerConfig};
use crate::error::CacheTxError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub fn dispatch(cli: Cli) -> Result<(), CacheTxError> {
    match cli.command {
        Commands::Resolve(args) => resolve::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Dependencies(args) => dependencies::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads and validates a container file, logging loader warnings.
fn load_container(path: &Path) -> Result<Arc<ContainerConfig>, CacheTxError> {
    tracing::info!(config = %path.display(), "loading configuration");
    let result = ConfigLoader::with_defaults().load(path)?;

    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    Ok(result.config)
}
