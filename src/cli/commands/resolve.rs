//! `resolve` command
//!
//! Loads a container file, resolves every cache against the services its
//! environment declares, and prints the outcome.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::ContainerConfig;
use crate::container::{ContainerResolution, resolve_container};
use crate::environment::ServiceEnvironment;
use crate::error::CacheTxError;
use crate::observability::EventEmitter;
use crate::resolver::mode::suggest;
use crate::resolver::{EngineTransactionMode, ResolvedTransactionConfig};

/// Run the `resolve` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the selected
/// cache does not exist, or any cache fails to resolve.
pub fn run(args: &ResolveArgs) -> Result<(), CacheTxError> {
    let mut config = super::load_container(&args.config)?;
    if let Some(name) = &args.cache {
        config = Arc::new(select_cache(&config, name)?);
    }

    let environment = ServiceEnvironment::from_config(&config.environment);
    let events = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let resolution = resolve_container(&config, &environment, &events);

    let rendered = match args.format {
        OutputFormat::Human => render_human(&resolution),
        OutputFormat::Json => render_json(&resolution)?,
    };
    print!("{rendered}");

    into_result(resolution)
}

/// Narrows `config` to the single cache `name`.
fn select_cache(config: &ContainerConfig, name: &str) -> Result<ContainerConfig, CacheTxError> {
    let Some(cache) = config.caches.get(name) else {
        let declared: Vec<&str> = config.caches.keys().map(String::as_str).collect();
        let hint = suggest(name, &declared)
            .map(|s| format!(" (did you mean '{s}'?)"))
            .unwrap_or_default();
        return Err(CacheTxError::Usage(format!(
            "no cache named '{name}' in container '{}'{hint}",
            config.container.name
        )));
    };

    let mut narrowed = config.clone();
    narrowed.caches = std::iter::once((name.to_string(), cache.clone())).collect();
    Ok(narrowed)
}

/// A lone failing cache surfaces its own error; otherwise failures are
/// summarised per container.
fn into_result(resolution: ContainerResolution) -> Result<(), CacheTxError> {
    if resolution.is_success() {
        return Ok(());
    }

    let failed = resolution.failed_count();
    let total = resolution.caches.len();
    if total == 1
        && let Some(Err(err)) = resolution.caches.into_iter().next().map(|c| c.outcome)
    {
        return Err(err.into());
    }

    Err(CacheTxError::ContainerFailed {
        container: resolution.container,
        failed,
        total,
    })
}

fn render_human(resolution: &ContainerResolution) -> String {
    let mut out = format!("container {}\n", resolution.container);
    for cache in &resolution.caches {
        match &cache.outcome {
            Ok(resolved) => {
                let _ = writeln!(out, "  {}: {}", cache.cache, describe(resolved));
            }
            Err(err) => {
                let _ = writeln!(out, "  {}: FAILED ({err})", cache.cache);
            }
        }
    }
    let _ = writeln!(
        out,
        "{} resolved, {} failed",
        resolution.resolved_count(),
        resolution.failed_count()
    );
    out
}

fn describe(resolved: &ResolvedTransactionConfig) -> String {
    let engine = match resolved.engine_mode() {
        EngineTransactionMode::Transactional => "transactional",
        EngineTransactionMode::NonTransactional => "non-transactional",
    };
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    format!(
        "{} ({engine}) locking={} stop-timeout={}ms synchronization={} recovery={} manager={} registry={}",
        resolved.mode(),
        resolved.locking(),
        resolved.stop_timeout_ms(),
        yes_no(resolved.use_synchronization()),
        yes_no(resolved.recovery_enabled()),
        resolved.transaction_manager().map_or("-", |h| h.name()),
        resolved.synchronization_registry().map_or("-", |h| h.name()),
    )
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    container: &'a str,
    caches: Vec<CacheReport<'a>>,
    summary: Summary,
}

#[derive(Serialize)]
struct CacheReport<'a> {
    cache: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a ResolvedTransactionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_mode: Option<EngineTransactionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Summary {
    resolved: usize,
    failed: usize,
}

fn render_json(resolution: &ContainerResolution) -> Result<String, CacheTxError> {
    let caches = resolution
        .caches
        .iter()
        .map(|cache| match &cache.outcome {
            Ok(resolved) => CacheReport {
                cache: &cache.cache,
                config: Some(resolved),
                engine_mode: Some(resolved.engine_mode()),
                kind: None,
                error: None,
            },
            Err(err) => CacheReport {
                cache: &cache.cache,
                config: None,
                engine_mode: None,
                kind: Some(err.kind()),
                error: Some(err.to_string()),
            },
        })
        .collect();

    let report = ResolveReport {
        container: &resolution.container,
        caches,
        summary: Summary {
            resolved: resolution.resolved_count(),
            failed: resolution.failed_count(),
        },
    };
    Ok(serde_json::to_string_pretty(&report)? + "\n")
}
