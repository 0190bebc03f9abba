//! `dependencies` command
//!
//! Prints the transaction services each cache of a container would
//! request, without consulting any environment.

use std::fmt::Write as _;

use serde::Serialize;

use crate::cli::args::{DependenciesArgs, OutputFormat};
use crate::container::{CacheDependencies, plan_dependencies};
use crate::error::CacheTxError;
use crate::resolver::{RequiredCollaborator, TransactionMode};

/// Run the `dependencies` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(args: &DependenciesArgs) -> Result<(), CacheTxError> {
    let config = super::load_container(&args.config)?;
    let plan = plan_dependencies(&config);

    let rendered = match args.format {
        OutputFormat::Human => render_human(&plan),
        OutputFormat::Json => render_json(&plan)?,
    };
    print!("{rendered}");
    Ok(())
}

fn render_human(plan: &[CacheDependencies]) -> String {
    let mut out = String::new();
    for deps in plan {
        let needs = if deps.uses_embedded_manager() {
            "embedded transaction manager".to_string()
        } else if deps.required.is_empty() {
            "nothing".to_string()
        } else {
            deps.required
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &deps.mode {
            Ok(mode) => {
                let _ = writeln!(out, "{}: {mode} -> {needs}", deps.cache);
            }
            Err(err) => {
                let _ = writeln!(out, "{}: invalid ({err})", deps.cache);
            }
        }
    }
    out
}

#[derive(Serialize)]
struct DependencyReport<'a> {
    cache: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<TransactionMode>,
    requires: Vec<RequiredCollaborator>,
    embedded_manager: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn render_json(plan: &[CacheDependencies]) -> Result<String, CacheTxError> {
    let reports: Vec<DependencyReport<'_>> = plan
        .iter()
        .map(|deps| DependencyReport {
            cache: &deps.cache,
            mode: deps.mode.as_ref().ok().copied(),
            requires: deps.required.iter().copied().collect(),
            embedded_manager: deps.uses_embedded_manager(),
            error: deps.mode.as_ref().err().map(ToString::to_string),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&reports)? + "\n")
}
