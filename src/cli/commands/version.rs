//! Version information display
//!
//! Prints version metadata in human or JSON format.

use crate::cli::args::{OutputFormat, VersionArgs};

/// Print version information.
pub fn run(args: &VersionArgs) {
    println!("{}", render(args.format));
}

fn render(format: OutputFormat) -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match format {
        OutputFormat::Human => format!("{name} {version}"),
        OutputFormat::Json => serde_json::json!({ "name": name, "version": version }).to_string(),
    }
}
