//! `cachetx` - resolve cache transaction configuration from the command line

use clap::Parser;

use cachetx::cli::args::Cli;
use cachetx::cli::commands;
use cachetx::error::ExitCode;
use cachetx::observability::{describe_metrics, init_logging};

fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }
    describe_metrics();

    match commands::dispatch(cli) {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            for issue in e.issues() {
                eprintln!("  {issue}");
            }
            std::process::exit(e.exit_code());
        }
    }
}
