//! auditview CLI
//!
//! Pages through exported audit logs in the terminal.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod audit;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::Result;

#[derive(Parser)]
#[command(name = "auditview")]
#[command(about = "View audit logs in a terminal pager", long_about = None)]
struct Cli {
    /// Log output format (logs go to stderr; filter with AUDITVIEW_LOG)
    #[arg(long, value_enum, default_value_t = logging::LogFormat::Pretty, global = true)]
    log_format: logging::LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the audit log of a secret or repository
    Audit(audit::AuditArgs),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    match cli.command {
        Commands::Audit(args) => audit::run(&args),
    }
}
