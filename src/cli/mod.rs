//! Command-line surface of the launcher.
//!
//! There are no subcommands or positional arguments: flags choose what part
//! of the stack runs. Flag combinations are validated by [`selection`] rather
//! than clap so the rejection message names the conflicting flags.

pub mod output;
pub mod run;
pub mod selection;

use std::path::PathBuf;

use clap::Parser;

pub use selection::CliError;

#[derive(Parser, Debug, Default)]
#[command(name = "zviewer-launcher")]
#[command(about = "Start the ZViewer development stack in dependency order", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Run only the Flutter client
    #[arg(long)]
    pub client_only: bool,

    /// Run only the server side (storage, API, selected services)
    #[arg(long)]
    pub server_only: bool,

    /// Do not start the PostgreSQL container
    #[arg(long)]
    pub no_db: bool,

    /// Start every optional microservice
    #[arg(long)]
    pub all: bool,

    /// Also start the media service
    #[arg(long)]
    pub media: bool,

    /// Also start the comments service
    #[arg(long)]
    pub comments: bool,

    /// Also start the payments service
    #[arg(long)]
    pub payments: bool,

    /// Also start the admin service
    #[arg(long)]
    pub admin: bool,

    /// Additional configuration file, merged over zviewer.yaml
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ZVIEWER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Print the running summary as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Report a failure that happened before or outside the supervised run.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
}
