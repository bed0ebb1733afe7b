//! ZViewer launcher entry point.

use std::process::ExitCode;

use clap::Parser;

use zviewer_launcher::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    zviewer_launcher::cli::run::execute(&cli).await
}
