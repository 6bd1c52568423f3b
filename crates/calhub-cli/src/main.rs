use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "calhub", version, about = "Calhub calendar store CLI")]
struct Cli {
    /// Path to the store file (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query events in a date window as JSON
    Events(commands::events::EventsArgs),
    /// Manage suppression lists
    Ignore {
        #[command(subcommand)]
        action: commands::ignore::IgnoreAction,
    },
    /// Remove duplicate appointment rows
    Cleanup,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Events(args) => commands::events::run(args, cli.db),
        Commands::Ignore { action } => commands::ignore::run(action, cli.db),
        Commands::Cleanup => commands::cleanup::run(cli.db),
    };

    // Consumers parse stderr on failure; keep the payload structured.
    if let Err(e) = result {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        std::process::exit(1);
    }
}
