use clap::{Parser, Subcommand};
use happy_cli::commands::modes::Flavor;
use happy_cli::commands::validate::RecordKind;

#[derive(Parser)]
#[command(name = "happy-state", about = "Inspect and replay Happy session state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a record and print its normalized form
    Validate {
        #[arg(long, value_enum)]
        kind: RecordKind,
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        file: String,
    },

    /// Apply a JSON-lines log of sync updates and summarize the result
    Replay {
        #[arg(default_value = "-")]
        file: String,
    },

    /// List the permission and model modes offered per agent flavor
    Modes {
        #[arg(long, value_enum)]
        flavor: Option<Flavor>,
    },

    /// Show diagnostics information
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { kind, file } => happy_cli::commands::validate::run(kind, &file),
        Commands::Replay { file } => happy_cli::commands::replay::run(&file),
        Commands::Modes { flavor } => happy_cli::commands::modes::run(flavor),
        Commands::Doctor => happy_cli::commands::doctor::run(),
    }
}
