//! cellflow CLI - run notebook cell plans headlessly.

mod colors;
mod order;
mod plan;
mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cellflow")]
#[command(about = "Dependency-aware notebook cell runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan's cells
    Run {
        /// Path to the plan (.json file)
        plan: String,

        /// Run only a specific cell (and its prerequisites)
        #[arg(long)]
        cell: Option<String>,

        /// Re-run prerequisites even if they already succeeded
        #[arg(long)]
        force: bool,

        /// Per-cell timeout in milliseconds (overrides the plan)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the execution order without running anything
    Order {
        /// Path to the plan (.json file)
        plan: String,

        /// Resolve the order for a specific cell
        #[arg(long)]
        cell: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            plan,
            cell,
            force,
            timeout_ms,
        } => run::execute(&plan, cell.as_deref(), force, timeout_ms).await?,

        Commands::Order { plan, cell } => order::execute(&plan, cell.as_deref())?,
    }

    Ok(())
}
