use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cko")]
#[command(about = "Storefront checkout + payment reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Cache an order, prepare it with the backend, and print the gateway redirect
    Checkout {
        /// Path to a checkout draft JSON file (camelCase fields)
        #[arg(long)]
        order: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Replay a gateway return URL and drive reconciliation to its navigation
    Reconcile {
        /// Full return URL or path with query (e.g. /payment-success?order_id=AS_1)
        #[arg(long)]
        return_url: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Poll backend /health until it answers or the wait expires
    WaitBackend {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 60)]
        max_wait_secs: u64,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");
    commands::init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = cko_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Checkout {
            order,
            config_paths,
        } => commands::checkout::run(&order, &config_paths).await?,

        Commands::Reconcile {
            return_url,
            config_paths,
        } => commands::reconcile::run(&return_url, &config_paths).await?,

        Commands::WaitBackend {
            max_wait_secs,
            config_paths,
        } => commands::backend::wait(max_wait_secs, &config_paths).await?,
    }

    Ok(())
}
