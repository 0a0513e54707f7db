mod backup;
mod catalog;
mod chat_config;
mod config;
mod error;
mod fetch;
mod http;
mod pipeline;
mod topology;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "chatstack",
    about = "Self-hosted chat stack operations — model catalog sync + compose topology"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Sync the chat configuration against the latest model listing, with
    /// backup and rollback
    Update {
        /// Path to the tool config file
        #[arg(short, long, default_value = "chatstack.toml")]
        config: PathBuf,
    },

    /// Dry run: fetch the listing and report what would change, guaranteeing
    /// the working directory is left untouched
    Check {
        /// Path to the tool config file
        #[arg(short, long, default_value = "chatstack.toml")]
        config: PathBuf,
    },

    /// Fetch the model listing and write it to disk, nothing else
    Fetch {
        /// Path to the tool config file
        #[arg(short, long, default_value = "chatstack.toml")]
        config: PathBuf,

        /// Output path (defaults to paths.models_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the docker-compose service topology
    Topology {
        /// Path to the tool config file
        #[arg(short, long, default_value = "chatstack.toml")]
        config: PathBuf,

        /// Output path for the rendered compose file
        #[arg(short, long, default_value = "docker-compose.yml")]
        output: PathBuf,
    },
}

/// Missing tool config is not an error: every setting has a default and the
/// tool is meant to run from the deployment directory as-is.
fn load_config(path: &Path) -> Result<config::Config> {
    if path.is_file() {
        Ok(config::Config::load(path)?)
    } else {
        Ok(config::Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatstack=info".parse().unwrap()),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Update { config } => {
            let cfg = load_config(&config)?;
            let source = pipeline::OpenRouterSource::new(&cfg)?;
            match pipeline::run_update(&cfg, &source).await {
                Ok(report) => {
                    println!("Backup created: {}", report.backup.display());
                    println!("Fetched {} models", report.models_fetched);
                    println!(
                        "Updated {} models, replaced {} invalid models, {} unresolved",
                        report.plan.updates(),
                        report.plan.replacements(),
                        report.plan.unresolved()
                    );
                    println!("Configuration updated successfully");
                    Ok(())
                }
                Err(e) => {
                    println!("Configuration update failed: {e}");
                    Err(e.into())
                }
            }
        }
        Command::Check { config } => {
            let cfg = load_config(&config)?;
            let source = pipeline::OpenRouterSource::new(&cfg)?;
            match pipeline::run_check(&cfg, &source).await {
                Ok(report) => {
                    println!("Fetched {} models", report.models_fetched);
                    println!(
                        "Would update {} models, replace {} invalid models, {} unresolved",
                        report.plan.updates(),
                        report.plan.replacements(),
                        report.plan.unresolved()
                    );
                    println!("Dry run complete, no changes were made");
                    Ok(())
                }
                Err(e) => {
                    println!("Dry run failed: {e}");
                    Err(e.into())
                }
            }
        }
        Command::Fetch { config, output } => {
            let cfg = load_config(&config)?;
            let http = http::HttpClient::new(concat!("chatstack/", env!("CARGO_PKG_VERSION")))?;
            let entries = fetch::fetch_entries(&http, &cfg.openrouter).await?;
            let path = output.unwrap_or_else(|| cfg.paths.models_file.clone());
            fetch::write_models_file(&path, &entries)?;
            let catalog = catalog::ModelCatalog::parse(&entries);
            println!(
                "Wrote {} models in {} categories to {}",
                catalog.model_count(),
                catalog.category_count(),
                path.display()
            );
            Ok(())
        }
        Command::Topology { config, output } => {
            let cfg = load_config(&config)?;
            topology::write(&cfg.topology, &output)?;
            println!("Topology rendered: {}", output.display());
            Ok(())
        }
    }
}
