//! Shopkeep CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! shopkeep migrate
//!
//! # Load the demo catalog (seed/products.yaml)
//! shopkeep seed
//!
//! # Load a different catalog file
//! shopkeep seed --file path/to/products.yaml
//!
//! # Show the catalog
//! shopkeep products --category electronics
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert catalog products from YAML; existing ids are left alone
//! - `products` - Log the catalog, optionally filtered

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shopkeep_api::db::ProductFilter;

mod commands;

#[derive(Parser)]
#[command(name = "shopkeep")]
#[command(author, version, about = "Shopkeep CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the product catalog from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(short, long, default_value = "seed/products.yaml")]
        file: PathBuf,
    },
    /// List catalog products
    Products {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Text to look for in name, description or category
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of products (1-50)
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::products(&file).await?,
        Commands::Products {
            category,
            search,
            limit,
        } => {
            let filter = ProductFilter {
                category,
                search,
                limit,
            };
            commands::products::list(filter).await?;
        }
    }
    Ok(())
}
