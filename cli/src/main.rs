mod commands;
mod config;
mod server;
mod usda;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{cmd_add, cmd_log, cmd_logs, cmd_search};
use crate::config::{Config, ConfigArgs};
use crate::usda::UsdaClient;
use nutrilog_core::service::{NutriService, NutritionProvider};

#[derive(Parser)]
#[command(
    name = "nutrilog",
    version,
    about = "Food search and meal logging backend",
    long_about = "Food search and meal logging backend.\n\nFood lookups are served from a \
                  local store and fall back to USDA FoodData Central on a miss."
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "NUTRILOG_PORT", default_value = "8000")]
        port: u16,
        /// Address to bind to
        #[arg(long, env = "NUTRILOG_BIND", default_value = "127.0.0.1")]
        bind: String,
        /// Origin allowed by CORS (`*` for any)
        #[arg(long, env = "NUTRILOG_CORS_ORIGIN", default_value = "http://localhost:3000")]
        cors_origin: String,
    },
    /// Search for a food, fetching from USDA on a local miss
    Search {
        /// Search query (case-insensitive substring)
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food item to the local store by hand
    Add {
        /// Food name
        name: String,
        /// Calories
        #[arg(long)]
        calories: f64,
        /// Protein in grams
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Carbohydrates in grams
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fat in grams
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a meal
    Log {
        /// User the meal belongs to
        user_id: String,
        /// Food item ID
        food_id: i64,
        /// Quantity eaten
        quantity: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a user's meal logs
    Logs {
        /// User to list logs for
        user_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config)?;
    let service = Arc::new(NutriService::open(&config.food_db, &config.meal_log_db)?);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            cors_origin,
        } => {
            let provider: Arc<dyn NutritionProvider> = Arc::new(UsdaClient::from_config(&config)?);
            server::start_server(service, provider, &bind, port, &cors_origin).await
        }
        Commands::Search { query, json } => {
            let provider: Arc<dyn NutritionProvider> = Arc::new(UsdaClient::from_config(&config)?);
            cmd_search(&service, &provider, &query, json).await
        }
        Commands::Add {
            name,
            calories,
            protein,
            carbs,
            fat,
            json,
        } => cmd_add(&service, &name, calories, protein, carbs, fat, json),
        Commands::Log {
            user_id,
            food_id,
            quantity,
            json,
        } => cmd_log(&service, &user_id, food_id, quantity, json),
        Commands::Logs { user_id, json } => cmd_logs(&service, &user_id, json),
    }
}
