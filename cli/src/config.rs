use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use directories::ProjectDirs;

pub const DEFAULT_USDA_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// Store and provider settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Food store location (path, `sqlite://` URL, or `:memory:`)
    #[arg(long, env = "NUTRILOG_FOOD_DB", global = true)]
    pub food_db: Option<String>,
    /// Meal-log store location (path, `sqlite://` URL, or `:memory:`)
    #[arg(long, env = "NUTRILOG_MEAL_LOG_DB", global = true)]
    pub meal_log_db: Option<String>,
    /// USDA FoodData Central API key
    #[arg(
        long,
        env = "USDA_API_KEY",
        default_value = "DEMO_KEY",
        hide_env_values = true,
        global = true
    )]
    pub usda_api_key: String,
    /// USDA FoodData Central base URL
    #[arg(long, env = "USDA_BASE_URL", default_value = DEFAULT_USDA_BASE_URL, global = true)]
    pub usda_base_url: String,
    /// Request timeout for the nutrition provider, in seconds
    #[arg(
        long,
        env = "NUTRILOG_PROVIDER_TIMEOUT_SECS",
        default_value = "30",
        global = true
    )]
    pub provider_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub food_db: String,
    pub meal_log_db: String,
    pub usda_api_key: String,
    pub usda_base_url: String,
    pub provider_timeout: Duration,
}

impl Config {
    /// Resolve store locations, falling back to the per-user data directory.
    pub fn load(args: ConfigArgs) -> Result<Self> {
        let (food_db, meal_log_db) = match (args.food_db, args.meal_log_db) {
            (Some(food), Some(logs)) => (food, logs),
            (food, logs) => {
                let data_dir = data_dir()?;
                (
                    food.unwrap_or_else(|| path_string(data_dir.join("foods.db"))),
                    logs.unwrap_or_else(|| path_string(data_dir.join("meal_logs.db"))),
                )
            }
        };

        Ok(Config {
            food_db,
            meal_log_db,
            usda_api_key: args.usda_api_key,
            usda_base_url: args.usda_base_url,
            provider_timeout: Duration::from_secs(args.provider_timeout_secs),
        })
    }
}

fn data_dir() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "nutrilog").context("Could not determine home directory")?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir)
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(food_db: Option<&str>, meal_log_db: Option<&str>) -> ConfigArgs {
        ConfigArgs {
            food_db: food_db.map(str::to_string),
            meal_log_db: meal_log_db.map(str::to_string),
            usda_api_key: "key".to_string(),
            usda_base_url: DEFAULT_USDA_BASE_URL.to_string(),
            provider_timeout_secs: 12,
        }
    }

    #[test]
    fn explicit_locations_are_kept() {
        let config = Config::load(args(Some(":memory:"), Some("sqlite://logs.db"))).unwrap();
        assert_eq!(config.food_db, ":memory:");
        assert_eq!(config.meal_log_db, "sqlite://logs.db");
        assert_eq!(config.usda_api_key, "key");
        assert_eq!(config.provider_timeout, Duration::from_secs(12));
    }
}
