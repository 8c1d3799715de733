use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use nutrilog_core::service::NutritionProvider;
use nutrilog_core::usda::SearchResponse;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the USDA FoodData Central search API.
pub struct UsdaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rt: tokio::runtime::Handle,
}

impl UsdaClient {
    /// Must be called from inside a tokio runtime.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("nutrilog/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.usda_base_url,
            config.usda_api_key.clone(),
            config.provider_timeout,
        )
    }

    /// Raw `foods` array of one search. Errors carry no URL so the key never leaks.
    pub async fn search_async(&self, query: &str) -> Result<Vec<Value>> {
        let url = format!("{}/foods/search", self.base_url);
        debug!(query, "querying USDA FoodData Central");

        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("query", query)])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to reach USDA FoodData Central")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("USDA FoodData Central returned {status}");
        }

        let data: SearchResponse = resp
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to parse USDA search response")?;

        Ok(data.foods)
    }
}

impl NutritionProvider for UsdaClient {
    fn search(&self, query: &str) -> Result<Vec<Value>> {
        self.rt.block_on(self.search_async(query))
    }
}
