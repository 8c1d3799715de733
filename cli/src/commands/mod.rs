mod helpers;
mod log;
mod search;

use std::sync::Arc;

use anyhow::{Context, Result};

use nutrilog_core::models::FoodItem;
use nutrilog_core::service::{NutriService, NutritionProvider};

pub(crate) use log::{cmd_log, cmd_logs};
pub(crate) use search::{cmd_add, cmd_search};

/// Run the local-then-provider lookup on a blocking thread.
///
/// The provider is synchronous and drives its own requests on the runtime handle,
/// so it must not be called from an async task directly.
pub(crate) async fn search_and_cache(
    service: &Arc<NutriService>,
    provider: &Arc<dyn NutritionProvider>,
    query: String,
) -> Result<Vec<FoodItem>> {
    let service = Arc::clone(service);
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || service.search_foods(provider.as_ref(), &query))
        .await
        .context("food search task failed")?
}
