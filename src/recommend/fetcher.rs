//! Parallel recommendation fan-out.
//!
//! Enabled categories are fetched independently, each under its own
//! timeout. A category whose call fails or times out yields `None` and
//! the run continues with the others.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::cloud::CloudApi;
use crate::recommend::types::{Recommendation, RecommendationQuery};
use crate::sp::types::SpCategory;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn fetch_recommendations(
    cloud: &dyn CloudApi,
    queries: Vec<RecommendationQuery>,
    timeout: Duration,
) -> BTreeMap<SpCategory, Option<Recommendation>> {
    let fetches = queries.into_iter().map(|query| async move {
        let category = query.category;

        match tokio::time::timeout(timeout, cloud.purchase_recommendation(query)).await {
            Err(_) => {
                warn!(
                    category = %category,
                    timeout_ms = timeout.as_millis() as u64,
                    "recommendation fetch timed out"
                );
                (category, None)
            }
            Ok(Err(e)) => {
                warn!(category = %category, error = %e, "recommendation fetch failed");
                (category, None)
            }
            Ok(Ok(recommendation)) => {
                debug!(
                    category = %category,
                    suggested = recommendation.is_some(),
                    "recommendation fetched"
                );
                (category, recommendation)
            }
        }
    });

    join_all(fetches).await.into_iter().collect()
}
