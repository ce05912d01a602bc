//! Statistics and health aggregation across services.

pub mod aggregator;

pub use aggregator::{AggregationResult, Aggregator, SourceResult};

use crate::api::{ApiClient, Service};
use serde_json::Value;

/// Fetch the statistics of every service that has them, tolerating failures.
pub async fn collect_statistics(client: &ApiClient) -> AggregationResult<Value> {
    Service::WITH_STATISTICS
        .into_iter()
        .fold(Aggregator::new(), |aggregator, service| {
            aggregator.source(service.name(), move || client.statistics(service))
        })
        .run()
        .await
}

/// Probe the health endpoint of every service.
pub async fn check_health(client: &ApiClient) -> AggregationResult<Value> {
    Service::ALL
        .into_iter()
        .fold(Aggregator::new(), |aggregator, service| {
            aggregator.source(service.name(), move || client.health(service))
        })
        .run()
        .await
}
