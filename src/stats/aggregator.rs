//! Fan-out/fan-in aggregation of independent sources.
//!
//! Every registered source is fetched concurrently and every outcome is kept:
//! a failing source becomes an error entry instead of aborting the whole call,
//! so a dashboard can still be rendered when one service is down.

use futures::future::{join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceResult<T> {
    Data(T),
    Error(String),
}

impl<T> SourceResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceResult::Data(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            SourceResult::Data(data) => Some(data),
            SourceResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SourceResult::Data(_) => None,
            SourceResult::Error(message) => Some(message),
        }
    }
}

/// One entry per requested source, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationResult<T> {
    entries: BTreeMap<String, SourceResult<T>>,
}

impl<T> AggregationResult<T> {
    pub fn get(&self, source: &str) -> Option<&SourceResult<T>> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceResult<T>)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.iter()
            .filter_map(|(name, result)| result.data().map(|data| (name, data)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(name, result)| result.error().map(|message| (name, message)))
    }

    pub fn has_failures(&self) -> bool {
        self.entries.values().any(|result| !result.is_ok())
    }
}

type DeferredFetch<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, String>> + Send + 'a>;

/// Collects named fetch operations and runs them together.
pub struct Aggregator<'a, T> {
    sources: Vec<(String, DeferredFetch<'a, T>)>,
}

impl<'a, T: Send + 'a> Default for Aggregator<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Send + 'a> Aggregator<'a, T> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source. Registering the same name twice replaces the earlier
    /// fetch, so every name appears exactly once in the result. Nothing is
    /// invoked before [`Aggregator::run`].
    pub fn source<F, Fut, E>(mut self, name: impl Into<String>, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
        E: Display + Send + 'a,
    {
        let name = name.into();
        let deferred: DeferredFetch<'a, T> = Box::new(move || {
            let pending = fetch();
            async move { pending.await.map_err(|e| e.to_string()) }.boxed()
        });

        match self.sources.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = deferred,
            None => self.sources.push((name, deferred)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run every fetch concurrently and wait until all have settled.
    pub async fn run(self) -> AggregationResult<T> {
        debug!("Aggregating {} sources", self.sources.len());

        let settled = join_all(
            self.sources
                .into_iter()
                .map(|(name, fetch)| {
                    let pending = fetch();
                    async move { (name, pending.await) }
                }),
        )
        .await;

        let entries = settled
            .into_iter()
            .map(|(name, outcome)| {
                let result = match outcome {
                    Ok(data) => SourceResult::Data(data),
                    Err(message) => {
                        warn!("Source {} failed: {}", name, message);
                        SourceResult::Error(message)
                    }
                };
                (name, result)
            })
            .collect();

        AggregationResult { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_partial_failure_keeps_every_key() {
        let sources = ["staff", "applicants", "events", "certificates", "library"];

        let mut aggregator = Aggregator::new();
        for name in sources {
            aggregator = aggregator.source(name, move || async move {
                if name == "events" {
                    Err("timeout".to_string())
                } else {
                    Ok(json!({"total": 1}))
                }
            });
        }

        let result = aggregator.run().await;

        assert_eq!(result.len(), 5);
        assert_eq!(
            result.get("events"),
            Some(&SourceResult::Error("timeout".to_string()))
        );
        for name in ["staff", "applicants", "certificates", "library"] {
            assert_eq!(result.get(name), Some(&SourceResult::Data(json!({"total": 1}))));
        }

        let serialized = serde_json::to_value(&result).unwrap();
        assert_eq!(serialized["events"], json!({"error": "timeout"}));
        assert_eq!(serialized["library"], json!({"data": {"total": 1}}));
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let result = Aggregator::<Value>::new()
            .source("a", || async { Err::<Value, _>("down") })
            .source("b", || async { Err::<Value, _>("refused") })
            .run()
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(result.failures().count(), 2);
        assert_eq!(result.successes().count(), 0);
        assert!(result.has_failures());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_does_not_drop_fast_ones() {
        let started = tokio::time::Instant::now();

        let result = Aggregator::new()
            .source("slow", || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, String>(3)
            })
            .source("fast", || async { Ok::<_, String>(1) })
            .source("medium", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(2)
            })
            .run()
            .await;

        assert_eq!(result.get("fast"), Some(&SourceResult::Data(1)));
        assert_eq!(result.get("medium"), Some(&SourceResult::Data(2)));
        assert_eq!(result.get("slow"), Some(&SourceResult::Data(3)));
        // Concurrent: bounded by the slowest source, not the sum.
        assert!(started.elapsed() < Duration::from_secs(35));
    }

    #[tokio::test]
    async fn test_duplicate_name_replaces_source() {
        let aggregator = Aggregator::new()
            .source("staff", || async { Err::<u32, _>("old") })
            .source("staff", || async { Ok::<u32, String>(7) });
        assert_eq!(aggregator.len(), 1);

        let result = aggregator.run().await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("staff"), Some(&SourceResult::Data(7)));
    }

    #[tokio::test]
    async fn test_fetches_are_invoked_only_by_run() {
        let replaced_calls = Arc::new(AtomicUsize::new(0));
        let kept_calls = Arc::new(AtomicUsize::new(0));

        let replaced = Arc::clone(&replaced_calls);
        let kept = Arc::clone(&kept_calls);
        let aggregator = Aggregator::new()
            .source("staff", move || {
                replaced.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, String>(1) }
            })
            .source("staff", move || {
                kept.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, String>(2) }
            });

        assert_eq!(kept_calls.load(Ordering::SeqCst), 0);

        let result = aggregator.run().await;
        assert_eq!(result.get("staff"), Some(&SourceResult::Data(2)));
        assert_eq!(kept_calls.load(Ordering::SeqCst), 1);
        assert_eq!(replaced_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_aggregation() {
        let result = Aggregator::<Value>::new().run().await;
        assert!(result.is_empty());
        assert!(!result.has_failures());
    }
}
