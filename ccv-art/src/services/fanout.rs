//! Fan-out coordinator
//!
//! Issues one popular and one timeless query to every configured source
//! concurrently (2M calls for M sources) and collects every outcome with
//! join-all semantics: a failing or slow source never blocks, cancels, or
//! aborts the others.

use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

use super::source_client::SourceClient;
use crate::models::{ArtKey, QueryKind, SourceOutcome};

/// Collected outcomes for one fan-out, split by sub-query kind.
///
/// Outcome order within a kind is not significant; outcomes are tagged with
/// their source identity.
#[derive(Debug)]
pub struct FanOutResult {
    pub popular: Vec<SourceOutcome>,
    pub timeless: Vec<SourceOutcome>,
}

impl FanOutResult {
    pub fn success_count(&self, kind: QueryKind) -> usize {
        let outcomes = match kind {
            QueryKind::Popular => &self.popular,
            QueryKind::Timeless => &self.timeless,
        };
        outcomes.iter().filter(|o| o.success).count()
    }

    /// Quorum: at least one success per sub-query kind. Sources are
    /// independent, so any single success is usable consensus input.
    pub fn quorum_met(&self) -> bool {
        self.success_count(QueryKind::Popular) >= 1
            && self.success_count(QueryKind::Timeless) >= 1
    }

    /// Failed outcomes across both kinds, for quorum-failure logging
    pub fn failures(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.popular
            .iter()
            .chain(self.timeless.iter())
            .filter(|o| !o.success)
    }
}

/// Runs all configured sources for both sub-queries of a key
pub struct FanOutCoordinator {
    sources: Vec<Arc<dyn SourceClient>>,
}

impl FanOutCoordinator {
    pub fn new(sources: Vec<Arc<dyn SourceClient>>) -> Self {
        Self { sources }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query every source for both kinds concurrently and await all outcomes.
    pub async fn query_all(&self, key: &ArtKey) -> FanOutResult {
        let mut calls = Vec::with_capacity(self.sources.len() * 2);
        for source in &self.sources {
            calls.push(source.query(QueryKind::Popular, key));
            calls.push(source.query(QueryKind::Timeless, key));
        }

        let outcomes = join_all(calls).await;

        let mut result = FanOutResult {
            popular: Vec::with_capacity(self.sources.len()),
            timeless: Vec::with_capacity(self.sources.len()),
        };
        for outcome in outcomes {
            match outcome.kind {
                QueryKind::Popular => result.popular.push(outcome),
                QueryKind::Timeless => result.timeless.push(outcome),
            }
        }

        info!(
            key = %key,
            popular_success = result.success_count(QueryKind::Popular),
            timeless_success = result.success_count(QueryKind::Timeless),
            sources = self.sources.len(),
            "Fan-out complete"
        );

        result
    }
}
