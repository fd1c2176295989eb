use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::order::Order;
use crate::fetching::core::{project_all, OrderSummary};
use crate::fetching::errors::FetchError;

// ============================================================================
// Fetch Strategies
// ============================================================================
//
// The same logical fetch, four ways. Each one trades repository reuse
// against query specialization differently.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Aggregates with associations touched one by one (N+1).
    DirectExposure,
    /// Lazy root query, lookups, then projection (N+1).
    PostMap,
    /// One join-fetch query, then projection.
    FetchJoined,
    /// Query already shaped like the transfer form.
    DirectProjection,
}

impl FetchStrategy {
    pub const ALL: [FetchStrategy; 4] = [
        FetchStrategy::DirectExposure,
        FetchStrategy::PostMap,
        FetchStrategy::FetchJoined,
        FetchStrategy::DirectProjection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::DirectExposure => "direct_exposure",
            FetchStrategy::PostMap => "post_map",
            FetchStrategy::FetchJoined => "fetch_joined",
            FetchStrategy::DirectProjection => "direct_projection",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct" | "direct_exposure" => Ok(FetchStrategy::DirectExposure),
            "post_map" => Ok(FetchStrategy::PostMap),
            "fetch_joined" | "joined" => Ok(FetchStrategy::FetchJoined),
            "projection" | "direct_projection" => Ok(FetchStrategy::DirectProjection),
            other => Err(format!("unknown fetch strategy: {}", other)),
        }
    }
}

/// What a strategy hands back. Aggregates stay inside the process;
/// [`FetchResult::into_summaries`] is the way out.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Aggregates(Vec<Order>),
    Summaries(Vec<OrderSummary>),
}

impl FetchResult {
    pub fn len(&self) -> usize {
        match self {
            FetchResult::Aggregates(orders) => orders.len(),
            FetchResult::Summaries(summaries) => summaries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order ids in result order.
    pub fn ids(&self) -> Vec<i64> {
        match self {
            FetchResult::Aggregates(orders) => orders.iter().map(|o| o.id).collect(),
            FetchResult::Summaries(summaries) => summaries.iter().map(|s| s.id).collect(),
        }
    }

    pub fn into_summaries(self) -> Result<Vec<OrderSummary>, FetchError> {
        match self {
            FetchResult::Aggregates(orders) => project_all(&orders),
            FetchResult::Summaries(summaries) => Ok(summaries),
        }
    }
}
