use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fetching::errors::QueryShapeError;

// ============================================================================
// Fetch Plan - which associations ride along in the root query
// ============================================================================

/// Direct associations of the order aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    Customer,
    Delivery,
    LineItems,
}

impl Association {
    pub fn as_str(&self) -> &'static str {
        match self {
            Association::Customer => "customer",
            Association::Delivery => "delivery",
            Association::LineItems => "line_items",
        }
    }

    /// Joining a to-many association yields one row per child.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Association::LineItems)
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Associations resolved by join in the root query. Everything not listed
/// is left for lazy resolution through the unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    joins: Vec<Association>,
}

impl FetchPlan {
    /// Root rows only.
    pub fn lazy() -> Self {
        Self::default()
    }

    /// Customer and delivery in the same round trip.
    pub fn to_one() -> Self {
        Self::lazy()
            .join_fetch(Association::Customer)
            .join_fetch(Association::Delivery)
    }

    /// Customer, delivery and line items; rows must be folded.
    pub fn with_items() -> Self {
        Self::to_one().join_fetch(Association::LineItems)
    }

    pub fn join_fetch(mut self, association: Association) -> Self {
        self.joins.push(association);
        self
    }

    pub fn joins(&self) -> &[Association] {
        &self.joins
    }

    pub fn is_join_fetched(&self, association: Association) -> bool {
        self.joins.contains(&association)
    }

    /// True when the query multiplies parent rows and the result has to go
    /// through the collection aggregator.
    pub fn needs_fold(&self) -> bool {
        self.joins.iter().any(Association::is_to_many)
    }

    pub fn validate(&self) -> Result<(), QueryShapeError> {
        let collections: Vec<Association> = self
            .joins
            .iter()
            .copied()
            .filter(Association::is_to_many)
            .collect();

        if collections.len() > 1 {
            return Err(QueryShapeError::MultipleCollections {
                associations: collections,
            });
        }

        Ok(())
    }
}
