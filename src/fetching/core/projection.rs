use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::Association;
use crate::domain::customer::Address;
use crate::domain::order::{Order, OrderStatus};
use crate::fetching::errors::FetchError;

// ============================================================================
// Projection Mapper - aggregate to transfer shape
// ============================================================================

/// Flattened, read-only view of an order for external exchange.
/// Recomputed on every query; it has no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    pub customer_name: String,
    pub ordered_at: DateTime<Utc>,
    pub status: OrderStatus,
    /// Delivery destination.
    pub address: Address,
}

/// Associations [`project`] reads.
pub const SUMMARY_ASSOCIATIONS: [Association; 2] = [Association::Customer, Association::Delivery];

/// Pure mapping over already-resolved fields. It never fetches: an
/// unresolved association means the caller skipped a load it was
/// responsible for, and is reported as an unexpected extra fetch.
pub fn project(order: &Order) -> Result<OrderSummary, FetchError> {
    let customer = order.customer.get().ok_or(FetchError::UnexpectedExtraFetch {
        association: Association::Customer,
        order_id: order.id,
    })?;
    let delivery = order.delivery.get().ok_or(FetchError::UnexpectedExtraFetch {
        association: Association::Delivery,
        order_id: order.id,
    })?;

    Ok(OrderSummary {
        id: order.id,
        customer_name: customer.name.clone(),
        ordered_at: order.ordered_at,
        status: order.status,
        address: delivery.address.clone(),
    })
}

impl TryFrom<&Order> for OrderSummary {
    type Error = FetchError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        project(order)
    }
}

pub fn project_all(orders: &[Order]) -> Result<Vec<OrderSummary>, FetchError> {
    orders.iter().map(project).collect()
}
