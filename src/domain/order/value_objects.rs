use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::OrderError;
use crate::domain::customer::Address;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Line of an order. `order_price` is the catalog price captured when the
/// order was placed and is never re-read from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub item_id: i64,
    order_price: i64,
    count: i32,
}

impl LineItem {
    pub fn new(id: i64, item_id: i64, order_price: i64, count: i32) -> Result<Self, OrderError> {
        if count <= 0 {
            return Err(OrderError::InvalidQuantity(count));
        }
        if order_price < 0 {
            return Err(OrderError::NegativePrice(order_price));
        }

        Ok(Self {
            id,
            item_id,
            order_price,
            count,
        })
    }

    pub fn order_price(&self) -> i64 {
        self.order_price
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn total_price(&self) -> i64 {
        self.order_price * i64::from(self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// Status only ever moves forward: placed orders may be canceled,
    /// canceled orders stay canceled.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!((self, next), (OrderStatus::Placed, OrderStatus::Canceled))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLACED" => Ok(OrderStatus::Placed),
            "CANCELED" | "CANCELLED" => Ok(OrderStatus::Canceled),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Ready,
    Completed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Ready => "READY",
            DeliveryStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READY" => Ok(DeliveryStatus::Ready),
            "COMPLETED" | "COMP" => Ok(DeliveryStatus::Completed),
            _ => Err(OrderError::UnknownDeliveryStatus(s.to_string())),
        }
    }
}

/// Delivery owned 1:1 by an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: i64,
    pub address: Address,
    pub status: DeliveryStatus,
}

// ============================================================================
// Unit Tests
// ============================================================================
