use chrono::{DateTime, Utc};

use super::value_objects::{Delivery, LineItem, OrderStatus};
use crate::domain::customer::Customer;

// ============================================================================
// Association Slot
// ============================================================================
//
// A reference from the aggregate to a related record. The foreign key is
// always known; the value is present only once something has resolved it,
// either through a join-fetch or through a lookup in the unit of work.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Ref<T> {
    id: i64,
    value: Option<T>,
}

impl<T> Ref<T> {
    pub fn unloaded(id: i64) -> Self {
        Self { id, value: None }
    }

    pub fn loaded(id: i64, value: T) -> Self {
        Self {
            id,
            value: Some(value),
        }
    }

    /// Foreign key of the referenced record.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    pub fn fill(&mut self, value: T) {
        self.value = Some(value);
    }
}

// ============================================================================
// Order Aggregate
// ============================================================================

/// Order aggregate root. It owns its delivery and line items and refers
/// to a customer it does not own.
///
/// Not `Serialize`: aggregates go through
/// [`crate::fetching::OrderSummary`] before leaving the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub customer: Ref<Customer>,
    pub delivery: Ref<Delivery>,
    /// Keyed by the order id itself.
    pub line_items: Ref<Vec<LineItem>>,
}

impl Order {
    /// Order as read from its own row, with every association unresolved.
    pub fn new(
        id: i64,
        status: OrderStatus,
        ordered_at: DateTime<Utc>,
        customer_id: i64,
        delivery_id: i64,
    ) -> Self {
        Self {
            id,
            status,
            ordered_at,
            customer: Ref::unloaded(customer_id),
            delivery: Ref::unloaded(delivery_id),
            line_items: Ref::unloaded(id),
        }
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.customer.is_loaded() && self.delivery.is_loaded() && self.line_items.is_loaded()
    }

    /// Sum of line totals, `None` while the items are unresolved.
    pub fn total_price(&self) -> Option<i64> {
        self.line_items
            .get()
            .map(|items| items.iter().map(LineItem::total_price).sum())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Address;
    use crate::domain::order::DeliveryStatus;

    fn address() -> Address {
        Address::new("1 Main St", None, "04524")
    }

    #[test]
    fn test_new_order_is_unresolved() {
        let order = Order::new(7, OrderStatus::Placed, Utc::now(), 3, 9);

        assert_eq!(order.customer.id(), 3);
        assert_eq!(order.delivery.id(), 9);
        assert_eq!(order.line_items.id(), 7);
        assert!(!order.customer.is_loaded());
        assert!(!order.is_fully_resolved());
        assert_eq!(order.total_price(), None);
    }

    #[test]
    fn test_fully_resolved_order() {
        let mut order = Order::new(7, OrderStatus::Placed, Utc::now(), 3, 9);
        order.customer.fill(Customer::new(3, "Kim A", address()));
        order.delivery.fill(Delivery {
            id: 9,
            address: address(),
            status: DeliveryStatus::Ready,
        });
        order.line_items.fill(vec![
            LineItem::new(1, 100, 10_000, 2).unwrap(),
            LineItem::new(2, 101, 2_500, 1).unwrap(),
        ]);

        assert!(order.is_fully_resolved());
        assert_eq!(order.total_price(), Some(22_500));
    }
}
