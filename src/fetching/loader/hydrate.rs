use crate::domain::customer::{Address, Customer};
use crate::domain::order::{Delivery, DeliveryStatus, LineItem, Order, OrderStatus};
use crate::fetching::core::{Association, FetchPlan, OrderSummary};
use crate::fetching::errors::DecodeError;
use crate::fetching::store::schema as col;
use crate::fetching::store::Row;

// ============================================================================
// Row Hydration - store rows to domain values
// ============================================================================

/// Order root with every association left unresolved.
pub fn order(row: &Row) -> Result<Order, DecodeError> {
    Ok(Order::new(
        row.int(col::ORDER_ID)?,
        order_status(row)?,
        row.timestamp(col::ORDERED_AT)?,
        row.int(col::CUSTOMER_ID)?,
        row.int(col::DELIVERY_ID)?,
    ))
}

/// Order root plus the to-one associations `plan` joined into the same row.
pub fn joined_order(row: &Row, plan: &FetchPlan) -> Result<Order, DecodeError> {
    let mut order = order(row)?;

    if plan.is_join_fetched(Association::Customer) {
        let customer = customer(row, order.customer.id())?;
        order.customer.fill(customer);
    }
    if plan.is_join_fetched(Association::Delivery) {
        let delivery = delivery(row, order.delivery.id())?;
        order.delivery.fill(delivery);
    }
    if plan.is_join_fetched(Association::LineItems) {
        order.line_items.fill(Vec::new());
    }

    Ok(order)
}

pub fn customer(row: &Row, id: i64) -> Result<Customer, DecodeError> {
    Ok(Customer::new(
        id,
        row.text(col::CUSTOMER_NAME)?,
        address(row, col::CUSTOMER_LINE1, col::CUSTOMER_LINE2, col::CUSTOMER_ZIP)?,
    ))
}

pub fn delivery(row: &Row, id: i64) -> Result<Delivery, DecodeError> {
    let status = row
        .text(col::DELIVERY_STATUS)?
        .parse::<DeliveryStatus>()
        .map_err(|e| DecodeError::new(col::DELIVERY_STATUS, e.to_string()))?;

    Ok(Delivery {
        id,
        address: address(row, col::DELIVERY_LINE1, col::DELIVERY_LINE2, col::DELIVERY_ZIP)?,
        status,
    })
}

/// `None` when a left join found no item for the order.
pub fn line_item(row: &Row) -> Result<Option<LineItem>, DecodeError> {
    let Some(id) = row.opt_int(col::LINE_ITEM_ID)? else {
        return Ok(None);
    };

    let count = i32::try_from(row.int(col::ITEM_COUNT)?)
        .map_err(|e| DecodeError::new(col::ITEM_COUNT, e.to_string()))?;

    LineItem::new(id, row.int(col::ITEM_ID)?, row.int(col::ORDER_PRICE)?, count)
        .map(Some)
        .map_err(|e| DecodeError::new(col::LINE_ITEM_ID, e.to_string()))
}

/// Transfer shape straight from a summary-select row.
pub fn summary(row: &Row) -> Result<OrderSummary, DecodeError> {
    Ok(OrderSummary {
        id: row.int(col::ORDER_ID)?,
        customer_name: row.text(col::CUSTOMER_NAME)?.to_string(),
        ordered_at: row.timestamp(col::ORDERED_AT)?,
        status: order_status(row)?,
        address: address(row, col::DELIVERY_LINE1, col::DELIVERY_LINE2, col::DELIVERY_ZIP)?,
    })
}

fn order_status(row: &Row) -> Result<OrderStatus, DecodeError> {
    row.text(col::ORDER_STATUS)?
        .parse::<OrderStatus>()
        .map_err(|e| DecodeError::new(col::ORDER_STATUS, e.to_string()))
}

fn address(row: &Row, line1: &str, line2: &str, zip: &str) -> Result<Address, DecodeError> {
    Ok(Address::new(
        row.text(line1)?,
        row.opt_text(line2)?,
        row.text(zip)?,
    ))
}
