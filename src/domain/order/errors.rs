// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Unknown delivery status: {0}")]
    UnknownDeliveryStatus(String),

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Order price cannot be negative: {0}")]
    NegativePrice(i64),
}
