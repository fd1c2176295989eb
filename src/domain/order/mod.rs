// ============================================================================
// Order Domain - Order Aggregate and its Owned Records
// ============================================================================
//
// - Value objects (LineItem, OrderStatus, Delivery, DeliveryStatus)
// - Errors (OrderError enum)
// - Aggregate (Order with its association slots)
//
// Nothing here mutates state after construction; this module only
// describes what a fetch materializes.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
