// ============================================================================
// Customer Domain
// ============================================================================
//
// Customers are referenced by orders (many-to-one) and resolved either by
// join-fetch or by a cached point lookup inside a unit of work.
//
// ============================================================================

pub mod value_objects;
pub mod aggregate;

pub use value_objects::*;
pub use aggregate::*;
