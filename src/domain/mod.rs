// ============================================================================
// Domain Layer
// ============================================================================
//
// Entities materialized by the fetching core. Each aggregate has its own
// subdirectory with value objects, errors and the aggregate itself.
//
// This layer knows nothing about stores, queries or units of work.
//
// ============================================================================

pub mod order;
pub mod customer;
