// ============================================================================
// Fetching - N+1-aware data access for the order aggregate
// ============================================================================
//
// Layers, innermost first:
// - core:   criteria, fetch plans, aggregation and projection (no I/O)
// - store:  the query execution boundary and its implementations
// - loader: query generation, hydration and the unit of work
//
// The repository module composes these into the fetch strategies.
//
// ============================================================================

pub mod core;
pub mod errors;
pub mod loader;
pub mod store;

pub use self::core::{Association, Criteria, FetchPlan, OrderSummary, SearchFilter};
pub use errors::{DecodeError, FetchError, QueryShapeError};
pub use loader::{FetchStats, UnitOfWork};
pub use store::{MemoryStore, PgStore, Store, StoreError};
