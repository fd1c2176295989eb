// ============================================================================
// Repository Facade
// ============================================================================
//
// OrderRepository exposes the aggregate finders and the four fetch
// strategies; OrderQueryRepository holds the single-purpose projection
// query. Callers outside the process only ever receive OrderSummary.
//
// ============================================================================

pub mod order_repository;
pub mod order_query_repository;
pub mod strategy;

pub use order_repository::OrderRepository;
pub use order_query_repository::OrderQueryRepository;
pub use strategy::{FetchResult, FetchStrategy};
