// ============================================================================
// Fetching Core - store-agnostic query and result shaping
// ============================================================================
//
// Nothing in here performs I/O:
// - criteria:   search filter -> predicate fragments + bound parameters
// - plan:       which associations are join-fetched, and shape validation
// - aggregator: folding one-to-many join rows back into parents
// - projection: resolved aggregate -> transfer shape
//
// ============================================================================

pub mod criteria;
pub mod plan;
pub mod aggregator;
pub mod projection;

pub use criteria::{escape_like, Criteria, Predicate, SearchFilter};
pub use plan::{Association, FetchPlan};
pub use aggregator::fold;
pub use projection::{project, project_all, OrderSummary, SUMMARY_ASSOCIATIONS};
