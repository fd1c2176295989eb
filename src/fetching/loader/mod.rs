// ============================================================================
// Association Loader
// ============================================================================
//
// Turns criteria and a fetch plan into one root query, runs it through a
// unit of work, and resolves whatever the plan left lazy:
// - sql:          query text and structured shape for the store
// - hydrate:      store rows to domain values
// - unit_of_work: row cap, deadline, and the per-request association cache
//
// ============================================================================

pub mod sql;
pub mod hydrate;
pub mod unit_of_work;

pub use unit_of_work::{FetchStats, RowSet, UnitOfWork};
