// ============================================================================
// Store Interface - the only I/O boundary of the fetching core
// ============================================================================
//
// A store executes a parameterized query with a row cap, resolves a single
// related record by key, and lists the children of a to-many association.
// It never retries; failures come back as StoreError and the unit of work
// decides how to report them.
//
// ============================================================================

pub mod schema;
pub mod value;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use super::core::{Association, Predicate};
use super::errors::DecodeError;

pub use memory::{LineItemRecord, MemoryStore, OrderRecord, StoreCalls};
pub use postgres::PgStore;
pub use value::{Row, Value};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store call exceeded the caller's deadline")]
    Timeout,

    #[error("parameter `{0}` is referenced but not bound")]
    UnboundParameter(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// What the select list materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectForm {
    /// Order columns plus the columns of every join-fetched association.
    Entity,
    /// Columns of the transfer shape only.
    Summary,
}

/// Structured description of a query, for engines that do not parse SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub joins: Vec<Association>,
    pub select: SelectForm,
    pub predicates: Vec<Predicate>,
}

/// Query text with named `:param` placeholders and their bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<(String, Value)>,
    pub shape: QueryShape,
}

impl Query {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Run `query`, returning at most `row_cap` rows in query order.
    async fn execute(&self, query: &Query, row_cap: usize) -> Result<Vec<Row>, StoreError>;

    /// Point lookup of a to-one association by its key.
    async fn lookup_by_key(
        &self,
        association: Association,
        id: i64,
    ) -> Result<Option<Row>, StoreError>;

    /// Children of a to-many association, ordered by child id.
    async fn lookup_children(
        &self,
        association: Association,
        parent_id: i64,
    ) -> Result<Vec<Row>, StoreError>;
}
