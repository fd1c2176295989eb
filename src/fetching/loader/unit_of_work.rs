use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{hydrate, sql};
use crate::domain::customer::Customer;
use crate::domain::order::{Delivery, LineItem, Order};
use crate::fetching::core::{Association, Criteria, FetchPlan};
use crate::fetching::errors::{FetchError, QueryShapeError};
use crate::fetching::store::{Row, SelectForm, Store, StoreError};
use crate::metrics::{FetchMetrics, OP_CHILDREN, OP_LOOKUP, OP_QUERY};

// ============================================================================
// Unit of Work - scoped association cache and store access
// ============================================================================
//
// One unit of work per request. It owns the only cache in the fetching
// core: resolved associations keyed by (association, id), consulted before
// any secondary lookup and dropped with the unit. Nothing is shared between
// units, so concurrent requests never contend.
//
// Every store call goes through `guarded`, which applies the caller's
// deadline and maps store failures into the fetch error taxonomy.
//
// ============================================================================

#[derive(Debug, Clone)]
enum Resolved {
    Customer(Customer),
    Delivery(Delivery),
    LineItems(Vec<LineItem>),
}

/// Per-unit counters, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub queries: usize,
    pub lookups: usize,
    pub cache_hits: usize,
    pub truncated_queries: usize,
    pub partial_parents_dropped: usize,
}

impl FetchStats {
    pub fn round_trips(&self) -> usize {
        self.queries + self.lookups
    }
}

/// Rows of one root query, already cut at the row cap.
#[derive(Debug)]
pub struct RowSet {
    pub rows: Vec<Row>,
    /// Rows repeat their parent and must go through the aggregator.
    pub needs_fold: bool,
    /// More rows matched than the cap allowed.
    pub truncated: bool,
    /// First row past the cap, when `truncated`.
    pub overflow: Option<Row>,
}

pub struct UnitOfWork<'s> {
    id: Uuid,
    store: &'s dyn Store,
    max_rows: usize,
    strict: bool,
    deadline: Option<Instant>,
    metrics: Option<Arc<FetchMetrics>>,
    cache: HashMap<(Association, i64), Resolved>,
    stats: FetchStats,
}

impl<'s> UnitOfWork<'s> {
    pub fn new(store: &'s dyn Store, max_rows: usize) -> Self {
        let id = Uuid::new_v4();
        debug!(uow = %id, max_rows, "Unit of work started");

        Self {
            id,
            store,
            max_rows,
            strict: false,
            deadline: None,
            metrics: None,
            cache: HashMap::new(),
            stats: FetchStats::default(),
        }
    }

    /// Fail instead of fetching when an association was promised but missing.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_metrics(mut self, metrics: Arc<FetchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    // ========================================================================
    // Root queries
    // ========================================================================

    /// Validate the query shape, then run the root query with the row cap.
    /// Shape errors are raised before the store sees anything.
    pub async fn load(
        &mut self,
        criteria: &Criteria,
        plan: &FetchPlan,
        select: SelectForm,
    ) -> Result<RowSet, FetchError> {
        plan.validate()?;
        if select == SelectForm::Summary {
            if let Some(association) = plan.joins().iter().copied().find(Association::is_to_many) {
                return Err(QueryShapeError::CollectionInProjection { association }.into());
            }
        }

        let query = sql::order_query(criteria, plan, select);
        debug!(uow = %self.id, sql = %query.sql, params = query.params.len(), "Loading orders");

        // One extra row tells a full page apart from a cut one.
        let store = self.store;
        self.count_round_trip(OP_QUERY);
        self.stats.queries += 1;
        let mut rows = self
            .guarded(OP_QUERY, store.execute(&query, self.max_rows.saturating_add(1)))
            .await?;

        let overflow = rows.get(self.max_rows).cloned();
        let truncated = rows.len() > self.max_rows;
        if truncated {
            rows.truncate(self.max_rows);
            self.stats.truncated_queries += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_truncation();
            }
            warn!(
                uow = %self.id,
                max_rows = self.max_rows,
                "Result truncated at the row cap; later rows in query order were dropped"
            );
        }

        debug!(uow = %self.id, rows = rows.len(), truncated, "Orders loaded");
        Ok(RowSet {
            rows,
            needs_fold: plan.needs_fold(),
            truncated,
            overflow,
        })
    }

    /// Record a folded parent dropped because the cap cut its children.
    pub fn drop_partial_parent(&mut self, order_id: i64) {
        self.stats.partial_parents_dropped += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_partial_parent_dropped();
        }
        warn!(
            uow = %self.id,
            order_id,
            max_rows = self.max_rows,
            "Row cap cut through an order's line items; order dropped from the result"
        );
    }

    // ========================================================================
    // Lazy associations
    // ========================================================================

    /// Resolve one association of `order`, from the cache when possible.
    pub async fn resolve(
        &mut self,
        order: &mut Order,
        association: Association,
    ) -> Result<(), FetchError> {
        if is_loaded(order, association) {
            return Ok(());
        }

        match self.cached(association, slot_id(order, association)).await? {
            Resolved::Customer(customer) => order.customer.fill(customer),
            Resolved::Delivery(delivery) => order.delivery.fill(delivery),
            Resolved::LineItems(items) => order.line_items.fill(items),
        }
        Ok(())
    }

    /// Access each association in turn, as a caller walking the aggregate would.
    pub async fn touch(
        &mut self,
        order: &mut Order,
        associations: &[Association],
    ) -> Result<(), FetchError> {
        for association in associations {
            self.resolve(order, *association).await?;
        }
        Ok(())
    }

    pub async fn touch_all(
        &mut self,
        orders: &mut [Order],
        associations: &[Association],
    ) -> Result<(), FetchError> {
        for order in orders.iter_mut() {
            self.touch(order, associations).await?;
        }
        Ok(())
    }

    /// Guard for strategies that promised zero secondary fetches. Strict
    /// units fail on the first gap; others log it, count it and resolve.
    pub async fn ensure_loaded(
        &mut self,
        order: &mut Order,
        associations: &[Association],
    ) -> Result<(), FetchError> {
        for association in associations.iter().copied() {
            if is_loaded(order, association) {
                continue;
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_unexpected_fetch(association);
            }
            if self.strict {
                return Err(FetchError::UnexpectedExtraFetch {
                    association,
                    order_id: order.id,
                });
            }

            warn!(
                uow = %self.id,
                order_id = order.id,
                association = %association,
                "Unexpected extra fetch"
            );
            self.resolve(order, association).await?;
        }
        Ok(())
    }

    async fn cached(&mut self, association: Association, id: i64) -> Result<Resolved, FetchError> {
        let key = (association, id);

        if let Some(hit) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit(association);
            }
            debug!(uow = %self.id, association = %association, id, "Association cache hit");
            return Ok(hit.clone());
        }

        debug!(uow = %self.id, association = %association, id, "Secondary fetch");
        self.stats.lookups += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_secondary_fetch(association);
        }

        let store = self.store;
        let resolved = match association {
            Association::Customer | Association::Delivery => {
                self.count_round_trip(OP_LOOKUP);
                let row = self
                    .guarded(OP_LOOKUP, store.lookup_by_key(association, id))
                    .await?
                    .ok_or(FetchError::DanglingReference { association, id })?;

                if association == Association::Customer {
                    Resolved::Customer(hydrate::customer(&row, id)?)
                } else {
                    Resolved::Delivery(hydrate::delivery(&row, id)?)
                }
            }
            Association::LineItems => {
                self.count_round_trip(OP_CHILDREN);
                let rows = self
                    .guarded(OP_CHILDREN, store.lookup_children(association, id))
                    .await?;
                let items = rows
                    .iter()
                    .filter_map(|row| hydrate::line_item(row).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                Resolved::LineItems(items)
            }
        };

        self.cache.insert(key, resolved.clone());
        Ok(resolved)
    }

    // ========================================================================
    // Store boundary
    // ========================================================================

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, FetchError> {
        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or(Err(StoreError::Timeout)),
            None => call.await,
        };

        result.map_err(|err| {
            warn!(uow = %self.id, operation, error = %err, "Store call failed");
            into_fetch_error(operation, err)
        })
    }

    fn count_round_trip(&self, operation: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_round_trip(operation);
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        debug!(
            uow = %self.id,
            queries = self.stats.queries,
            lookups = self.stats.lookups,
            cache_hits = self.stats.cache_hits,
            "Unit of work finished"
        );
    }
}

fn into_fetch_error(operation: &'static str, err: StoreError) -> FetchError {
    match err {
        StoreError::Unavailable(reason) => FetchError::StoreUnavailable { operation, reason },
        StoreError::Timeout => FetchError::StoreUnavailable {
            operation,
            reason: "deadline exceeded".to_string(),
        },
        StoreError::UnboundParameter(name) => QueryShapeError::UnboundParameter(name).into(),
        StoreError::Decode(err) => err.into(),
    }
}

fn is_loaded(order: &Order, association: Association) -> bool {
    match association {
        Association::Customer => order.customer.is_loaded(),
        Association::Delivery => order.delivery.is_loaded(),
        Association::LineItems => order.line_items.is_loaded(),
    }
}

fn slot_id(order: &Order, association: Association) -> i64 {
    match association {
        Association::Customer => order.customer.id(),
        Association::Delivery => order.delivery.id(),
        Association::LineItems => order.line_items.id(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
