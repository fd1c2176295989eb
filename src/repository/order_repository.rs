use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::order_query_repository::OrderQueryRepository;
use super::strategy::{FetchResult, FetchStrategy};
use crate::config::FetchConfig;
use crate::domain::order::Order;
use crate::fetching::core::{
    fold, project_all, Association, Criteria, FetchPlan, OrderSummary, SearchFilter,
    SUMMARY_ASSOCIATIONS,
};
use crate::fetching::errors::FetchError;
use crate::fetching::loader::{hydrate, UnitOfWork};
use crate::fetching::store::schema as col;
use crate::fetching::store::{Row, SelectForm, Store};
use crate::metrics::FetchMetrics;

// ============================================================================
// Order Repository - the caller-facing fetch surface
// ============================================================================
//
// Reusable finders (find_one, find_all, find_all_with_customer_delivery,
// find_all_with_items) run inside a caller-owned unit of work. The strategy
// operations compose them and differ only in how many round trips they pay:
//
//   strategy            root query        secondary lookups
//   direct exposure     lazy              every association, per order
//   post-map            lazy              customer + delivery, per order
//   fetch-joined        to-one join       none
//   direct projection   summary select    none
//
// Lookups are cached per unit of work, so repeated references cost one trip.
//
// ============================================================================

const ALL_ASSOCIATIONS: [Association; 3] = [
    Association::Customer,
    Association::Delivery,
    Association::LineItems,
];

pub struct OrderRepository {
    store: Arc<dyn Store>,
    config: FetchConfig,
    metrics: Option<Arc<FetchMetrics>>,
    queries: OrderQueryRepository,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn Store>, config: FetchConfig) -> Self {
        Self {
            store,
            queries: OrderQueryRepository::new(config.clone()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<FetchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Open a unit of work configured from this repository.
    pub fn begin(&self) -> UnitOfWork<'_> {
        let mut uow = UnitOfWork::new(self.store.as_ref(), self.config.max_rows)
            .strict(self.config.strict_fetch);

        if let Some(timeout) = self.config.store_timeout() {
            uow = uow.with_timeout(timeout);
        }
        if let Some(metrics) = &self.metrics {
            uow = uow.with_metrics(metrics.clone());
        }
        uow
    }

    fn criteria(&self, filter: &SearchFilter) -> Result<Criteria, FetchError> {
        Criteria::build(filter, self.config.max_name_pattern_len)
    }

    // ========================================================================
    // Finders
    // ========================================================================

    /// Single order with lazy associations, or None when the id is unknown.
    pub async fn find_one(
        &self,
        uow: &mut UnitOfWork<'_>,
        order_id: i64,
    ) -> Result<Option<Order>, FetchError> {
        let set = uow
            .load(&Criteria::by_id(order_id), &FetchPlan::lazy(), SelectForm::Entity)
            .await?;

        let order = set.rows.first().map(hydrate::order).transpose()?;
        Ok(order)
    }

    /// Root rows only; every association resolves lazily.
    pub async fn find_all(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<Order>, FetchError> {
        let criteria = self.criteria(filter)?;
        let set = uow
            .load(&criteria, &FetchPlan::lazy(), SelectForm::Entity)
            .await?;

        let orders = set
            .rows
            .iter()
            .map(hydrate::order)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    /// Customer and delivery join-fetched with the root, one round trip.
    pub async fn find_all_with_customer_delivery(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<Order>, FetchError> {
        let criteria = self.criteria(filter)?;
        let plan = FetchPlan::to_one();
        let set = uow.load(&criteria, &plan, SelectForm::Entity).await?;

        let orders = set
            .rows
            .iter()
            .map(|row| hydrate::joined_order(row, &plan))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    /// Customer, delivery and line items in one round trip, folded back
    /// into one aggregate per order. The row cap counts joined rows; when
    /// it cuts through the last order's items, that order is dropped.
    pub async fn find_all_with_items(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<Order>, FetchError> {
        let criteria = self.criteria(filter)?;
        let plan = FetchPlan::with_items();
        let set = uow.load(&criteria, &plan, SelectForm::Entity).await?;
        let rows = set.rows.len();
        let cut_parent = match (&set.overflow, set.needs_fold) {
            (Some(next), true) => Some(next.int(col::ORDER_ID)?),
            _ => None,
        };

        let mut orders = fold(
            set.rows,
            |row: &Row| row.int(col::ORDER_ID),
            |row: &Row| hydrate::joined_order(row, &plan),
            |order: &mut Order, row: &Row| {
                if let (Some(item), Some(items)) =
                    (hydrate::line_item(row)?, order.line_items.get_mut())
                {
                    items.push(item);
                }
                Ok(())
            },
        )?;

        if let Some(cut) = cut_parent {
            if orders.last().is_some_and(|order| order.id == cut) {
                orders.pop();
                uow.drop_partial_parent(cut);
            }
        }

        debug!(uow = %uow.id(), rows, orders = orders.len(), "Folded joined rows");
        Ok(orders)
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    /// Direct exposure: fully resolved aggregates. In-process use only.
    pub async fn find_aggregates(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<Order>, FetchError> {
        let mut orders = self.find_all(uow, filter).await?;
        uow.touch_all(&mut orders, &ALL_ASSOCIATIONS).await?;
        Ok(orders)
    }

    /// Post-map: reusable lazy finder, then projection.
    pub async fn find_summaries_post_map(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<OrderSummary>, FetchError> {
        let mut orders = self.find_all(uow, filter).await?;
        uow.touch_all(&mut orders, &SUMMARY_ASSOCIATIONS).await?;
        project_all(&orders)
    }

    /// Fetch-joined: one query, then projection. Any lookup here means the
    /// join did not deliver what the projection reads.
    pub async fn find_summaries_fetch_joined(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<OrderSummary>, FetchError> {
        let mut orders = self.find_all_with_customer_delivery(uow, filter).await?;
        for order in orders.iter_mut() {
            uow.ensure_loaded(order, &SUMMARY_ASSOCIATIONS).await?;
        }
        project_all(&orders)
    }

    /// Direct projection: the query itself produces the transfer shape.
    pub async fn find_summaries_projected(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<OrderSummary>, FetchError> {
        self.queries.find_summaries(uow, filter).await
    }

    /// Run `strategy` in a fresh unit of work.
    pub async fn fetch(
        &self,
        strategy: FetchStrategy,
        filter: &SearchFilter,
    ) -> Result<FetchResult, FetchError> {
        let started = Instant::now();
        let mut uow = self.begin();

        let result = match strategy {
            FetchStrategy::DirectExposure => self
                .find_aggregates(&mut uow, filter)
                .await
                .map(FetchResult::Aggregates),
            FetchStrategy::PostMap => self
                .find_summaries_post_map(&mut uow, filter)
                .await
                .map(FetchResult::Summaries),
            FetchStrategy::FetchJoined => self
                .find_summaries_fetch_joined(&mut uow, filter)
                .await
                .map(FetchResult::Summaries),
            FetchStrategy::DirectProjection => self
                .find_summaries_projected(&mut uow, filter)
                .await
                .map(FetchResult::Summaries),
        };

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe_fetch(strategy.as_str(), elapsed.as_secs_f64());
        }

        let stats = uow.stats();
        info!(
            uow = %uow.id(),
            strategy = %strategy,
            results = result.as_ref().map(FetchResult::len).unwrap_or(0),
            round_trips = stats.round_trips(),
            cache_hits = stats.cache_hits,
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Fetch finished"
        );

        result
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Delivery, DeliveryStatus, OrderStatus};
    use crate::domain::customer::{Address, Customer};
    use crate::fetching::errors::QueryShapeError;
    use crate::fetching::store::{MemoryStore, OrderRecord};
    use chrono::{Duration, TimeZone, Utc};

    fn repository(store: &Arc<MemoryStore>) -> OrderRepository {
        OrderRepository::new(store.clone(), FetchConfig::default())
    }

    fn kim_placed() -> SearchFilter {
        SearchFilter::new()
            .with_status(OrderStatus::Placed)
            .with_name("Kim")
    }

    #[tokio::test]
    async fn test_kim_scenario_across_all_strategies() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);

        for strategy in FetchStrategy::ALL {
            let result = repo.fetch(strategy, &kim_placed()).await.unwrap();
            assert_eq!(result.ids(), vec![1, 2], "strategy {}", strategy);

            if let FetchResult::Aggregates(orders) = &result {
                for order in orders {
                    assert!(order.is_fully_resolved());
                    assert!(!order.line_items.get().unwrap().is_empty());
                }
            }

            let summaries = result.into_summaries().unwrap();
            assert_eq!(summaries[0].customer_name, "Kim A");
            assert_eq!(summaries[1].customer_name, "Kim B");
            assert_eq!(summaries[0].address.line1, "10 Delivery Rd");
            assert_eq!(summaries[1].address.zip, "06102");
            assert!(summaries.iter().all(|s| s.status == OrderStatus::Placed));
        }
    }

    #[tokio::test]
    async fn test_unconstrained_filter_returns_equal_identity_sets() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);

        let mut identity_sets = Vec::new();
        for strategy in FetchStrategy::ALL {
            let result = repo.fetch(strategy, &SearchFilter::new()).await.unwrap();
            identity_sets.push(result.ids());
        }

        assert_eq!(identity_sets[0], vec![1, 2, 3, 4, 5]);
        assert!(identity_sets.iter().all(|ids| *ids == identity_sets[0]));
    }

    #[tokio::test]
    async fn test_post_map_and_fetch_joined_agree_field_for_field() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let filters = [
            SearchFilter::new(),
            kim_placed(),
            SearchFilter::new().with_status(OrderStatus::Canceled),
            SearchFilter::new().with_name("Lee"),
            SearchFilter::new().with_name("nobody"),
            SearchFilter::new().ordered_between(base, base + Duration::hours(3)),
        ];

        for filter in &filters {
            let mut uow = repo.begin();
            let post_map = repo.find_summaries_post_map(&mut uow, filter).await.unwrap();
            let joined = repo
                .find_summaries_fetch_joined(&mut uow, filter)
                .await
                .unwrap();
            assert_eq!(post_map, joined, "filter {:?}", filter);
        }
    }

    #[tokio::test]
    async fn test_round_trips_show_the_n_plus_one() {
        let expectations = [
            // 1 query + 3 customers + 5 deliveries + 5 item lists
            (FetchStrategy::DirectExposure, 14),
            // 1 query + 3 customers + 5 deliveries
            (FetchStrategy::PostMap, 9),
            (FetchStrategy::FetchJoined, 1),
            (FetchStrategy::DirectProjection, 1),
        ];

        for (strategy, round_trips) in expectations {
            let store = Arc::new(MemoryStore::sample());
            let repo = repository(&store);

            repo.fetch(strategy, &SearchFilter::new()).await.unwrap();
            assert_eq!(store.calls().total(), round_trips, "strategy {}", strategy);
        }
    }

    #[tokio::test]
    async fn test_strict_fetch_joined_needs_no_lookups() {
        let store = Arc::new(MemoryStore::sample());
        let config = FetchConfig {
            strict_fetch: true,
            ..FetchConfig::default()
        };
        let repo = OrderRepository::new(store.clone(), config);

        let result = repo
            .fetch(FetchStrategy::FetchJoined, &kim_placed())
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(store.calls().lookups, 0);
    }

    #[tokio::test]
    async fn test_store_unavailable_surfaces_from_every_strategy() {
        let store = Arc::new(MemoryStore::sample());
        store.set_offline(true);
        let repo = repository(&store);

        for strategy in FetchStrategy::ALL {
            let err = repo.fetch(strategy, &kim_placed()).await.unwrap_err();
            assert!(err.is_store_unavailable(), "strategy {}", strategy);
        }
        // one attempt each, no retries
        assert_eq!(store.calls().queries, 4);
    }

    #[tokio::test]
    async fn test_conflicting_filter_rejected_before_store() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let filter = SearchFilter::new().ordered_between(to + Duration::days(1), to);

        for strategy in FetchStrategy::ALL {
            let err = repo.fetch(strategy, &filter).await.unwrap_err();
            assert!(matches!(err, FetchError::Validation { field: "ordered_from", .. }));
        }
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_find_all_with_items_folds_joined_rows() {
        let mut store = MemoryStore::sample();
        store.insert_delivery(Delivery {
            id: 6,
            address: Address::new("60 Delivery Rd", None, "06106"),
            status: DeliveryStatus::Completed,
        });
        store.insert_order(OrderRecord {
            id: 6,
            status: OrderStatus::Placed,
            ordered_at: Utc::now(),
            customer_id: 3,
            delivery_id: 6,
        });
        let store = Arc::new(store);
        let repo = repository(&store);

        let mut uow = repo.begin();
        let orders = repo
            .find_all_with_items(&mut uow, &SearchFilter::new())
            .await
            .unwrap();

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

        let items: Vec<i64> = orders[2]
            .line_items
            .get()
            .unwrap()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(items, vec![30, 31]);
        assert!(orders[5].line_items.get().unwrap().is_empty());
        assert!(orders.iter().all(Order::is_fully_resolved));
        assert_eq!(orders[0].total_price(), Some(40_000));
        assert_eq!(store.calls().total(), 1);
    }

    #[tokio::test]
    async fn test_missing_customer_surfaces_as_dangling_reference() {
        let mut store = MemoryStore::sample();
        store.insert_order(OrderRecord {
            id: 6,
            status: OrderStatus::Placed,
            ordered_at: Utc::now(),
            customer_id: 99,
            delivery_id: 1,
        });
        let store = Arc::new(store);
        let repo = repository(&store);
        let placed = SearchFilter::new().with_status(OrderStatus::Placed);

        for strategy in [FetchStrategy::DirectExposure, FetchStrategy::PostMap] {
            let err = repo.fetch(strategy, &placed).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    FetchError::DanglingReference {
                        association: Association::Customer,
                        id: 99
                    }
                ),
                "strategy {}",
                strategy
            );
        }

        // a name filter inner-joins customer, so the order never matches
        let kim = repo.fetch(FetchStrategy::PostMap, &kim_placed()).await.unwrap();
        assert_eq!(kim.ids(), vec![1, 2]);
    }

    fn bulk_store(orders: i64) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_customer(Customer::new(1, "Kim A", Address::new("1 Way", None, "04001")));
        let now = Utc::now();
        for id in 1..=orders {
            store.insert_delivery(Delivery {
                id,
                address: Address::new(format!("{} Delivery Rd", id), None, "06101"),
                status: DeliveryStatus::Ready,
            });
            store.insert_order(OrderRecord {
                id,
                status: OrderStatus::Placed,
                ordered_at: now,
                customer_id: 1,
                delivery_id: id,
            });
        }
        store
    }

    #[tokio::test]
    async fn test_every_strategy_stops_at_the_row_cap() {
        let store = Arc::new(bulk_store(1500));
        let metrics = Arc::new(FetchMetrics::new().unwrap());
        let repo = repository(&store).with_metrics(metrics.clone());
        let expected: Vec<i64> = (1..=1000).collect();

        for strategy in FetchStrategy::ALL {
            let result = repo.fetch(strategy, &kim_placed()).await.unwrap();
            assert_eq!(result.ids(), expected, "strategy {}", strategy);
        }
        assert_eq!(metrics.rows_truncated.get(), 4);
    }

    #[tokio::test]
    async fn test_row_cap_inside_an_order_drops_that_order() {
        let store = Arc::new(MemoryStore::sample());
        let metrics = Arc::new(FetchMetrics::new().unwrap());
        let config = FetchConfig {
            max_rows: 3,
            ..FetchConfig::default()
        };
        let repo = OrderRepository::new(store.clone(), config).with_metrics(metrics.clone());
        let mut uow = repo.begin();

        let orders = repo
            .find_all_with_items(&mut uow, &SearchFilter::new())
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 1);
        assert_eq!(orders[0].line_items.get().unwrap().len(), 2);
        assert_eq!(orders[0].total_price(), Some(40_000));
        assert_eq!(uow.stats().truncated_queries, 1);
        assert_eq!(uow.stats().partial_parents_dropped, 1);
        assert_eq!(metrics.partial_parents_dropped.get(), 1);
    }

    #[tokio::test]
    async fn test_row_cap_on_an_order_boundary_keeps_every_order() {
        let store = Arc::new(MemoryStore::sample());
        let config = FetchConfig {
            max_rows: 4,
            ..FetchConfig::default()
        };
        let repo = OrderRepository::new(store.clone(), config);
        let mut uow = repo.begin();

        let orders = repo
            .find_all_with_items(&mut uow, &SearchFilter::new())
            .await
            .unwrap();

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(orders.iter().all(|o| o.line_items.get().unwrap().len() == 2));
        assert_eq!(uow.stats().truncated_queries, 1);
        assert_eq!(uow.stats().partial_parents_dropped, 0);
    }

    #[tokio::test]
    async fn test_find_one() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);
        let mut uow = repo.begin();

        let order = repo.find_one(&mut uow, 3).await.unwrap().unwrap();
        assert_eq!(order.id, 3);
        assert_eq!(order.customer.id(), 3);
        assert!(!order.customer.is_loaded());

        assert!(repo.find_one(&mut uow, 42).await.unwrap().is_none());
        assert_eq!(store.calls().lookups, 0);
    }

    #[tokio::test]
    async fn test_aggregates_project_like_post_map() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);

        let direct = repo
            .fetch(FetchStrategy::DirectExposure, &SearchFilter::new())
            .await
            .unwrap()
            .into_summaries()
            .unwrap();
        let post_map = repo
            .fetch(FetchStrategy::PostMap, &SearchFilter::new())
            .await
            .unwrap()
            .into_summaries()
            .unwrap();

        assert_eq!(direct, post_map);
    }

    #[tokio::test]
    async fn test_fetch_records_strategy_duration() {
        let store = Arc::new(MemoryStore::sample());
        let metrics = Arc::new(FetchMetrics::new().unwrap());
        let repo = repository(&store).with_metrics(metrics.clone());

        repo.fetch(FetchStrategy::PostMap, &SearchFilter::new())
            .await
            .unwrap();

        let samples = metrics
            .fetch_duration
            .with_label_values(&["post_map"])
            .get_sample_count();
        assert_eq!(samples, 1);
        assert_eq!(
            metrics
                .secondary_fetches
                .with_label_values(&["delivery"])
                .get(),
            5
        );
    }

    #[tokio::test]
    async fn test_projection_rejects_collection_join() {
        let store = Arc::new(MemoryStore::sample());
        let repo = repository(&store);
        let mut uow = repo.begin();

        let err = uow
            .load(&Criteria::default(), &FetchPlan::with_items(), SelectForm::Summary)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::QueryShape(QueryShapeError::CollectionInProjection { .. })
        ));
        assert_eq!(store.calls().total(), 0);
    }
}
