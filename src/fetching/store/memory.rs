use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::schema as col;
use super::{Query, Row, SelectForm, Store, StoreError, Value};
use crate::domain::customer::{Address, Customer};
use crate::domain::order::{Delivery, DeliveryStatus, OrderStatus};
use crate::fetching::core::{Association, Predicate};
use crate::fetching::errors::DecodeError;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Fixture engine that evaluates a query's structured shape instead of its
// text. Join semantics follow the SQL the loader generates:
// - customer is inner-joined when fetched, projected or filtered by name
// - delivery is inner-joined when fetched or projected
// - line items are left-joined, one row per item, ordered by item id
//
// Every call is counted so tests can assert round trips, and the store can
// be taken offline or slowed down to exercise failure paths.
//
// ============================================================================

/// Row of the `orders` table.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub id: i64,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub customer_id: i64,
    pub delivery_id: i64,
}

/// Row of the `line_item` table. Kept raw so bad data reaches the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRecord {
    pub id: i64,
    pub order_id: i64,
    pub item_id: i64,
    pub order_price: i64,
    pub count: i32,
}

/// Call counters, one per store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub queries: usize,
    pub lookups: usize,
    pub children: usize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.queries + self.lookups + self.children
    }
}

#[derive(Default)]
pub struct MemoryStore {
    customers: BTreeMap<i64, Customer>,
    deliveries: BTreeMap<i64, Delivery>,
    orders: BTreeMap<i64, OrderRecord>,
    line_items: BTreeMap<i64, Vec<LineItemRecord>>,

    latency: Option<Duration>,
    offline: AtomicBool,

    queries: AtomicUsize,
    lookups: AtomicUsize,
    children: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three placed orders (Kim A, Kim B, Lee C) and two canceled orders
    /// for Kim A, each with a delivery and two line items.
    pub fn sample() -> Self {
        let mut store = Self::new();

        for (id, name, zip) in [(1, "Kim A", "04001"), (2, "Kim B", "04002"), (3, "Lee C", "04003")] {
            store.insert_customer(Customer::new(
                id,
                name,
                Address::new(format!("{} Customer Way", id), None, zip),
            ));
        }

        let orders = [
            (1, OrderStatus::Placed, 1),
            (2, OrderStatus::Placed, 2),
            (3, OrderStatus::Placed, 3),
            (4, OrderStatus::Canceled, 1),
            (5, OrderStatus::Canceled, 1),
        ];
        let base = DateTime::from_timestamp(1_714_557_600, 0).unwrap_or_default();

        for (id, status, customer_id) in orders {
            store.insert_delivery(Delivery {
                id,
                address: Address::new(format!("{} Delivery Rd", id * 10), Some("Gate B"), format!("0610{}", id)),
                status: DeliveryStatus::Ready,
            });
            store.insert_order(OrderRecord {
                id,
                status,
                ordered_at: base + chrono::Duration::hours(id),
                customer_id,
                delivery_id: id,
            });
            for n in 0..2 {
                let item_id = id * 10 + n;
                store.insert_line_item(LineItemRecord {
                    id: item_id,
                    order_id: id,
                    item_id: 100 + n,
                    order_price: 10_000 + n * 5_000,
                    count: (n + 1) as i32,
                });
            }
        }

        store
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn insert_delivery(&mut self, delivery: Delivery) {
        self.deliveries.insert(delivery.id, delivery);
    }

    pub fn insert_order(&mut self, order: OrderRecord) {
        self.orders.insert(order.id, order);
    }

    pub fn insert_line_item(&mut self, item: LineItemRecord) {
        let items = self.line_items.entry(item.order_id).or_default();
        items.push(item);
        items.sort_by_key(|item| item.id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            queries: self.queries.load(Ordering::SeqCst),
            lookups: self.lookups.load(Ordering::SeqCst),
            children: self.children.load(Ordering::SeqCst),
        }
    }

    /// Query text of every `execute` call, in call order.
    pub async fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn matches(
        &self,
        query: &Query,
        order: &OrderRecord,
        customer: Option<&Customer>,
    ) -> Result<bool, StoreError> {
        for predicate in &query.shape.predicates {
            let value = query
                .param(predicate.param())
                .ok_or_else(|| StoreError::UnboundParameter(predicate.param().to_string()))?;

            let hit = match (predicate, value) {
                (Predicate::OrderIdEquals, Value::Int(id)) => order.id == *id,
                (Predicate::StatusEquals, Value::Text(status)) => order.status.as_str() == status,
                (Predicate::CustomerNameLike, Value::Text(pattern)) => {
                    customer.is_some_and(|customer| like_matches(&customer.name, pattern))
                }
                (Predicate::OrderedFrom, Value::Timestamp(from)) => order.ordered_at >= *from,
                (Predicate::OrderedTo, Value::Timestamp(to)) => order.ordered_at <= *to,
                (predicate, other) => {
                    return Err(DecodeError::new(
                        predicate.param(),
                        format!("parameter bound as {}", other.type_name()),
                    )
                    .into())
                }
            };

            if !hit {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn rows_for(&self, query: &Query, order: &OrderRecord) -> Result<Vec<Row>, StoreError> {
        let joins = &query.shape.joins;
        let customer = if needs_customer(query) {
            match self.customers.get(&order.customer_id) {
                Some(customer) => Some(customer),
                None => return Ok(Vec::new()),
            }
        } else {
            None
        };
        if !self.matches(query, order, customer)? {
            return Ok(Vec::new());
        }

        let delivery = if query.shape.select == SelectForm::Summary
            || joins.contains(&Association::Delivery)
        {
            match self.deliveries.get(&order.delivery_id) {
                Some(delivery) => Some(delivery),
                None => return Ok(Vec::new()),
            }
        } else {
            None
        };

        if query.shape.select == SelectForm::Summary {
            let (Some(customer), Some(delivery)) = (customer, delivery) else {
                return Ok(Vec::new());
            };
            let row = Row::new()
                .with(col::ORDER_ID, order.id)
                .with(col::CUSTOMER_NAME, customer.name.as_str())
                .with(col::ORDERED_AT, order.ordered_at)
                .with(col::ORDER_STATUS, order.status.as_str())
                .with(col::DELIVERY_LINE1, delivery.address.line1.as_str())
                .with(col::DELIVERY_LINE2, delivery.address.line2.clone())
                .with(col::DELIVERY_ZIP, delivery.address.zip.as_str());
            return Ok(vec![row]);
        }

        let mut base = order_row(order);
        if let Some(customer) = customer.filter(|_| joins.contains(&Association::Customer)) {
            base.extend(customer_row(customer));
        }
        if let Some(delivery) = delivery {
            base.extend(delivery_row(delivery));
        }

        if !joins.contains(&Association::LineItems) {
            return Ok(vec![base]);
        }

        let items = self.line_items.get(&order.id).map(Vec::as_slice).unwrap_or(&[]);
        if items.is_empty() {
            let mut row = base;
            row.extend(null_line_item_row());
            return Ok(vec![row]);
        }

        Ok(items
            .iter()
            .map(|item| {
                let mut row = base.clone();
                row.extend(line_item_row(item));
                row
            })
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&self, query: &Query, row_cap: usize) -> Result<Vec<Row>, StoreError> {
        self.executed.lock().await.push(query.sql.clone());
        self.enter(&self.queries).await?;

        let mut rows = Vec::new();
        for order in self.orders.values() {
            rows.extend(self.rows_for(query, order)?);
            if rows.len() >= row_cap {
                break;
            }
        }
        rows.truncate(row_cap);

        tracing::debug!(rows = rows.len(), row_cap, "memory store executed query");
        Ok(rows)
    }

    async fn lookup_by_key(
        &self,
        association: Association,
        id: i64,
    ) -> Result<Option<Row>, StoreError> {
        self.enter(&self.lookups).await?;

        let row = match association {
            Association::Customer => self
                .customers
                .get(&id)
                .map(|customer| Row::new().with(col::CUSTOMER_ID, id).extended(customer_row(customer))),
            Association::Delivery => self
                .deliveries
                .get(&id)
                .map(|delivery| Row::new().with(col::DELIVERY_ID, id).extended(delivery_row(delivery))),
            Association::LineItems => None,
        };
        Ok(row)
    }

    async fn lookup_children(
        &self,
        association: Association,
        parent_id: i64,
    ) -> Result<Vec<Row>, StoreError> {
        self.enter(&self.children).await?;

        if association != Association::LineItems {
            return Ok(Vec::new());
        }

        Ok(self
            .line_items
            .get(&parent_id)
            .map(|items| items.iter().map(line_item_row).collect())
            .unwrap_or_default())
    }
}

fn needs_customer(query: &Query) -> bool {
    let shape = &query.shape;
    shape.select == SelectForm::Summary
        || shape.joins.contains(&Association::Customer)
        || shape.predicates.contains(&Predicate::CustomerNameLike)
}

fn order_row(order: &OrderRecord) -> Row {
    Row::new()
        .with(col::ORDER_ID, order.id)
        .with(col::ORDER_STATUS, order.status.as_str())
        .with(col::ORDERED_AT, order.ordered_at)
        .with(col::CUSTOMER_ID, order.customer_id)
        .with(col::DELIVERY_ID, order.delivery_id)
}

fn customer_row(customer: &Customer) -> Row {
    Row::new()
        .with(col::CUSTOMER_NAME, customer.name.as_str())
        .with(col::CUSTOMER_LINE1, customer.address.line1.as_str())
        .with(col::CUSTOMER_LINE2, customer.address.line2.clone())
        .with(col::CUSTOMER_ZIP, customer.address.zip.as_str())
}

fn delivery_row(delivery: &Delivery) -> Row {
    Row::new()
        .with(col::DELIVERY_STATUS, delivery.status.as_str())
        .with(col::DELIVERY_LINE1, delivery.address.line1.as_str())
        .with(col::DELIVERY_LINE2, delivery.address.line2.clone())
        .with(col::DELIVERY_ZIP, delivery.address.zip.as_str())
}

fn line_item_row(item: &LineItemRecord) -> Row {
    Row::new()
        .with(col::LINE_ITEM_ID, item.id)
        .with(col::ITEM_ID, item.item_id)
        .with(col::ORDER_PRICE, item.order_price)
        .with(col::ITEM_COUNT, item.count)
}

fn null_line_item_row() -> Row {
    Row::new()
        .with(col::LINE_ITEM_ID, Value::Null)
        .with(col::ITEM_ID, Value::Null)
        .with(col::ORDER_PRICE, Value::Null)
        .with(col::ITEM_COUNT, Value::Null)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnySequence,
    AnyChar,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        let token = match ch {
            '%' => LikeToken::AnySequence,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            other => LikeToken::Literal(other),
        };
        tokens.push(token);
    }
    tokens
}

/// SQL `LIKE` with `\` as the escape character. Case-sensitive.
pub fn like_matches(value: &str, pattern: &str) -> bool {
    let text: Vec<char> = value.chars().collect();

    // matched[j]: the tokens consumed so far match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;

    for token in tokenize(pattern) {
        let mut next = vec![false; text.len() + 1];
        match token {
            LikeToken::AnySequence => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            LikeToken::AnyChar => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            LikeToken::Literal(ch) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == ch;
                }
            }
        }
        matched = next;
    }

    matched[text.len()]
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetching::store::QueryShape;

    fn entity_query(joins: Vec<Association>, predicates: Vec<Predicate>, params: Vec<(String, Value)>) -> Query {
        Query {
            sql: "SELECT ...".to_string(),
            params,
            shape: QueryShape {
                joins,
                select: SelectForm::Entity,
                predicates,
            },
        }
    }

    #[test]
    fn test_like_matching() {
        assert!(like_matches("Kim A", "%Kim%"));
        assert!(like_matches("Kim A", "Kim _"));
        assert!(!like_matches("Lee C", "%Kim%"));
        assert!(!like_matches("kim a", "%Kim%"));
        assert!(like_matches("50% off", "50\\% off"));
        assert!(!like_matches("500 off", "50\\% off"));
        assert!(like_matches("", "%"));
        assert!(!like_matches("", "_"));
    }

    #[tokio::test]
    async fn test_sample_lazy_query_returns_root_rows() {
        let store = MemoryStore::sample();
        let rows = store.execute(&entity_query(vec![], vec![], vec![]), 100).await.unwrap();

        assert_eq!(rows.len(), 5);
        assert!(rows[0].get(col::CUSTOMER_NAME).is_none());
        assert_eq!(rows[0].int(col::ORDER_ID).unwrap(), 1);
        assert_eq!(store.calls().queries, 1);
    }

    #[tokio::test]
    async fn test_collection_join_multiplies_rows() {
        let store = MemoryStore::sample();
        let query = entity_query(
            vec![Association::Customer, Association::Delivery, Association::LineItems],
            vec![],
            vec![],
        );
        let rows = store.execute(&query, 100).await.unwrap();

        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].int(col::ORDER_ID).unwrap(), 1);
        assert_eq!(rows[1].int(col::ORDER_ID).unwrap(), 1);
        assert_eq!(rows[1].int(col::LINE_ITEM_ID).unwrap(), 11);
    }

    #[tokio::test]
    async fn test_predicates_and_cap() {
        let store = MemoryStore::sample();
        let query = entity_query(
            vec![],
            vec![Predicate::StatusEquals, Predicate::CustomerNameLike],
            vec![
                ("status".to_string(), Value::from("PLACED")),
                ("name".to_string(), Value::from("%Kim%")),
            ],
        );

        let rows = store.execute(&query, 100).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.int(col::ORDER_ID).unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);

        let rows = store.execute(&query, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_customer_only_hides_rows_that_join_it() {
        let mut store = MemoryStore::sample();
        store.insert_order(OrderRecord {
            id: 6,
            status: OrderStatus::Placed,
            ordered_at: Utc::now(),
            customer_id: 99,
            delivery_id: 1,
        });

        let rows = store.execute(&entity_query(vec![], vec![], vec![]), 100).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[5].int(col::CUSTOMER_ID).unwrap(), 99);

        let by_name = entity_query(
            vec![],
            vec![Predicate::CustomerNameLike],
            vec![("name".to_string(), Value::from("%"))],
        );
        let rows = store.execute(&by_name, 100).await.unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn test_unbound_parameter() {
        let store = MemoryStore::sample();
        let query = entity_query(vec![], vec![Predicate::StatusEquals], vec![]);

        let err = store.execute(&query, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::UnboundParameter(ref name) if name == "status"));
    }

    #[tokio::test]
    async fn test_offline_store() {
        let store = MemoryStore::sample();
        store.set_offline(true);

        let err = store.lookup_by_key(Association::Customer, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.calls().lookups, 1);
    }

    #[tokio::test]
    async fn test_lookups() {
        let store = MemoryStore::sample();

        let customer = store.lookup_by_key(Association::Customer, 2).await.unwrap().unwrap();
        assert_eq!(customer.text(col::CUSTOMER_NAME).unwrap(), "Kim B");
        assert!(store.lookup_by_key(Association::Customer, 99).await.unwrap().is_none());

        let items = store.lookup_children(Association::LineItems, 3).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(store.calls().total(), 3);
    }
}
