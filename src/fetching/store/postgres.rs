use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo};
use std::time::Duration;

use super::schema;
use super::{Query, Row, Store, StoreError, Value};
use crate::fetching::core::Association;
use crate::fetching::errors::DecodeError;

// ============================================================================
// Postgres Store (sqlx)
// ============================================================================
//
// Named `:param` placeholders are rewritten to positional `$n` before the
// query is prepared. Rows are streamed and the stream is cut at the cap,
// on top of the LIMIT sent to the server.
//
// ============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;

        tracing::info!(max_connections, "Connected to Postgres");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[&Value],
        row_cap: usize,
    ) -> Result<Vec<Row>, StoreError> {
        let mut query = sqlx::query(sql);
        for value in params {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Int(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.clone()),
                Value::Timestamp(v) => query.bind(*v),
            };
        }

        let rows: Vec<PgRow> = query
            .fetch(&self.pool)
            .take(row_cap)
            .try_collect()
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(decode_row).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn execute(&self, query: &Query, row_cap: usize) -> Result<Vec<Row>, StoreError> {
        let (sql, values) = bind_positional(&query.sql, &query.params)?;
        let sql = format!("{} LIMIT {}", sql, row_cap);

        tracing::debug!(sql = %sql, params = values.len(), "Executing query");
        self.fetch_rows(&sql, &values, row_cap).await
    }

    async fn lookup_by_key(
        &self,
        association: Association,
        id: i64,
    ) -> Result<Option<Row>, StoreError> {
        let sql = match association {
            Association::Customer => format!(
                "SELECT c.customer_id AS customer_id, {} FROM customer c WHERE c.customer_id = $1",
                schema::CUSTOMER_COLUMNS
            ),
            Association::Delivery => format!(
                "SELECT d.delivery_id AS delivery_id, {} FROM delivery d WHERE d.delivery_id = $1",
                schema::DELIVERY_COLUMNS
            ),
            Association::LineItems => return Ok(None),
        };

        let id = Value::Int(id);
        let mut rows = self.fetch_rows(&sql, &[&id], 1).await?;
        Ok(rows.pop())
    }

    async fn lookup_children(
        &self,
        association: Association,
        parent_id: i64,
    ) -> Result<Vec<Row>, StoreError> {
        if association != Association::LineItems {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM line_item li WHERE li.order_id = $1 ORDER BY li.line_item_id",
            schema::LINE_ITEM_COLUMNS
        );
        let parent_id = Value::Int(parent_id);
        self.fetch_rows(&sql, &[&parent_id], usize::MAX).await
    }
}

/// Rewrite `:name` placeholders to `$n`. A name used twice keeps one
/// position. `::` casts and quoted literals are left alone.
pub fn bind_positional<'p>(
    sql: &str,
    params: &'p [(String, Value)],
) -> Result<(String, Vec<&'p Value>), StoreError> {
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<&'p str> = Vec::new();
    let mut values: Vec<&'p Value> = Vec::new();

    let chars: Vec<char> = sql.chars().collect();
    let mut in_literal = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '\'' {
            in_literal = !in_literal;
        }

        let starts_param = !in_literal
            && ch == ':'
            && chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '_')
            && (i == 0 || chars[i - 1] != ':');

        if !starts_param {
            out.push(ch);
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        let name: String = chars[start..end].iter().collect();

        let position = match order.iter().position(|known| *known == name) {
            Some(position) => position,
            None => {
                let (key, value) = params
                    .iter()
                    .find(|(key, _)| *key == name)
                    .ok_or_else(|| StoreError::UnboundParameter(name.clone()))?;
                order.push(key.as_str());
                values.push(value);
                order.len() - 1
            }
        };

        out.push('$');
        out.push_str(&(position + 1).to_string());
        i = end;
    }

    Ok((out, values))
}

fn decode_row(row: &PgRow) -> Result<Row, StoreError> {
    let mut out = Row::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let decoded = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)
                .map(|v| Value::from(v.map(i64::from))),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)
                .map(|v| Value::from(v.map(i64::from))),
            "INT8" => row.try_get::<Option<i64>, _>(idx).map(Value::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx).map(Value::from)
            }
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .map(Value::from),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .map(|v| Value::from(v.map(|naive| naive.and_utc()))),
            other => {
                return Err(DecodeError::new(name, format!("unsupported column type {}", other)).into())
            }
        };

        let value = decoded.map_err(|e| DecodeError::new(name, e.to_string()))?;
        out.push(name, value);
    }

    Ok(out)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnNotFound(column) => {
            DecodeError::new(column, "column missing from row").into()
        }
        sqlx::Error::ColumnDecode { index, source } => DecodeError::new(index, source.to_string()).into(),
        sqlx::Error::PoolTimedOut => StoreError::Unavailable("timed out acquiring a connection".to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}
