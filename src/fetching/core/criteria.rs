use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderStatus;
use crate::fetching::errors::FetchError;
use crate::fetching::store::Value;

// ============================================================================
// Criteria Builder - search filter to predicate fragments + parameters
// ============================================================================
//
// Fragment order is fixed (status, name, ordered_from, ordered_to) so the
// generated query text is stable for a given set of present fields.
//
// ============================================================================

/// Caller-supplied search filter. An absent field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub ordered_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ordered_to: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    pub fn ordered_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.ordered_from = Some(from);
        self.ordered_to = Some(to);
        self
    }

    /// Name pattern with surrounding whitespace removed; blank counts as absent.
    fn effective_name(&self) -> Option<&str> {
        self.name_pattern
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A single constraint the root query can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    OrderIdEquals,
    StatusEquals,
    CustomerNameLike,
    OrderedFrom,
    OrderedTo,
}

impl Predicate {
    pub fn fragment(&self) -> &'static str {
        match self {
            Predicate::OrderIdEquals => "o.order_id = :order_id",
            Predicate::StatusEquals => "o.status = :status",
            Predicate::CustomerNameLike => "c.name LIKE :name ESCAPE '\\'",
            Predicate::OrderedFrom => "o.ordered_at >= :ordered_from",
            Predicate::OrderedTo => "o.ordered_at <= :ordered_to",
        }
    }

    pub fn param(&self) -> &'static str {
        match self {
            Predicate::OrderIdEquals => "order_id",
            Predicate::StatusEquals => "status",
            Predicate::CustomerNameLike => "name",
            Predicate::OrderedFrom => "ordered_from",
            Predicate::OrderedTo => "ordered_to",
        }
    }
}

/// Output of the builder: predicates in emission order plus their bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
    params: Vec<(String, Value)>,
}

impl Criteria {
    /// Validate `filter` and translate it. Performs no I/O.
    pub fn build(filter: &SearchFilter, max_name_pattern_len: usize) -> Result<Self, FetchError> {
        validate(filter, max_name_pattern_len)?;

        let mut criteria = Criteria::default();

        if let Some(status) = filter.status {
            criteria.push(Predicate::StatusEquals, status.as_str());
        }
        if let Some(name) = filter.effective_name() {
            criteria.push(Predicate::CustomerNameLike, format!("%{}%", escape_like(name)));
        }
        if let Some(from) = filter.ordered_from {
            criteria.push(Predicate::OrderedFrom, from);
        }
        if let Some(to) = filter.ordered_to {
            criteria.push(Predicate::OrderedTo, to);
        }

        Ok(criteria)
    }

    /// Identity lookup of a single order; not reachable from a search filter.
    pub fn by_id(order_id: i64) -> Self {
        let mut criteria = Criteria::default();
        criteria.push(Predicate::OrderIdEquals, order_id);
        criteria
    }

    fn push(&mut self, predicate: Predicate, value: impl Into<Value>) {
        self.predicates.push(predicate);
        self.params.push((predicate.param().to_string(), value.into()));
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The first fragment opens the clause, the rest are conjunctions.
    pub fn fragments(&self) -> Vec<String> {
        self.predicates
            .iter()
            .enumerate()
            .map(|(i, predicate)| {
                let keyword = if i == 0 { "WHERE" } else { "AND" };
                format!(" {} {}", keyword, predicate.fragment())
            })
            .collect()
    }

    pub fn where_clause(&self) -> String {
        self.fragments().concat()
    }
}

fn validate(filter: &SearchFilter, max_name_pattern_len: usize) -> Result<(), FetchError> {
    if let Some(name) = filter.effective_name() {
        let len = name.chars().count();
        if len > max_name_pattern_len {
            return Err(FetchError::validation(
                "name_pattern",
                format!("{} characters exceeds the limit of {}", len, max_name_pattern_len),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(FetchError::validation(
                "name_pattern",
                "control characters are not allowed",
            ));
        }
    }

    if let (Some(from), Some(to)) = (filter.ordered_from, filter.ordered_to) {
        if from > to {
            return Err(FetchError::validation(
                "ordered_from",
                format!("{} is after ordered_to {}", from, to),
            ));
        }
    }

    Ok(())
}

/// Escape LIKE metacharacters so user input only ever matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// ============================================================================
// Unit Tests
// ============================================================================
