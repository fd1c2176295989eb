use super::core::Association;

// ============================================================================
// Fetch Errors
// ============================================================================
//
// Every error carries enough context (filter field, association, store
// operation) to be diagnosed by the caller. Nothing here is retried.
//
// ============================================================================

/// A store row did not carry a column, or carried it with the wrong type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot decode column `{column}`: {reason}")]
pub struct DecodeError {
    pub column: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Rejected before a query is sent to the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryShapeError {
    #[error("cannot join-fetch more than one collection in a single query: {associations:?}")]
    MultipleCollections { associations: Vec<Association> },

    #[error("a projection query cannot join-fetch collection `{association}`")]
    CollectionInProjection { association: Association },

    #[error("query references parameter `{0}` that is not bound")]
    UnboundParameter(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid search filter field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error(transparent)]
    QueryShape(#[from] QueryShapeError),

    #[error("store unavailable during {operation}: {reason}")]
    StoreUnavailable {
        operation: &'static str,
        reason: String,
    },

    #[error(
        "association `{association}` of order {order_id} needed a secondary fetch \
         although the strategy promised none"
    )]
    UnexpectedExtraFetch {
        association: Association,
        order_id: i64,
    },

    #[error("{association} {id} is referenced but does not exist")]
    DanglingReference { association: Association, id: i64 },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl FetchError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        FetchError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, FetchError::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = FetchError::validation("name_pattern", "too long");
        assert_eq!(
            err.to_string(),
            "invalid search filter field `name_pattern`: too long"
        );

        let err = FetchError::UnexpectedExtraFetch {
            association: Association::Delivery,
            order_id: 4,
        };
        assert!(err.to_string().contains("`delivery`"));
        assert!(err.to_string().contains("order 4"));
    }

    #[test]
    fn test_shape_error_converts() {
        let err: FetchError = QueryShapeError::CollectionInProjection {
            association: Association::LineItems,
        }
        .into();
        assert!(matches!(err, FetchError::QueryShape(_)));
        assert!(!err.is_store_unavailable());
    }
}
