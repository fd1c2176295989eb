use tracing::debug;

use crate::config::FetchConfig;
use crate::fetching::core::{Criteria, FetchPlan, OrderSummary, SearchFilter};
use crate::fetching::errors::FetchError;
use crate::fetching::loader::{hydrate, UnitOfWork};
use crate::fetching::store::SelectForm;

// ============================================================================
// Order Query Repository - direct projection
// ============================================================================
//
// Selects the transfer shape straight from the joined tables, so no
// aggregate is ever materialized. It is the cheapest path on the wire and
// the least reusable one: a different transfer shape needs another query.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct OrderQueryRepository {
    config: FetchConfig,
}

impl OrderQueryRepository {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub async fn find_summaries(
        &self,
        uow: &mut UnitOfWork<'_>,
        filter: &SearchFilter,
    ) -> Result<Vec<OrderSummary>, FetchError> {
        let criteria = Criteria::build(filter, self.config.max_name_pattern_len)?;
        let set = uow
            .load(&criteria, &FetchPlan::lazy(), SelectForm::Summary)
            .await?;

        let summaries = set
            .rows
            .iter()
            .map(hydrate::summary)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(uow = %uow.id(), summaries = summaries.len(), "Projected in query");
        Ok(summaries)
    }
}
