use crate::fetching::core::{Association, Criteria, FetchPlan, Predicate};
use crate::fetching::store::schema;
use crate::fetching::store::{Query, QueryShape, SelectForm};

// ============================================================================
// Query Text Generation
// ============================================================================
//
// Customer is inner-joined when fetched, projected or filtered by name;
// only a fetch adds its columns to an entity select. Delivery is
// inner-joined when fetched or projected. Line items are left-joined so
// an order without items still comes back as one row.
//
// ============================================================================

/// Root order query for `criteria`, shaped by `plan` and `select`.
pub fn order_query(criteria: &Criteria, plan: &FetchPlan, select: SelectForm) -> Query {
    let joins_customer = needs_customer(criteria, plan, select);
    let joins_delivery =
        select == SelectForm::Summary || plan.is_join_fetched(Association::Delivery);
    let joins_items = plan.is_join_fetched(Association::LineItems);

    let mut sql = String::from("SELECT ");
    match select {
        SelectForm::Summary => sql.push_str(schema::SUMMARY_COLUMNS),
        SelectForm::Entity => {
            sql.push_str(schema::ORDER_COLUMNS);
            if plan.is_join_fetched(Association::Customer) {
                sql.push_str(", ");
                sql.push_str(schema::CUSTOMER_COLUMNS);
            }
            if plan.is_join_fetched(Association::Delivery) {
                sql.push_str(", ");
                sql.push_str(schema::DELIVERY_COLUMNS);
            }
            if joins_items {
                sql.push_str(", ");
                sql.push_str(schema::LINE_ITEM_COLUMNS);
            }
        }
    }

    sql.push_str(" FROM orders o");
    if joins_customer {
        sql.push_str(" JOIN customer c ON c.customer_id = o.customer_id");
    }
    if joins_delivery {
        sql.push_str(" JOIN delivery d ON d.delivery_id = o.delivery_id");
    }
    if joins_items {
        sql.push_str(" LEFT JOIN line_item li ON li.order_id = o.order_id");
    }

    sql.push_str(&criteria.where_clause());

    sql.push_str(" ORDER BY o.order_id");
    if joins_items {
        sql.push_str(", li.line_item_id");
    }

    Query {
        sql,
        params: criteria.params().to_vec(),
        shape: QueryShape {
            joins: plan.joins().to_vec(),
            select,
            predicates: criteria.predicates().to_vec(),
        },
    }
}

/// Whether the root query needs the customer row at all.
fn needs_customer(criteria: &Criteria, plan: &FetchPlan, select: SelectForm) -> bool {
    select == SelectForm::Summary
        || plan.is_join_fetched(Association::Customer)
        || criteria.predicates().contains(&Predicate::CustomerNameLike)
}
