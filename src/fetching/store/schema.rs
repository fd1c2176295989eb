// ============================================================================
// Relational Schema and Column Aliases
// ============================================================================
//
// Tables:
//   customer  (customer_id, name, line1, line2, zip)
//   delivery  (delivery_id, status, line1, line2, zip)
//   orders    (order_id, customer_id, delivery_id, status, ordered_at)
//   line_item (line_item_id, order_id, item_id, order_price, count)
//
// Every query selects through the aliases below so that rows coming from
// a join and rows coming from a point lookup decode the same way.
//
// ============================================================================

pub const ORDER_ID: &str = "order_id";
pub const ORDER_STATUS: &str = "order_status";
pub const ORDERED_AT: &str = "ordered_at";
pub const CUSTOMER_ID: &str = "customer_id";
pub const DELIVERY_ID: &str = "delivery_id";

pub const CUSTOMER_NAME: &str = "customer_name";
pub const CUSTOMER_LINE1: &str = "customer_line1";
pub const CUSTOMER_LINE2: &str = "customer_line2";
pub const CUSTOMER_ZIP: &str = "customer_zip";

pub const DELIVERY_STATUS: &str = "delivery_status";
pub const DELIVERY_LINE1: &str = "delivery_line1";
pub const DELIVERY_LINE2: &str = "delivery_line2";
pub const DELIVERY_ZIP: &str = "delivery_zip";

pub const LINE_ITEM_ID: &str = "line_item_id";
pub const ITEM_ID: &str = "item_id";
pub const ORDER_PRICE: &str = "order_price";
pub const ITEM_COUNT: &str = "item_count";

pub const ORDER_COLUMNS: &str = "o.order_id AS order_id, o.status AS order_status, \
     o.ordered_at AS ordered_at, o.customer_id AS customer_id, o.delivery_id AS delivery_id";

pub const CUSTOMER_COLUMNS: &str = "c.name AS customer_name, c.line1 AS customer_line1, \
     c.line2 AS customer_line2, c.zip AS customer_zip";

pub const DELIVERY_COLUMNS: &str = "d.status AS delivery_status, d.line1 AS delivery_line1, \
     d.line2 AS delivery_line2, d.zip AS delivery_zip";

pub const LINE_ITEM_COLUMNS: &str = "li.line_item_id AS line_item_id, li.item_id AS item_id, \
     li.order_price AS order_price, li.count AS item_count";

pub const SUMMARY_COLUMNS: &str = "o.order_id AS order_id, c.name AS customer_name, \
     o.ordered_at AS ordered_at, o.status AS order_status, d.line1 AS delivery_line1, \
     d.line2 AS delivery_line2, d.zip AS delivery_zip";
