//! Typed source records, one struct per loaded Olist table.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// `order_status` value of orders that reached the customer.
pub const DELIVERED_STATUS: &str = "delivered";

/// Timestamp layouts accepted in the orders table.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse an Olist timestamp. A bare date is read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// One row of the `orders` table.
///
/// Only `order_id` is guaranteed; rows without one are skipped at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: Option<String>,
    /// e.g. `delivered`, `shipped`, `canceled`.
    pub order_status: Option<String>,
    pub order_purchase_timestamp: Option<NaiveDateTime>,
    pub order_approved_at: Option<NaiveDateTime>,
    pub order_delivered_carrier_date: Option<NaiveDateTime>,
    pub order_delivered_customer_date: Option<NaiveDateTime>,
    pub order_estimated_delivery_date: Option<NaiveDateTime>,
}

impl Order {
    /// Whether the order reached the customer.
    pub fn is_delivered(&self) -> bool {
        self.order_status.as_deref() == Some(DELIVERED_STATUS)
    }
}

/// One row of the `order_reviews` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReview {
    pub review_id: Option<String>,
    pub order_id: String,
    /// Integer score in `1..=5`.
    pub review_score: Option<i64>,
}

/// One row of the `order_items` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    /// Sequence number of the item within its order, starting at 1.
    pub order_item_id: Option<i64>,
    pub product_id: Option<String>,
    pub seller_id: Option<String>,
    pub price: Option<f64>,
    pub freight_value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Parties and places
// ---------------------------------------------------------------------------

/// One row of the `sellers` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: String,
    pub seller_zip_code_prefix: Option<i64>,
}

/// One row of the `customers` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub customer_zip_code_prefix: Option<i64>,
}

/// One row of the `geolocation` table. Prefixes repeat across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub geolocation_zip_code_prefix: Option<i64>,
    pub geolocation_lat: Option<f64>,
    pub geolocation_lng: Option<f64>,
}
