//! Typed, immutable snapshot of the six Olist tables.
//!
//! [`Dataset::from_tables`] checks every required column of every table
//! before converting a single row, so a schema problem surfaces as one
//! early [`OlistError::SchemaMismatch`] instead of failing mid-derivation.

use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use olist_shared::{
    Customer, Geolocation, OlistError, Order, OrderItem, OrderReview, Result, Seller,
    parse_timestamp,
};

use crate::table::{Column, Table, Value};
use crate::{LoadProgress, LoaderConfig, TableMap, load_tables};

/// Tables the feature builder reads, with the columns it needs from each.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "orders",
        &[
            "order_id",
            "customer_id",
            "order_status",
            "order_purchase_timestamp",
            "order_approved_at",
            "order_delivered_carrier_date",
            "order_delivered_customer_date",
            "order_estimated_delivery_date",
        ],
    ),
    ("order_reviews", &["review_id", "order_id", "review_score"]),
    (
        "order_items",
        &[
            "order_id",
            "order_item_id",
            "product_id",
            "seller_id",
            "price",
            "freight_value",
        ],
    ),
    ("sellers", &["seller_id", "seller_zip_code_prefix"]),
    ("customers", &["customer_id", "customer_zip_code_prefix"]),
    (
        "geolocation",
        &[
            "geolocation_zip_code_prefix",
            "geolocation_lat",
            "geolocation_lng",
        ],
    ),
];

/// Typed records for every table the feature builder consumes.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub orders: Vec<Order>,
    pub order_reviews: Vec<OrderReview>,
    pub order_items: Vec<OrderItem>,
    pub sellers: Vec<Seller>,
    pub customers: Vec<Customer>,
    pub geolocation: Vec<Geolocation>,
}

impl Dataset {
    /// Load the CSV directory described by `config` and build the snapshot.
    pub fn load(config: &LoaderConfig, progress: &dyn LoadProgress) -> Result<Self> {
        let tables = load_tables(config, progress)?;
        Self::from_tables(&tables)
    }

    /// Convert raw tables into typed records.
    #[instrument(skip_all, fields(tables = tables.len()))]
    pub fn from_tables(tables: &TableMap) -> Result<Self> {
        validate_schema(tables)?;

        let dataset = Self {
            orders: orders(table(tables, "orders")?)?,
            order_reviews: order_reviews(table(tables, "order_reviews")?)?,
            order_items: order_items(table(tables, "order_items")?)?,
            sellers: sellers(table(tables, "sellers")?)?,
            customers: customers(table(tables, "customers")?)?,
            geolocation: geolocation(table(tables, "geolocation")?)?,
        };

        debug!(
            orders = dataset.orders.len(),
            reviews = dataset.order_reviews.len(),
            items = dataset.order_items.len(),
            sellers = dataset.sellers.len(),
            customers = dataset.customers.len(),
            geolocation = dataset.geolocation.len(),
            "dataset snapshot built"
        );

        Ok(dataset)
    }
}

/// Check that every required table and column is present.
pub fn validate_schema(tables: &TableMap) -> Result<()> {
    for (name, columns) in REQUIRED_COLUMNS {
        let table = table(tables, name)?;
        for column in *columns {
            table.column(column)?;
        }
    }
    Ok(())
}

fn table<'a>(tables: &'a TableMap, name: &str) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| OlistError::schema_mismatch(name, "*"))
}

// ---------------------------------------------------------------------------
// Field coercion
// ---------------------------------------------------------------------------

/// A column bound to its table name for error reporting.
struct Field<'a> {
    table: &'a str,
    column: &'a Column,
}

impl<'a> Field<'a> {
    fn new(table: &'a Table, name: &str) -> Result<Self> {
        Ok(Self {
            table: table.name(),
            column: table.column(name)?,
        })
    }

    fn invalid(&self, row: usize, problem: impl std::fmt::Display) -> OlistError {
        OlistError::parse(format!(
            "table '{}' column '{}' row {}: {problem}",
            self.table,
            self.column.name(),
            row + 1
        ))
    }

    /// Identifiers and categorical strings. Numeric cells are rendered back to text.
    fn opt_text(&self, row: usize) -> Option<String> {
        match self.column.get(row) {
            Value::Null => None,
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    fn opt_i64(&self, row: usize) -> Result<Option<i64>> {
        match self.column.get(row) {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            Value::Float(v) if v.fract() == 0.0 => Ok(Some(*v as i64)),
            Value::Float(v) => Err(self.invalid(row, format!("expected integer, found {v}"))),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(row, format!("expected integer, found '{s}'"))),
        }
    }

    fn opt_f64(&self, row: usize) -> Result<Option<f64>> {
        match self.column.get(row) {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v as f64)),
            Value::Float(v) => Ok(Some(*v)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(row, format!("expected number, found '{s}'"))),
        }
    }

    fn opt_timestamp(&self, row: usize) -> Result<Option<NaiveDateTime>> {
        match self.column.get(row) {
            Value::Null => Ok(None),
            Value::Text(s) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| self.invalid(row, format!("invalid timestamp '{s}'"))),
            other => Err(self.invalid(row, format!("invalid timestamp {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-table conversion
// ---------------------------------------------------------------------------

/// Build one record per row that has a value in `key`.
///
/// Rows without a key cannot join to anything and are skipped; every other
/// missing value is kept as `None` for the derivations to drop.
fn keyed_rows<T>(
    table: &Table,
    key: &str,
    mut build: impl FnMut(String, usize) -> Result<T>,
) -> Result<Vec<T>> {
    let key = Field::new(table, key)?;
    let mut records = Vec::with_capacity(table.row_count());
    let mut skipped = 0usize;

    for row in 0..table.row_count() {
        match key.opt_text(row) {
            Some(id) => records.push(build(id, row)?),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(
            table = table.name(),
            column = key.column.name(),
            skipped,
            "rows without a key skipped"
        );
    }
    Ok(records)
}

fn orders(table: &Table) -> Result<Vec<Order>> {
    let customer_id = Field::new(table, "customer_id")?;
    let status = Field::new(table, "order_status")?;
    let purchase = Field::new(table, "order_purchase_timestamp")?;
    let approved = Field::new(table, "order_approved_at")?;
    let carrier = Field::new(table, "order_delivered_carrier_date")?;
    let delivered = Field::new(table, "order_delivered_customer_date")?;
    let estimated = Field::new(table, "order_estimated_delivery_date")?;

    keyed_rows(table, "order_id", |order_id, row| {
        Ok(Order {
            order_id,
            customer_id: customer_id.opt_text(row),
            order_status: status.opt_text(row),
            order_purchase_timestamp: purchase.opt_timestamp(row)?,
            order_approved_at: approved.opt_timestamp(row)?,
            order_delivered_carrier_date: carrier.opt_timestamp(row)?,
            order_delivered_customer_date: delivered.opt_timestamp(row)?,
            order_estimated_delivery_date: estimated.opt_timestamp(row)?,
        })
    })
}

fn order_reviews(table: &Table) -> Result<Vec<OrderReview>> {
    let review_id = Field::new(table, "review_id")?;
    let score = Field::new(table, "review_score")?;

    keyed_rows(table, "order_id", |order_id, row| {
        Ok(OrderReview {
            review_id: review_id.opt_text(row),
            order_id,
            review_score: score.opt_i64(row)?,
        })
    })
}

fn order_items(table: &Table) -> Result<Vec<OrderItem>> {
    let item_id = Field::new(table, "order_item_id")?;
    let product_id = Field::new(table, "product_id")?;
    let seller_id = Field::new(table, "seller_id")?;
    let price = Field::new(table, "price")?;
    let freight = Field::new(table, "freight_value")?;

    keyed_rows(table, "order_id", |order_id, row| {
        Ok(OrderItem {
            order_id,
            order_item_id: item_id.opt_i64(row)?,
            product_id: product_id.opt_text(row),
            seller_id: seller_id.opt_text(row),
            price: price.opt_f64(row)?,
            freight_value: freight.opt_f64(row)?,
        })
    })
}

fn sellers(table: &Table) -> Result<Vec<Seller>> {
    let prefix = Field::new(table, "seller_zip_code_prefix")?;

    keyed_rows(table, "seller_id", |seller_id, row| {
        Ok(Seller {
            seller_id,
            seller_zip_code_prefix: prefix.opt_i64(row)?,
        })
    })
}

fn customers(table: &Table) -> Result<Vec<Customer>> {
    let prefix = Field::new(table, "customer_zip_code_prefix")?;

    keyed_rows(table, "customer_id", |customer_id, row| {
        Ok(Customer {
            customer_id,
            customer_zip_code_prefix: prefix.opt_i64(row)?,
        })
    })
}

fn geolocation(table: &Table) -> Result<Vec<Geolocation>> {
    let prefix = Field::new(table, "geolocation_zip_code_prefix")?;
    let lat = Field::new(table, "geolocation_lat")?;
    let lng = Field::new(table, "geolocation_lng")?;

    (0..table.row_count())
        .map(|row| {
            Ok(Geolocation {
                geolocation_zip_code_prefix: prefix.opt_i64(row)?,
                geolocation_lat: lat.opt_f64(row)?,
                geolocation_lng: lng.opt_f64(row)?,
            })
        })
        .collect()
}
