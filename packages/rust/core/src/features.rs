//! Per-order feature derivations.
//!
//! [`OrderFeatures`] wraps an immutable [`Dataset`] snapshot. Each method
//! recomputes its table from the snapshot, so calls are independent and
//! repeatable. Aggregated tables are sorted by `order_id`; row-level
//! tables keep source order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;
use tracing::{debug, instrument};

use olist_loader::{Dataset, LoadProgress, LoaderConfig};
use olist_shared::Result;

use crate::geo::{GeoPoint, haversine_distance, reduce_geolocation};
use crate::join::{index_by, inner_join};

// ---------------------------------------------------------------------------
// Output rows
// ---------------------------------------------------------------------------

/// Wait-time derivation row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitTimeRow {
    pub order_id: String,
    /// Purchase to customer delivery.
    #[serde(serialize_with = "days::serialize_opt")]
    pub wait_time: Option<TimeDelta>,
    /// Purchase to estimated delivery.
    #[serde(serialize_with = "days::serialize_opt")]
    pub expected_wait_time: Option<TimeDelta>,
    /// Whole days delivered past the estimate, never negative.
    pub delay_vs_expected: i64,
    pub order_status: Option<String>,
}

/// Review-score derivation row. One per review, not per order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewScoreRow {
    pub order_id: String,
    pub dim_is_five_star: u8,
    pub dim_is_one_star: u8,
    pub review_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCountRow {
    pub order_id: String,
    /// Sum of `order_item_id` over the order's items.
    pub number_of_products: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerCountRow {
    pub order_id: String,
    pub number_of_sellers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFreightRow {
    pub order_id: String,
    pub price: f64,
    pub freight_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceRow {
    pub order_id: String,
    /// Mean seller-customer haversine distance in km.
    pub distance_seller_customer: f64,
}

/// Durations serialize as fractional days.
pub(crate) mod days {
    use chrono::TimeDelta;
    use serde::Serializer;

    pub fn to_days(delta: &TimeDelta) -> f64 {
        delta.num_milliseconds() as f64 / 86_400_000.0
    }

    pub fn serialize<S: Serializer>(delta: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(to_days(delta))
    }

    pub fn serialize_opt<S: Serializer>(
        delta: &Option<TimeDelta>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match delta {
            Some(delta) => s.serialize_some(&to_days(delta)),
            None => s.serialize_none(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderFeatures
// ---------------------------------------------------------------------------

/// Feature builder over a loaded dataset.
#[derive(Debug, Clone)]
pub struct OrderFeatures {
    data: Arc<Dataset>,
}

impl OrderFeatures {
    /// Wrap an already-loaded snapshot.
    pub fn new(data: Arc<Dataset>) -> Self {
        Self { data }
    }

    /// Load the CSV directory and wrap the result.
    pub fn load(config: &LoaderConfig, progress: &dyn LoadProgress) -> Result<Self> {
        Ok(Self::new(Arc::new(Dataset::load(config, progress)?)))
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Wait time, expected wait time and delay per order.
    ///
    /// With `is_delivered` only delivered orders are kept; otherwise every
    /// status passes. A missing timestamp leaves its duration empty and the
    /// delay at zero.
    #[instrument(skip(self))]
    pub fn wait_time(&self, is_delivered: bool) -> Vec<WaitTimeRow> {
        let rows: Vec<_> = self
            .data
            .orders
            .iter()
            .filter(|o| !is_delivered || o.is_delivered())
            .map(|o| {
                let purchase = o.order_purchase_timestamp;
                let delivered = o.order_delivered_customer_date;
                let estimated = o.order_estimated_delivery_date;

                let delay_vs_expected = match (delivered, estimated) {
                    (Some(d), Some(e)) => (d - e).num_days().max(0),
                    _ => 0,
                };

                WaitTimeRow {
                    order_id: o.order_id.clone(),
                    wait_time: delivered.zip(purchase).map(|(d, p)| d - p),
                    expected_wait_time: estimated.zip(purchase).map(|(e, p)| e - p),
                    delay_vs_expected,
                    order_status: o.order_status.clone(),
                }
            })
            .collect();

        debug!(rows = rows.len(), "wait-time table derived");
        rows
    }

    /// Five-star and one-star indicators per review.
    #[instrument(skip(self))]
    pub fn review_score(&self) -> Vec<ReviewScoreRow> {
        let rows: Vec<_> = self
            .data
            .order_reviews
            .iter()
            .map(|r| ReviewScoreRow {
                order_id: r.order_id.clone(),
                dim_is_five_star: u8::from(r.review_score == Some(5)),
                dim_is_one_star: u8::from(r.review_score == Some(1)),
                review_score: r.review_score,
            })
            .collect();

        debug!(rows = rows.len(), "review-score table derived");
        rows
    }

    /// Sum of item sequence numbers per order. Missing numbers are skipped.
    #[instrument(skip(self))]
    pub fn number_products(&self) -> Vec<ProductCountRow> {
        let mut sums: BTreeMap<&str, i64> = BTreeMap::new();
        for item in &self.data.order_items {
            *sums.entry(&item.order_id).or_default() += item.order_item_id.unwrap_or(0);
        }

        let rows: Vec<_> = sums
            .into_iter()
            .map(|(order_id, number_of_products)| ProductCountRow {
                order_id: order_id.to_string(),
                number_of_products,
            })
            .collect();

        debug!(rows = rows.len(), "product-count table derived");
        rows
    }

    /// Distinct sellers per order. Items without a seller are not counted.
    #[instrument(skip(self))]
    pub fn number_sellers(&self) -> Vec<SellerCountRow> {
        let mut sellers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for item in &self.data.order_items {
            let ids = sellers.entry(&item.order_id).or_default();
            if let Some(seller_id) = item.seller_id.as_deref() {
                ids.insert(seller_id);
            }
        }

        let rows: Vec<_> = sellers
            .into_iter()
            .map(|(order_id, ids)| SellerCountRow {
                order_id: order_id.to_string(),
                number_of_sellers: ids.len(),
            })
            .collect();

        debug!(rows = rows.len(), "seller-count table derived");
        rows
    }

    /// Total price and freight per order. Missing values are skipped.
    #[instrument(skip(self))]
    pub fn price_and_freight(&self) -> Vec<PriceFreightRow> {
        let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for item in &self.data.order_items {
            let (price, freight) = totals.entry(&item.order_id).or_default();
            *price += item.price.filter(|v| !v.is_nan()).unwrap_or(0.0);
            *freight += item.freight_value.filter(|v| !v.is_nan()).unwrap_or(0.0);
        }

        let rows: Vec<_> = totals
            .into_iter()
            .map(|(order_id, (price, freight_value))| PriceFreightRow {
                order_id: order_id.to_string(),
                price,
                freight_value,
            })
            .collect();

        debug!(rows = rows.len(), "price/freight table derived");
        rows
    }

    /// Mean seller-customer distance per order.
    ///
    /// Item rows without a seller, orders without a customer, and rows whose
    /// prefixes have no known coordinates are dropped before averaging;
    /// orders left with no rows are absent.
    #[instrument(skip(self))]
    pub fn distance_seller_customer(&self) -> Vec<DistanceRow> {
        let data = &*self.data;
        let points = reduce_geolocation(&data.geolocation);
        let locate = |prefix: Option<i64>| -> GeoPoint {
            prefix
                .and_then(|p| points.get(&p).copied())
                .unwrap_or_default()
        };

        let seller_geo: HashMap<&str, Vec<GeoPoint>> = index_by(&data.sellers, |s| s.seller_id.as_str())
            .into_iter()
            .map(|(id, rows)| {
                let geo: Vec<GeoPoint> =
                    rows.iter().map(|s| locate(s.seller_zip_code_prefix)).collect();
                (id, geo)
            })
            .collect();
        let customer_geo: HashMap<&str, Vec<GeoPoint>> =
            index_by(&data.customers, |c| c.customer_id.as_str())
                .into_iter()
                .map(|(id, rows)| {
                    let geo: Vec<GeoPoint> = rows
                        .iter()
                        .map(|c| locate(c.customer_zip_code_prefix))
                        .collect();
                    (id, geo)
                })
                .collect();

        // Orders without items carry no seller and drop out at the seller join.
        let items = index_by(&data.order_items, |i| i.order_id.as_str());
        let order_sellers = inner_join(
            &data.orders,
            &items,
            |o| o.order_id.as_str(),
            |&o, i| {
                (
                    o.order_id.as_str(),
                    o.customer_id.as_deref(),
                    i.seller_id.as_deref(),
                )
            },
        );

        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for (order_id, customer_id, seller_id) in order_sellers {
            let (Some(sellers), Some(customers)) = (
                seller_id.and_then(|id| seller_geo.get(id)),
                customer_id.and_then(|id| customer_geo.get(id)),
            ) else {
                continue;
            };
            for seller in sellers {
                for customer in customers {
                    let (Some((s_lng, s_lat)), Some((c_lng, c_lat))) =
                        (seller.lng_lat(), customer.lng_lat())
                    else {
                        continue;
                    };
                    let (sum, count) = sums.entry(order_id).or_default();
                    *sum += haversine_distance(s_lng, s_lat, c_lng, c_lat);
                    *count += 1;
                }
            }
        }

        let rows: Vec<_> = sums
            .into_iter()
            .map(|(order_id, (sum, count))| DistanceRow {
                order_id: order_id.to_string(),
                distance_seller_customer: sum / count as f64,
            })
            .collect();

        debug!(rows = rows.len(), "distance table derived");
        rows
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use olist_loader::SilentProgress;
    use olist_shared::{
        Customer, Geolocation, Order, OrderItem, OrderReview, Seller, parse_timestamp,
    };

    pub(crate) fn fixture_features() -> OrderFeatures {
        let config = LoaderConfig::default().with_root("../../../fixtures/olist");
        OrderFeatures::load(&config, &SilentProgress).expect("load fixtures")
    }

    pub(crate) fn order(
        id: &str,
        status: &str,
        purchase: &str,
        delivered: Option<&str>,
        estimated: Option<&str>,
    ) -> Order {
        Order {
            order_id: id.into(),
            customer_id: Some(format!("c-{id}")),
            order_status: Some(status.into()),
            order_purchase_timestamp: parse_timestamp(purchase),
            order_approved_at: None,
            order_delivered_carrier_date: None,
            order_delivered_customer_date: delivered.and_then(parse_timestamp),
            order_estimated_delivery_date: estimated.and_then(parse_timestamp),
        }
    }

    pub(crate) fn review(order_id: &str, score: Option<i64>) -> OrderReview {
        OrderReview {
            review_id: Some(format!("r-{order_id}")),
            order_id: order_id.into(),
            review_score: score,
        }
    }

    pub(crate) fn item(
        order_id: &str,
        seq: i64,
        seller: &str,
        price: f64,
        freight: f64,
    ) -> OrderItem {
        OrderItem {
            order_id: order_id.into(),
            order_item_id: Some(seq),
            product_id: Some(format!("p-{order_id}-{seq}")),
            seller_id: Some(seller.into()),
            price: Some(price),
            freight_value: Some(freight),
        }
    }

    fn features(dataset: Dataset) -> OrderFeatures {
        OrderFeatures::new(Arc::new(dataset))
    }

    fn as_days(delta: Option<TimeDelta>) -> f64 {
        days::to_days(&delta.expect("duration"))
    }

    #[test]
    fn wait_time_filters_delivered_by_default() {
        let f = fixture_features();
        let rows = f.wait_time(true);
        let ids: Vec<_> = rows.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(ids, ["o1", "o2", "o3", "o4", "o5"]);
        assert!(rows.iter().all(|r| r.order_status.as_deref() == Some("delivered")));
    }

    #[test]
    fn wait_time_without_filter_keeps_every_status() {
        let f = fixture_features();
        let rows = f.wait_time(false);
        assert_eq!(rows.len(), 7);

        let shipped = rows.iter().find(|r| r.order_id == "o6").unwrap();
        assert_eq!(shipped.wait_time, None);
        assert!(shipped.expected_wait_time.is_some());
        assert_eq!(shipped.delay_vs_expected, 0);
    }

    #[test]
    fn wait_time_values() {
        let f = fixture_features();
        let rows = f.wait_time(true);

        // o1: delivered after four days, five days early.
        assert!((as_days(rows[0].wait_time) - 4.0).abs() < 1e-9);
        assert!((as_days(rows[0].expected_wait_time) - (8.0 + 14.0 / 24.0)).abs() < 1e-9);
        assert_eq!(rows[0].delay_vs_expected, 0);

        // o2: 5 days 12 hours late counts as 5 whole days.
        assert_eq!(rows[1].delay_vs_expected, 5);
        // o4: 5 days 15 hours late.
        assert_eq!(rows[3].delay_vs_expected, 5);
    }

    #[test]
    fn delay_is_never_negative_and_waits_are_non_negative() {
        let f = fixture_features();
        for row in f.wait_time(false) {
            assert!(row.delay_vs_expected >= 0);
        }
        for row in f.wait_time(true) {
            assert!(as_days(row.wait_time) >= 0.0);
            assert!(as_days(row.expected_wait_time) >= 0.0);
        }
    }

    #[test]
    fn early_delivery_has_zero_delay() {
        let f = features(Dataset {
            orders: vec![order(
                "early",
                "delivered",
                "2018-01-01 00:00:00",
                Some("2018-01-02 00:00:00"),
                Some("2018-01-20 00:00:00"),
            )],
            ..Default::default()
        });
        assert_eq!(f.wait_time(true)[0].delay_vs_expected, 0);
    }

    #[test]
    fn review_flags_are_exclusive() {
        let f = fixture_features();
        let rows = f.review_score();
        assert_eq!(rows.len(), 5);
        for row in &rows {
            assert!(!(row.dim_is_five_star == 1 && row.dim_is_one_star == 1));
        }
        assert_eq!((rows[0].dim_is_five_star, rows[0].dim_is_one_star), (1, 0));
        assert_eq!((rows[1].dim_is_five_star, rows[1].dim_is_one_star), (0, 1));
        assert_eq!((rows[2].dim_is_five_star, rows[2].dim_is_one_star), (0, 0));
    }

    #[test]
    fn reviews_are_not_aggregated() {
        let f = features(Dataset {
            order_reviews: vec![review("o1", Some(5)), review("o1", Some(1)), review("o2", None)],
            ..Default::default()
        });
        let rows = f.review_score();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].review_score, None);
        assert_eq!((rows[2].dim_is_five_star, rows[2].dim_is_one_star), (0, 0));
    }

    #[test]
    fn number_products_sums_sequence_numbers() {
        let f = fixture_features();
        let rows = f.number_products();
        let by_id: HashMap<_, _> = rows
            .iter()
            .map(|r| (r.order_id.as_str(), r.number_of_products))
            .collect();
        assert_eq!(by_id["o1"], 3);
        assert_eq!(by_id["o2"], 1);
        assert_eq!(by_id["o3"], 6);
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn number_sellers_counts_distinct() {
        let f = fixture_features();
        let rows = f.number_sellers();
        let by_id: HashMap<_, _> = rows
            .iter()
            .map(|r| (r.order_id.as_str(), r.number_of_sellers))
            .collect();
        assert_eq!(by_id["o1"], 1);
        assert_eq!(by_id["o3"], 2);

        for row in &rows {
            let items = f
                .data()
                .order_items
                .iter()
                .filter(|i| i.order_id == row.order_id)
                .count();
            assert!(row.number_of_sellers <= items);
        }
    }

    #[test]
    fn price_and_freight_sum_per_order() {
        let f = features(Dataset {
            order_items: vec![item("o1", 1, "s1", 10.0, 2.0), item("o1", 2, "s1", 5.5, 1.0)],
            ..Default::default()
        });
        assert_eq!(
            f.price_and_freight(),
            vec![PriceFreightRow {
                order_id: "o1".into(),
                price: 15.5,
                freight_value: 3.0,
            }]
        );
    }

    #[test]
    fn price_and_freight_skip_missing_values() {
        let mut missing = item("o1", 2, "s1", 0.0, 0.0);
        missing.price = None;
        missing.freight_value = None;
        let f = features(Dataset {
            order_items: vec![item("o1", 1, "s1", 10.0, 2.0), missing],
            ..Default::default()
        });
        let rows = f.price_and_freight();
        assert_eq!(rows[0].price, 10.0);
        assert_eq!(rows[0].freight_value, 2.0);
    }

    #[test]
    fn aggregated_tables_sorted_and_unique() {
        let f = fixture_features();
        let ids: Vec<_> = f.price_and_freight().into_iter().map(|r| r.order_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn distance_matches_haversine_of_reduced_points() {
        let f = fixture_features();
        let rows = f.distance_seller_customer();
        let by_id: HashMap<_, _> = rows
            .iter()
            .map(|r| (r.order_id.as_str(), r.distance_seller_customer))
            .collect();

        // First known coordinates: 01037 from row 1, 20031 lat from row 2 and lng from row 1.
        let sp_rj = haversine_distance(-46.639292, -23.545621, -43.176309, -22.905817);

        assert!((by_id["o1"] - sp_rj).abs() < 1e-9);
        assert!((by_id["o2"] - sp_rj).abs() < 1e-9);
        // o3: one item at zero distance, two at sp_rj.
        assert!((by_id["o3"] - 2.0 * sp_rj / 3.0).abs() < 1e-9);
        assert_eq!(by_id["o5"], 0.0);
        assert_eq!(by_id["o6"], 0.0);
        // o4's seller prefix has no geolocation; o7 has no items.
        assert!(!by_id.contains_key("o4"));
        assert!(!by_id.contains_key("o7"));
    }

    #[test]
    fn distance_drops_customers_without_coordinates() {
        let f = features(Dataset {
            orders: vec![order("o1", "delivered", "2018-01-01 00:00:00", None, None)],
            order_items: vec![item("o1", 1, "s1", 1.0, 1.0)],
            sellers: vec![Seller {
                seller_id: "s1".into(),
                seller_zip_code_prefix: Some(1),
            }],
            customers: vec![Customer {
                customer_id: "c-o1".into(),
                customer_zip_code_prefix: None,
            }],
            geolocation: vec![Geolocation {
                geolocation_zip_code_prefix: Some(1),
                geolocation_lat: Some(0.0),
                geolocation_lng: Some(0.0),
            }],
            ..Default::default()
        });
        assert!(f.distance_seller_customer().is_empty());
    }

    #[test]
    fn missing_purchase_leaves_durations_empty() {
        let f = features(Dataset {
            orders: vec![order(
                "o1",
                "delivered",
                "",
                Some("2018-01-05 00:00:00"),
                Some("2018-01-02 00:00:00"),
            )],
            ..Default::default()
        });
        let rows = f.wait_time(true);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].wait_time, None);
        assert_eq!(rows[0].expected_wait_time, None);
        // The delay does not involve the purchase date.
        assert_eq!(rows[0].delay_vs_expected, 3);
    }

    #[test]
    fn order_without_status_only_passes_unfiltered() {
        let mut unknown = order("o1", "delivered", "2018-01-01 00:00:00", None, None);
        unknown.order_status = None;
        let f = features(Dataset {
            orders: vec![unknown],
            ..Default::default()
        });
        assert!(f.wait_time(true).is_empty());
        assert_eq!(f.wait_time(false)[0].order_status, None);
    }

    #[test]
    fn item_counts_skip_missing_ids() {
        let mut unnumbered = item("o1", 0, "s2", 1.0, 1.0);
        unnumbered.order_item_id = None;
        let mut unsold = item("o1", 3, "s1", 1.0, 1.0);
        unsold.seller_id = None;
        let mut bare = item("o2", 0, "s1", 1.0, 1.0);
        bare.order_item_id = None;
        bare.seller_id = None;

        let f = features(Dataset {
            order_items: vec![item("o1", 1, "s1", 1.0, 1.0), unnumbered, unsold, bare],
            ..Default::default()
        });

        let products: HashMap<_, _> = f
            .number_products()
            .into_iter()
            .map(|r| (r.order_id, r.number_of_products))
            .collect();
        assert_eq!(products["o1"], 4);
        assert_eq!(products["o2"], 0);

        let sellers: HashMap<_, _> = f
            .number_sellers()
            .into_iter()
            .map(|r| (r.order_id, r.number_of_sellers))
            .collect();
        assert_eq!(sellers["o1"], 2);
        assert_eq!(sellers["o2"], 0);
    }

    #[test]
    fn distance_drops_missing_seller_and_customer_ids() {
        let mut no_customer = order("o2", "delivered", "2018-01-01 00:00:00", None, None);
        no_customer.customer_id = None;
        let mut unsold = item("o1", 2, "s1", 1.0, 1.0);
        unsold.seller_id = None;

        let f = features(Dataset {
            orders: vec![
                order("o1", "delivered", "2018-01-01 00:00:00", None, None),
                no_customer,
            ],
            order_items: vec![item("o1", 1, "s1", 1.0, 1.0), unsold, item("o2", 1, "s1", 1.0, 1.0)],
            sellers: vec![Seller {
                seller_id: "s1".into(),
                seller_zip_code_prefix: Some(1),
            }],
            customers: vec![Customer {
                customer_id: "c-o1".into(),
                customer_zip_code_prefix: Some(2),
            }],
            geolocation: vec![
                Geolocation {
                    geolocation_zip_code_prefix: Some(1),
                    geolocation_lat: Some(0.0),
                    geolocation_lng: Some(0.0),
                },
                Geolocation {
                    geolocation_zip_code_prefix: Some(2),
                    geolocation_lat: Some(90.0),
                    geolocation_lng: Some(0.0),
                },
            ],
            ..Default::default()
        });

        let rows = f.distance_seller_customer();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, "o1");
        // Only the item with a seller is averaged.
        let quarter = haversine_distance(0.0, 0.0, 0.0, 90.0);
        assert!((rows[0].distance_seller_customer - quarter).abs() < 1e-9);
    }

    #[test]
    fn derivations_are_idempotent() {
        let f = fixture_features();
        assert_eq!(f.wait_time(false), f.wait_time(false));
        assert_eq!(f.review_score(), f.review_score());
        assert_eq!(f.number_products(), f.number_products());
        assert_eq!(f.number_sellers(), f.number_sellers());
        assert_eq!(f.price_and_freight(), f.price_and_freight());
        assert_eq!(f.distance_seller_customer(), f.distance_seller_customer());
    }

    #[test]
    fn wait_time_serializes_as_days() {
        let f = fixture_features();
        let json = serde_json::to_value(&f.wait_time(true)[0]).expect("serialize");
        assert_eq!(json["wait_time"], serde_json::json!(4.0));
        assert_eq!(json["delay_vs_expected"], serde_json::json!(0));
    }
}
