//! Training-set assembly: inner-join every feature table on `order_id`.

use std::collections::HashMap;

use chrono::TimeDelta;
use serde::Serialize;
use tracing::{debug, info, instrument};

use olist_shared::AppConfig;

use crate::features::{OrderFeatures, ReviewScoreRow, WaitTimeRow};
use crate::join::{index_by, inner_join};

/// Flags for [`OrderFeatures::training_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOptions {
    /// Keep only delivered orders.
    pub is_delivered: bool,
    /// Join the mean seller-customer distance.
    pub with_distance_seller_customer: bool,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            is_delivered: true,
            with_distance_seller_customer: false,
        }
    }
}

impl From<&AppConfig> for TrainingOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            is_delivered: config.features.is_delivered,
            with_distance_seller_customer: config.features.with_distance_seller_customer,
        }
    }
}

/// One fully populated training row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRow {
    pub order_id: String,
    #[serde(serialize_with = "crate::features::days::serialize")]
    pub wait_time: TimeDelta,
    #[serde(serialize_with = "crate::features::days::serialize")]
    pub expected_wait_time: TimeDelta,
    pub delay_vs_expected: i64,
    pub order_status: String,
    pub dim_is_five_star: u8,
    pub dim_is_one_star: u8,
    pub review_score: i64,
    pub number_of_products: i64,
    pub number_of_sellers: usize,
    pub price: f64,
    pub freight_value: f64,
    /// Present only when the distance join was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_seller_customer: Option<f64>,
}

impl OrderFeatures {
    /// Join wait time, review score, product count, seller count and
    /// price/freight on `order_id`, plus distance when requested.
    ///
    /// Joins are inner joins in that order, so an order missing from any
    /// table is dropped. Orders with several reviews yield one row per
    /// review. Rows with any missing value are dropped at the end.
    #[instrument(skip(self))]
    pub fn training_data(&self, options: TrainingOptions) -> Vec<TrainingRow> {
        let wait_times = self.wait_time(options.is_delivered);
        let reviews = self.review_score();
        let products = self.number_products();
        let sellers = self.number_sellers();
        let totals = self.price_and_freight();
        let distances = options
            .with_distance_seller_customer
            .then(|| self.distance_seller_customer());

        let review_index = index_by(&reviews, |r| r.order_id.as_str());
        let products: HashMap<&str, i64> = products
            .iter()
            .map(|r| (r.order_id.as_str(), r.number_of_products))
            .collect();
        let sellers: HashMap<&str, usize> = sellers
            .iter()
            .map(|r| (r.order_id.as_str(), r.number_of_sellers))
            .collect();
        let totals: HashMap<&str, (f64, f64)> = totals
            .iter()
            .map(|r| (r.order_id.as_str(), (r.price, r.freight_value)))
            .collect();
        let distances: Option<HashMap<&str, f64>> = distances.as_ref().map(|rows| {
            rows.iter()
                .map(|r| (r.order_id.as_str(), r.distance_seller_customer))
                .collect()
        });

        let with_reviews: Vec<(&WaitTimeRow, &ReviewScoreRow)> = inner_join(
            &wait_times,
            &review_index,
            |w| w.order_id.as_str(),
            |&w, r| (w, r),
        );
        let joined = with_reviews.len();

        let rows: Vec<TrainingRow> = with_reviews
            .into_iter()
            .filter_map(|(wait, review)| {
                let id = wait.order_id.as_str();
                let number_of_products = *products.get(id)?;
                let number_of_sellers = *sellers.get(id)?;
                let (price, freight_value) = *totals.get(id)?;
                let distance_seller_customer = match &distances {
                    Some(distances) => Some(*distances.get(id)?),
                    None => None,
                };

                // Drop rows that carry any missing value.
                let row = TrainingRow {
                    order_id: wait.order_id.clone(),
                    wait_time: wait.wait_time?,
                    expected_wait_time: wait.expected_wait_time?,
                    delay_vs_expected: wait.delay_vs_expected,
                    order_status: wait.order_status.clone()?,
                    dim_is_five_star: review.dim_is_five_star,
                    dim_is_one_star: review.dim_is_one_star,
                    review_score: review.review_score?,
                    number_of_products,
                    number_of_sellers,
                    price,
                    freight_value,
                    distance_seller_customer,
                };
                row.is_complete().then_some(row)
            })
            .collect();

        debug!(wait_review_rows = joined, "wait-time joined with reviews");
        info!(rows = rows.len(), "training set assembled");
        rows
    }
}

impl TrainingRow {
    fn is_complete(&self) -> bool {
        let floats = [
            Some(self.price),
            Some(self.freight_value),
            self.distance_seller_customer,
        ];
        floats.iter().flatten().all(|v| !v.is_nan())
    }
}
