//! Order feature builder.
//!
//! This crate turns a loaded [`olist_loader::Dataset`] into per-order
//! feature tables and joins them into a training set
//! ([`OrderFeatures::training_data`]).

pub mod features;
pub mod geo;
pub mod join;
pub mod training;

pub use features::{
    DistanceRow, OrderFeatures, PriceFreightRow, ProductCountRow, ReviewScoreRow,
    SellerCountRow, WaitTimeRow,
};
pub use geo::haversine_distance;
pub use training::{TrainingOptions, TrainingRow};
