//! Shared types, error model, and configuration for the Olist feature tools.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`OlistError`], the unified error type
//! - Typed source records ([`Order`], [`OrderReview`], [`OrderItem`],
//!   [`Seller`], [`Customer`], [`Geolocation`])
//! - Configuration ([`AppConfig`], [`DataConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DataConfig, FeaturesConfig, config_dir, config_file_path, init_config,
    init_config_at, load_config, load_config_from,
};
pub use error::{OlistError, Result};
pub use types::{
    Customer, DELIVERED_STATUS, Geolocation, Order, OrderItem, OrderReview, Seller,
    parse_timestamp,
};
