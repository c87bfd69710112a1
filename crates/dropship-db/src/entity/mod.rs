//! # Host Entities
//!
//! Rows that carry composite money fields and sanitized JSON columns.
//!
//! - [`Order`] - shipping prices, totals and metadata
//! - [`ShippingZone`] - sanitized country list

pub mod order;
pub mod shipping;

pub use order::{Order, OrderStatus};
pub use shipping::ShippingZone;
