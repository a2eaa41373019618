//! HTTP API handlers for meter-reading

pub mod health;
pub mod images;
pub mod measures;

pub use health::health_routes;
pub use images::get_image;
pub use measures::{confirm, list_measures, upload};
