//! Database module for the BiteReserve server
//!
//! Connection pool, migrations and the data access layer. Each entity's
//! queries live in their own file as an `impl DbOperations` block.

pub mod analytics;
pub mod billing;
pub mod campaigns;
pub mod models;
pub mod operations;
pub mod reservations;
pub mod restaurants;

pub use analytics::StatCounter;
pub use models::*;
pub use operations::{DbOperations, DbPoolStatus};
pub use reservations::NewReservation;
pub use restaurants::{NewRestaurant, RestaurantFilter, RestaurantUpdate};
