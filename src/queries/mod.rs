//! Query modules for the local catalog store.
//!
//! Each module provides a query struct that borrows from a
//! [`Connection`](crate::connection::Connection) and exposes methods
//! returning typed models.

pub mod prices;
pub mod products;

pub use prices::PriceQuery;
pub use products::ProductQuery;
