//! Postgres persistence: pool setup plus per-table query modules hung off
//! the shared [`Db`] handle.

pub mod db;
pub mod products;
pub mod ratings;
pub mod reports;
pub mod users;

pub use db::Db;
pub use products::{Product, ProductUpdate};
pub use ratings::{BulkRatingOutcome, NewRating, RatingRecord, RatingWithStats};
pub use users::WarningOutcome;
