mod error;
mod models;
mod repository;
mod schema;

pub use error::DbError;
pub use models::*;
pub use repository::RikoDb;
