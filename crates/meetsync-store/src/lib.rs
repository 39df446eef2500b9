pub mod cache;
pub mod database;
pub mod error;
pub mod schema;
pub mod slots;

pub use cache::{CacheEntry, CacheRead, TtlCache, ACTIVE_SESSION_KEY, DEFAULT_TTL};
pub use database::Database;
pub use error::StoreError;
pub use slots::{SlotRepo, SlotRow};
