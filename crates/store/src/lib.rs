//! Record store implementations for vitalbot.

pub mod factory;
pub mod in_memory;
pub mod migrate;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use factory::open_store;
pub use in_memory::InMemoryStore;
pub use migrate::{CopyReport, ExportedRow, RecordSink, RecordSource, copy_records};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
