pub mod db;
pub mod memory;

pub use db::{
    apply_operations, create_db, get_payloads, get_sources, load_events, DbError, DbPool,
    SourceRecord,
};
pub use memory::MemoryEventStore;
