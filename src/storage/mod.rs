//! Storage implementations for different backends

pub mod in_memory;
mod matcher;
pub mod mongodb;

pub use in_memory::InMemoryStore;
pub use self::mongodb::MongoStore;
