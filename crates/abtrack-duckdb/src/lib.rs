pub mod backend;
pub mod cursor;
pub mod schema;
pub mod store_impl;

pub use backend::DuckDbEventStore;
