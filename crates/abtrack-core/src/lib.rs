pub mod aggregator;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod request;
pub mod stats;
pub mod store;
pub mod writer;
