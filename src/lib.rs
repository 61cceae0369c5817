pub mod config;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sink;
pub mod table;
