pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod host;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
