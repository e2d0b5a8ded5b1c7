//! Storage Layer
//!
//! Persistence services: SQLite state store and JSON configuration.

pub mod config;
pub mod database;

pub use config::ConfigService;
pub use database::Database;
