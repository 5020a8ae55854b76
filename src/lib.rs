pub mod config;
pub mod migration;
pub mod storage;
pub mod types;
pub mod user_source;
