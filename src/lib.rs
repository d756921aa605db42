pub mod config;
pub mod crawler;
pub mod error;
pub mod ingest;
pub mod storage;
