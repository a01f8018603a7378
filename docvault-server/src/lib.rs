//! `docvault-server` exposes the docvault ingestion and retrieval pipeline
//! over HTTP (upload, search, health, reset, chat message) and ships the
//! `docvault` command-line binary.

pub mod config;
pub mod server;
pub mod staging;

pub use config::{EmbeddingKind, ServerConfig, StoreKind};
pub use server::{AppState, app_router, run_server};
pub use staging::{StagingArea, secure_filename};
