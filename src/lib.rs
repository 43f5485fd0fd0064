//! # NFTChat Library
//!
//! A chat bot that proves control of an Ethereum wallet through a signed
//! challenge, then lists the wallet's NFTs and admits holders to gated
//! group chats.

pub mod args;
pub mod config;
pub mod db_persistence;
pub mod errors;
pub mod http_server;
pub mod metrics;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db_persistence::DbPersistence;
pub use http_server::AppState;
pub use services::{
    command_router::CommandRouter, holdings_service::HoldingsService, login_service::LoginService,
    telegram_service::TelegramService,
};

// Re-export errors
pub use db_persistence::DbError;
pub use errors::{AppError, AppResult};
pub use http_server::HttpServerError;
pub use services::{
    chat_transport::TransportError, command_router::CommandError, holdings_service::HoldingsError,
    login_service::LoginError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}

/// Get the library name
pub fn name() -> &'static str {
    NAME
}
