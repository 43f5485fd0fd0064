use crate::{
    db_persistence::DbError,
    services::{chat_transport::TransportError, holdings_service::HoldingsError},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Holdings client error: {0}")]
    Holdings(#[from] HoldingsError),
    #[error("Server error: {0}")]
    Server(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
