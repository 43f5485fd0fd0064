#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid data input: {0}")]
    InvalidInput(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

pub mod assertion;
pub mod challenge;
pub mod chat;
pub mod eth_address;
pub mod holdings;
pub mod identity;
pub mod session;
