use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ModelError, ModelResult};

/// An Ethereum address as the user wrote it. Mixed-case input must carry a
/// valid EIP-55 checksum; all-lowercase and all-uppercase input is accepted
/// as is.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct EthAddress(pub String);

impl EthAddress {
    pub fn from(input: &str) -> ModelResult<Self> {
        let input = input.trim();
        parse_eth_address(input).map_err(ModelError::InvalidInput)?;

        Ok(EthAddress(input.to_string()))
    }

    /// Builds the canonical checksummed form of a recovered signer.
    pub fn from_recovered(address: Address) -> Self {
        EthAddress(address.to_checksum(None))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a recovered signer.
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.to_string())
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_eth_address(input: &str) -> Result<Address, String> {
    let Some(hex_part) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) else {
        return Err(format!("ETH address must start with 0x, got: {}", input));
    };

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("ETH address must be 40 hex characters, got: {}", input));
    }

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{}", hex_part), None)
            .map_err(|_| format!("Invalid ETH address checksum: {}", input))
    } else {
        hex_part
            .parse::<Address>()
            .map_err(|e| format!("Invalid ETH address {}: {}", input, e))
    }
}
