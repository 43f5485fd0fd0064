use serde::Deserialize;

use crate::models::{eth_address::EthAddress, ModelError, ModelResult};

#[derive(Debug, Deserialize)]
struct RawAssertion {
    address: String,
    msg: String,
    sig: String,
}

/// The JSON a signing tool produces, pasted back into the chat:
/// `{"address": ..., "msg": ..., "sig": ...}`.
#[derive(Debug, Clone)]
pub struct SignedAssertion {
    pub address: EthAddress,
    pub msg: String,
    pub sig: String,
}

impl SignedAssertion {
    pub fn parse(payload: &str) -> ModelResult<Self> {
        // Chat clients often keep the code-span backticks when copying.
        let json = payload.trim().trim_matches('`').trim();

        let raw: RawAssertion = serde_json::from_str(json).map_err(|e| ModelError::InvalidInput(e.to_string()))?;

        if raw.msg.is_empty() || raw.sig.trim().is_empty() {
            return Err(ModelError::InvalidInput("msg and sig must not be empty".to_string()));
        }

        Ok(SignedAssertion {
            address: EthAddress::from(&raw.address)?,
            msg: raw.msg,
            sig: raw.sig,
        })
    }
}
