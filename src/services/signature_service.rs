use alloy::primitives::{Address, Signature};
use tracing::debug;

use crate::models::eth_address::EthAddress;

#[derive(Debug, thiserror::Error)]
pub enum SigServiceError {
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signer {recovered} does not match claimed address {claimed}")]
    Mismatch { claimed: String, recovered: Address },
}

pub type SigServiceResult<T> = Result<T, SigServiceError>;

pub struct SignatureService;

impl SignatureService {
    /// Recovers the signer of an EIP-191 personal message. The
    /// `"\x19Ethereum Signed Message:\n" + len` prefix is applied by the
    /// recovery primitive.
    pub fn recover_address(message: &[u8], signature_hex: &str) -> SigServiceResult<Address> {
        let signature_hex = signature_hex.trim();
        let sig_hex = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
        let sig_bytes = hex::decode(sig_hex)?;

        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| SigServiceError::InvalidSignature(e.to_string()))?;

        signature
            .recover_address_from_msg(message)
            .map_err(|e| SigServiceError::InvalidSignature(e.to_string()))
    }

    /// Checks that `signature_hex` signs exactly `expected_nonce` and was made
    /// by `claimed_address`. Whatever message the user claims to have signed
    /// plays no part in this.
    pub fn verify(expected_nonce: &str, claimed_address: &EthAddress, signature_hex: &str) -> SigServiceResult<Address> {
        let recovered = Self::recover_address(expected_nonce.as_bytes(), signature_hex)?;
        let ok = claimed_address.matches(&recovered);

        debug!(claimed = %claimed_address, recovered = %recovered, ok = ok, "SignatureService::verify");

        if !ok {
            return Err(SigServiceError::Mismatch {
                claimed: claimed_address.to_string(),
                recovered,
            });
        }

        Ok(recovered)
    }
}
