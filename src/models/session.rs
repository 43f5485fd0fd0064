use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{eth_address::EthAddress, identity::Identity};

/// Binds an identity to the wallet it proved control of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner: Identity,
    pub address: EthAddress,
    pub verified_at: DateTime<Utc>,
}

impl Session {
    pub fn new(owner: Identity, address: EthAddress) -> Self {
        Session {
            owner,
            address,
            verified_at: Utc::now(),
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            address: self.address.clone(),
            verified_at: self.verified_at,
        }
    }

    pub fn from_record(owner: Identity, record: SessionRecord) -> Self {
        Session {
            owner,
            address: record.address,
            verified_at: record.verified_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub address: EthAddress,
    pub verified_at: DateTime<Utc>,
}
