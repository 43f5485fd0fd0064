use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::Identity;

pub const NONCE_PREFIX: &str = "NFTChatLogin_";
pub const NONCE_ENTROPY_BYTES: usize = 32;

/// A pending login: the one message the owner has to sign to prove wallet
/// control. At most one exists per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub owner: Identity,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl Challenge {
    pub fn issue(owner: Identity) -> Self {
        Self::issue_at(owner, Utc::now())
    }

    pub fn issue_at(owner: Identity, issued_at: DateTime<Utc>) -> Self {
        Challenge {
            owner,
            nonce: generate_nonce(),
            issued_at,
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.issued_at > ttl
    }

    pub fn to_record(&self) -> LoginRecord {
        LoginRecord::ChallengeIssued {
            nonce: self.nonce.clone(),
            issued_at: self.issued_at,
        }
    }

    pub fn from_record(owner: Identity, record: LoginRecord) -> Self {
        match record {
            LoginRecord::ChallengeIssued { nonce, issued_at } => Challenge {
                owner,
                nonce,
                issued_at,
            },
        }
    }
}

/// Persisted form of a pending login, tagged with its state so richer states
/// can be added without a data migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginRecord {
    ChallengeIssued { nonce: String, issued_at: DateTime<Utc> },
}

/// `NFTChatLogin_` followed by 32 random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let entropy: [u8; NONCE_ENTROPY_BYTES] = rand::random();
    format!("{}{}", NONCE_PREFIX, hex::encode(entropy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_format() {
        let nonce = generate_nonce();
        let random_part = nonce.strip_prefix(NONCE_PREFIX).expect("nonce must carry the prefix");

        assert_eq!(random_part.len(), 64);
        assert!(random_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_nonces_are_unique() {
        let first = Challenge::issue(Identity::new("alice"));
        let second = Challenge::issue(Identity::new("alice"));

        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_expiry_window() {
        let issued_at = Utc::now();
        let challenge = Challenge::issue_at(Identity::new("alice"), issued_at);
        let ttl = Duration::minutes(10);

        assert!(!challenge.is_expired(ttl, issued_at + Duration::minutes(9)));
        assert!(!challenge.is_expired(ttl, issued_at + Duration::minutes(10)));
        assert!(challenge.is_expired(ttl, issued_at + Duration::minutes(11)));
    }

    #[test]
    fn test_record_is_tagged_with_state() {
        let challenge = Challenge::issue(Identity::new("alice"));
        let json = serde_json::to_value(challenge.to_record()).unwrap();

        assert_eq!(json["state"], "challenge_issued");
        assert_eq!(json["nonce"], challenge.nonce.as_str());

        let record: LoginRecord = serde_json::from_value(json).unwrap();
        assert_eq!(Challenge::from_record(Identity::new("alice"), record), challenge);
    }
}
