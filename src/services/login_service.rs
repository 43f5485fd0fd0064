use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    db_persistence::{DbError, DbPersistence},
    metrics::{LOGIN_ATTEMPTS_TOTAL, LOGIN_CHALLENGES_ISSUED_TOTAL},
    models::{
        assertion::SignedAssertion, challenge::Challenge, chat::RequestContext, eth_address::EthAddress,
        identity::Identity, session::Session,
    },
    services::{
        chat_transport::{delete_best_effort, send_best_effort, ChatTransport},
        identity_locks::IdentityLocks,
        signature_service::{SigServiceError, SignatureService},
    },
};

const WELCOME_MESSAGE: &str =
    "Welcome to NFTChat! Here you can use your NFTs to join exclusive chatrooms with fellow NFT creators/collectors.";
const REPLY_FORMAT_MESSAGE: &str = "4) Copy/paste the resulting signature back here.\n(It should look something like this: `{\"address\": ..., \"msg\": ..., \"sig\": ...}`)";

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Signed payload could not be read: {0}")]
    BadAssertionFormat(String),
    #[error("Signature is malformed: {0}")]
    InvalidSignature(String),
    #[error("Signature does not match the pending challenge: {0}")]
    SignatureMismatch(String),
    #[error("Challenge issued at {0} has expired")]
    ChallengeExpired(DateTime<Utc>),
    #[error("No pending challenge")]
    NoPendingChallenge,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),
}

impl From<SigServiceError> for LoginError {
    fn from(err: SigServiceError) -> Self {
        match err {
            SigServiceError::Hex(e) => LoginError::InvalidSignature(e.to_string()),
            SigServiceError::InvalidSignature(e) => LoginError::InvalidSignature(e),
            mismatch @ SigServiceError::Mismatch { .. } => LoginError::SignatureMismatch(mismatch.to_string()),
        }
    }
}

impl LoginError {
    /// The single chat reply this failure turns into. `None` means the
    /// message is ignored without a reply.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            LoginError::BadAssertionFormat(_) => Some("Oops, I wasn't able to read that signature! Try again."),
            LoginError::InvalidSignature(_) | LoginError::SignatureMismatch(_) => {
                Some("Oops, that signature is invalid! Try again.")
            }
            LoginError::ChallengeExpired(_) => Some("That login message has expired. Send !login to get a new one."),
            LoginError::StoreUnavailable(_) => Some("Something went wrong on my end. Please try again in a moment."),
            LoginError::NoPendingChallenge => None,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            LoginError::BadAssertionFormat(_) => "bad_assertion_format",
            LoginError::InvalidSignature(_) => "invalid_signature",
            LoginError::SignatureMismatch(_) => "signature_mismatch",
            LoginError::ChallengeExpired(_) => "challenge_expired",
            LoginError::NoPendingChallenge => "no_pending_challenge",
            LoginError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

pub type LoginResult<T> = Result<T, LoginError>;

/// Where an identity stands, derived from which store entries exist. A
/// pending challenge wins over an existing session: the user is
/// re-authenticating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    ChallengeIssued,
    Authenticated,
}

/// Drives the challenge-response login. The only writer of the challenge and
/// session stores; every mutation for an identity runs under that identity's
/// lock.
#[derive(Clone)]
pub struct LoginService {
    db: Arc<DbPersistence>,
    transport: Arc<dyn ChatTransport>,
    locks: IdentityLocks,
    signing_tool_url: String,
    challenge_ttl: Duration,
}

impl LoginService {
    pub fn new(db: Arc<DbPersistence>, transport: Arc<dyn ChatTransport>, config: &Config) -> Self {
        Self {
            db,
            transport,
            locks: IdentityLocks::new(),
            signing_tool_url: config.login.signing_tool_url.clone(),
            challenge_ttl: config.get_challenge_ttl(),
        }
    }

    pub async fn login_state(&self, identity: &Identity) -> LoginResult<LoginState> {
        if self.db.challenges.get(identity).await?.is_some() {
            return Ok(LoginState::ChallengeIssued);
        }

        if self.db.sessions.get(identity).await?.is_some() {
            return Ok(LoginState::Authenticated);
        }

        Ok(LoginState::Unauthenticated)
    }

    pub async fn session(&self, identity: &Identity) -> LoginResult<Option<Session>> {
        Ok(self.db.sessions.get(identity).await?)
    }

    /// Replaces any pending challenge with a fresh one and walks the user
    /// through signing it. An existing session is left alone.
    pub async fn issue_challenge(&self, ctx: &RequestContext) -> LoginResult<Challenge> {
        let _guard = self.locks.lock(&ctx.sender).await;

        let challenge = Challenge::issue(ctx.sender.clone());

        if let Err(e) = self.db.challenges.put(&ctx.sender, &challenge).await {
            error!(identity = %ctx.sender, error = %e, "Failed to persist login challenge");
            let err = LoginError::StoreUnavailable(e);
            self.reply_failure(ctx, &err).await;
            return Err(err);
        }

        LOGIN_CHALLENGES_ISSUED_TOTAL.inc();
        info!(identity = %ctx.sender, "Issued login challenge");

        for text in challenge_instructions(&self.signing_tool_url, &challenge.nonce) {
            send_best_effort(self.transport.as_ref(), &ctx.conversation_id, &text).await;
        }

        Ok(challenge)
    }

    /// Checks a pasted signature against the pending challenge. On success the
    /// session is written and the challenge consumed; on failure the
    /// challenge stays so the user can paste again. Once a pending challenge
    /// is confirmed the pasted message is deleted either way.
    pub async fn submit_signature(&self, ctx: &RequestContext, payload: &str) -> LoginResult<Session> {
        let _guard = self.locks.lock(&ctx.sender).await;

        // Until a challenge is known to exist the message may be ordinary
        // chatter: a failed lookup is logged, never answered.
        let challenge = match self.db.challenges.get(&ctx.sender).await {
            Ok(Some(challenge)) => challenge,
            Ok(None) => return Err(LoginError::NoPendingChallenge),
            Err(e) => {
                error!(identity = %ctx.sender, error = %e, "Failed to look up pending challenge");
                return Err(LoginError::StoreUnavailable(e));
            }
        };

        let result = self.verify_and_authenticate(ctx, &challenge, payload).await;

        delete_best_effort(self.transport.as_ref(), &ctx.conversation_id, &ctx.message_id).await;

        match result {
            Ok((session, claimed)) => {
                LOGIN_ATTEMPTS_TOTAL.with_label_values(&["verified"]).inc();
                info!(identity = %ctx.sender, address = %session.address, "Login verified");
                send_best_effort(
                    self.transport.as_ref(),
                    &ctx.conversation_id,
                    &format!("You are now logged in with your Ethereum address: {}", claimed),
                )
                .await;

                Ok(session)
            }
            Err(e) => {
                LOGIN_ATTEMPTS_TOTAL.with_label_values(&[e.outcome()]).inc();
                match &e {
                    LoginError::StoreUnavailable(_) => {
                        error!(identity = %ctx.sender, error = %e, "Login failed on store access")
                    }
                    _ => warn!(identity = %ctx.sender, error = %e, "Login attempt rejected"),
                }
                self.reply_failure(ctx, &e).await;

                Err(e)
            }
        }
    }

    /// Returns the new session and the address as the user claimed it.
    async fn verify_and_authenticate(
        &self,
        ctx: &RequestContext,
        challenge: &Challenge,
        payload: &str,
    ) -> LoginResult<(Session, EthAddress)> {
        if challenge.is_expired(self.challenge_ttl, Utc::now()) {
            self.db.challenges.delete(&ctx.sender).await?;
            return Err(LoginError::ChallengeExpired(challenge.issued_at));
        }

        let assertion = SignedAssertion::parse(payload).map_err(|e| LoginError::BadAssertionFormat(e.to_string()))?;

        if assertion.msg != challenge.nonce {
            debug!(identity = %ctx.sender, "Claimed message differs from the pending challenge");
        }

        let recovered = SignatureService::verify(&challenge.nonce, &assertion.address, &assertion.sig)?;

        // Session before challenge removal: if either write fails the
        // challenge is still there and the same signature can be resubmitted.
        let session = Session::new(ctx.sender.clone(), EthAddress::from_recovered(recovered));
        self.db.sessions.put(&session).await?;
        self.db.challenges.delete(&ctx.sender).await?;

        Ok((session, assertion.address))
    }

    async fn reply_failure(&self, ctx: &RequestContext, err: &LoginError) {
        if let Some(text) = err.user_message() {
            send_best_effort(self.transport.as_ref(), &ctx.conversation_id, text).await;
        }
    }
}

fn challenge_instructions(signing_tool_url: &str, nonce: &str) -> [String; 4] {
    [
        WELCOME_MESSAGE.to_string(),
        format!(
            "Here's how to log in:\n1) Go to {}\n2) Connect the Ethereum wallet you use to mint/collect NFTs\n3) Copy/paste the following message and sign it:",
            signing_tool_url
        ),
        format!("`{}`", nonce),
        REPLY_FORMAT_MESSAGE.to_string(),
    ]
}
