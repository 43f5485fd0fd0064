use std::sync::Arc;

use alloy::signers::{local::PrivateKeySigner, SignerSync};

use crate::{
    config::Config,
    db_persistence::DbPersistence,
    models::{
        chat::{ConversationId, MessageId, RequestContext},
        identity::Identity,
    },
    services::login_service::LoginService,
    utils::{test_kv_store::InMemoryKvStore, test_transport::RecordingTransport},
};

pub struct TestLogin {
    pub config: Config,
    pub store: Arc<InMemoryKvStore>,
    pub transport: Arc<RecordingTransport>,
    pub db: Arc<DbPersistence>,
    pub service: Arc<LoginService>,
}

pub fn create_test_login() -> TestLogin {
    let config = Config::load_test_env().expect("Failed to load test configuration");
    let store = Arc::new(InMemoryKvStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let db = Arc::new(DbPersistence::with_store(store.clone(), &config.data.namespace));
    let service = Arc::new(LoginService::new(db.clone(), transport.clone(), &config));

    TestLogin {
        config,
        store,
        transport,
        db,
        service,
    }
}

/// A message from `sender` in their private chat with the bot.
pub fn context(sender: &str, message_id: &str) -> RequestContext {
    RequestContext {
        sender: Identity::new(sender),
        conversation_id: ConversationId(format!("chat-{}", sender)),
        message_id: MessageId(message_id.to_string()),
    }
}

pub fn sign_hex(signer: &PrivateKeySigner, message: &str) -> String {
    let signature = signer
        .sign_message_sync(message.as_bytes())
        .expect("Failed to sign message");

    format!("0x{}", hex::encode(signature.as_bytes()))
}

/// The JSON a signing tool would produce for a signature over `signed`,
/// claiming `claimed_msg` as the message.
pub fn signed_payload(signer: &PrivateKeySigner, claimed_msg: &str, signed: &str) -> String {
    serde_json::json!({
        "address": signer.address().to_string(),
        "msg": claimed_msg,
        "sig": sign_hex(signer, signed),
        "version": "2",
    })
    .to_string()
}

pub fn extract_nonce(text: &str) -> String {
    text.trim_matches('`').to_string()
}
