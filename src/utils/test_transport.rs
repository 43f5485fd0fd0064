use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    models::chat::{ConversationId, MessageId},
    services::chat_transport::{ChatTransport, TransportError, TransportResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

/// Records everything the bot sends. Every call yields to the scheduler first
/// so concurrent handlers get a chance to interleave.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<MessageId>>,
    fail_sends: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|message| message.text).collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, conversation_id: &ConversationId, text: &str) -> TransportResult<()> {
        tokio::task::yield_now().await;

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: 502,
                description: "Bad Gateway".to_string(),
            });
        }

        self.sent.lock().unwrap().push(SentMessage {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
        });

        Ok(())
    }

    async fn delete_message(&self, _conversation_id: &ConversationId, message_id: &MessageId) -> TransportResult<()> {
        tokio::task::yield_now().await;

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: 400,
                description: "Bad Request: message can't be deleted".to_string(),
            });
        }

        self.deleted.lock().unwrap().push(message_id.clone());

        Ok(())
    }
}
