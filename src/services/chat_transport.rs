use async_trait::async_trait;

use crate::{
    metrics::TRANSPORT_ERRORS_TOTAL,
    models::{
        chat::{ConversationId, MessageId},
        identity::Identity,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Writer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Writer => "writer",
        }
    }
}

/// Outbound half of the messaging system. Text may contain backtick-delimited
/// code spans, which implementations render in their own markup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, conversation_id: &ConversationId, text: &str) -> TransportResult<()>;

    async fn delete_message(&self, conversation_id: &ConversationId, message_id: &MessageId) -> TransportResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn add_member(&self, group_id: &str, identity: &Identity, role: MemberRole) -> TransportResult<()>;
}

/// Sends and only logs a failure; the conversation carries on with the
/// user's next message.
pub async fn send_best_effort(transport: &dyn ChatTransport, conversation_id: &ConversationId, text: &str) -> bool {
    match transport.send(conversation_id, text).await {
        Ok(()) => true,
        Err(e) => {
            TRANSPORT_ERRORS_TOTAL.with_label_values(&["send"]).inc();
            tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to send message");
            false
        }
    }
}

pub async fn delete_best_effort(
    transport: &dyn ChatTransport,
    conversation_id: &ConversationId,
    message_id: &MessageId,
) -> bool {
    match transport.delete_message(conversation_id, message_id).await {
        Ok(()) => true,
        Err(e) => {
            TRANSPORT_ERRORS_TOTAL.with_label_values(&["delete_message"]).inc();
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %message_id,
                error = %e,
                "Failed to delete message"
            );
            false
        }
    }
}
