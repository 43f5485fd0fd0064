use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// Images, stickers, joins and every other non-text event.
    Other,
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub sender: Identity,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub content: MessageContent,
}

impl IncomingMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(body) => Some(body),
            MessageContent::Other => None,
        }
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            sender: self.sender.clone(),
            conversation_id: self.conversation_id.clone(),
            message_id: self.message_id.clone(),
        }
    }
}

/// Who sent the message being handled and where to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub sender: Identity,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
}
