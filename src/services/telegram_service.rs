use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::TelegramConfig,
    metrics::TRANSPORT_ERRORS_TOTAL,
    models::{
        chat::{ConversationId, IncomingMessage, MessageContent, MessageId},
        identity::Identity,
    },
    services::{
        chat_transport::{ChatTransport, GroupMembership, MemberRole, TransportError, TransportResult},
        command_router::CommandRouter,
    },
};

const MARKDOWN_V2_SPECIAL: &str = "_*[]()~`>#+-=|{}.!\\";
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Headroom on top of the long-poll timeout before reqwest gives up.
const POLL_REQUEST_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatInviteLink {
    invite_link: String,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct DeleteMessagePayload {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct GetUpdatesPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct CreateInviteLinkPayload {
    chat_id: i64,
    name: String,
    member_limit: u32,
}

#[derive(Serialize)]
struct BotCommand<'a> {
    command: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct SetCommandsPayload<'a> {
    commands: &'a [BotCommand<'a>],
}

#[derive(Serialize)]
struct EmptyPayload {}

const BOT_COMMANDS: &[BotCommand<'static>] = &[
    BotCommand {
        command: "login",
        description: "Log in with your Ethereum wallet",
    },
    BotCommand {
        command: "list",
        description: "List the NFTs held by your wallet",
    },
    BotCommand {
        command: "join",
        description: "Join an NFT holders room: /join [room]",
    },
];

impl Update {
    /// Only messages with a sender are routed; channel posts have none.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let sender = message.from?;

        Some(IncomingMessage {
            sender: Identity::new(sender.id.to_string()),
            conversation_id: ConversationId(message.chat.id.to_string()),
            message_id: MessageId(message.message_id.to_string()),
            content: match message.text {
                Some(text) => MessageContent::Text(text),
                None => MessageContent::Other,
            },
        })
    }
}

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramService {
    pub fn escape_markdown_v2(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len() * 2);
        for c in text.chars() {
            if MARKDOWN_V2_SPECIAL.contains(c) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    /// Escapes plain text and turns backtick pairs into MarkdownV2 code
    /// spans. An unpaired backtick is sent literally.
    pub fn format_markdown_v2(text: &str) -> String {
        let parts: Vec<&str> = text.split('`').collect();
        let balanced = parts.len() % 2 == 1;
        let mut formatted = String::with_capacity(text.len() * 2);

        for (i, part) in parts.iter().enumerate() {
            let is_code = i % 2 == 1;
            let is_last = i + 1 == parts.len();

            if is_code && (balanced || !is_last) {
                formatted.push('`');
                formatted.push_str(&part.replace('\\', "\\\\"));
                formatted.push('`');
            } else if is_code {
                formatted.push_str("\\`");
                formatted.push_str(&Self::escape_markdown_v2(part));
            } else {
                formatted.push_str(&Self::escape_markdown_v2(part));
            }
        }

        formatted
    }

    pub fn new(config: &TelegramConfig) -> TransportResult<Self> {
        let poll_timeout = Duration::from_secs(config.poll_timeout_seconds);
        let client = Client::builder().timeout(poll_timeout + POLL_REQUEST_GRACE).build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.base_url.trim_end_matches('/'), config.token),
            poll_timeout,
        })
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> TransportResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);

        let response = self.client.post(&url).json(payload).send().await?;
        let body: ApiResponse<T> = response.json().await?;

        if !body.ok {
            return Err(TransportError::Api {
                code: body.error_code.unwrap_or_default(),
                description: body.description.unwrap_or_default(),
            });
        }

        body.result.ok_or_else(|| TransportError::Api {
            code: 0,
            description: format!("{} returned no result", method),
        })
    }

    /// Authenticates the token. Failure here is fatal at startup.
    pub async fn get_me(&self) -> TransportResult<BotUser> {
        self.call("getMe", &EmptyPayload {}).await
    }

    /// Replaces whatever command menu the bot had with the current one.
    pub async fn advertise_commands(&self) -> TransportResult<()> {
        let _: bool = self.call("deleteMyCommands", &EmptyPayload {}).await?;
        let _: bool = self
            .call("setMyCommands", &SetCommandsPayload { commands: BOT_COMMANDS })
            .await?;

        Ok(())
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> TransportResult<Vec<Update>> {
        let payload = GetUpdatesPayload {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };

        self.call("getUpdates", &payload).await
    }

    /// Long-polls forever, handing each message to the router on its own
    /// task. Poll failures are retried after a short delay.
    pub async fn run_update_loop(&self, router: Arc<CommandRouter>) {
        let mut offset = None;

        info!("Listening for Telegram updates");

        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);

                        let Some(message) = update.into_incoming() else {
                            continue;
                        };

                        let router = router.clone();
                        tokio::spawn(async move {
                            router.handle_message(message).await;
                        });
                    }
                }
                Err(e) => {
                    TRANSPORT_ERRORS_TOTAL.with_label_values(&["get_updates"]).inc();
                    warn!(error = %e, "Failed to fetch Telegram updates, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}

fn parse_id(value: &str) -> TransportResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| TransportError::InvalidId(value.to_string()))
}

#[async_trait]
impl ChatTransport for TelegramService {
    async fn send(&self, conversation_id: &ConversationId, text: &str) -> TransportResult<()> {
        let chat_id = parse_id(&conversation_id.0)?;
        let formatted = Self::format_markdown_v2(text);

        let payload = SendMessagePayload {
            chat_id,
            text: &formatted,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };

        let _: serde_json::Value = self.call("sendMessage", &payload).await?;

        Ok(())
    }

    async fn delete_message(&self, conversation_id: &ConversationId, message_id: &MessageId) -> TransportResult<()> {
        let payload = DeleteMessagePayload {
            chat_id: parse_id(&conversation_id.0)?,
            message_id: parse_id(&message_id.0)?,
        };

        let _: bool = self.call("deleteMessage", &payload).await?;

        Ok(())
    }
}

#[async_trait]
impl GroupMembership for TelegramService {
    /// Telegram bots cannot add users to groups directly, so the member gets
    /// a single-use invite link in their private chat.
    async fn add_member(&self, group_id: &str, identity: &Identity, role: MemberRole) -> TransportResult<()> {
        let payload = CreateInviteLinkPayload {
            chat_id: parse_id(group_id)?,
            name: format!("{} {}", role.as_str(), identity),
            member_limit: 1,
        };

        let link: ChatInviteLink = self.call("createChatInviteLink", &payload).await?;
        debug!(group_id, identity = %identity, role = role.as_str(), "Created invite link");

        self.send(
            &ConversationId(identity.to_string()),
            &format!("Here is your invite link: {}", link.invite_link),
        )
        .await
    }
}
