use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, RoomConfig},
    metrics::BOT_COMMANDS_TOTAL,
    models::{
        chat::{IncomingMessage, RequestContext},
        session::Session,
    },
    services::{
        chat_transport::{send_best_effort, ChatTransport, GroupMembership, MemberRole, TransportError},
        holdings_service::{format_holdings, HoldingsLookup},
        login_service::{LoginError, LoginService},
    },
};

const STORE_FAILURE_MESSAGE: &str = "Something went wrong on my end. Please try again in a moment.";
const MEMBERSHIP_FAILURE_MESSAGE: &str = "I couldn't add you to that room right now. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Raised by the login flow, which has already answered the user.
    #[error("Login flow failed: {0}")]
    Login(#[source] LoginError),
    #[error("Session lookup failed: {0}")]
    SessionLookup(#[source] LoginError),
    #[error("Group membership failed: {0}")]
    Membership(#[from] TransportError),
}

impl CommandError {
    fn user_message(&self) -> Option<&'static str> {
        match self {
            CommandError::Login(_) => None,
            CommandError::SessionLookup(_) => Some(STORE_FAILURE_MESSAGE),
            CommandError::Membership(_) => Some(MEMBERSHIP_FAILURE_MESSAGE),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    List,
    /// Room name as typed, possibly empty.
    Join(String),
    /// Anything else, including signature payloads.
    Other,
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Login => "login",
            Command::List => "list",
            Command::Join(_) => "join",
            Command::Other => "other",
        }
    }
}

/// Splits on the first whitespace run and recognizes `!cmd` or `/cmd`, with
/// an optional `@botname` suffix.
pub fn parse_command(text: &str) -> Command {
    let text = text.trim();
    let (head, argument) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };

    let Some(name) = head.strip_prefix('!').or_else(|| head.strip_prefix('/')) else {
        return Command::Other;
    };
    let name = name.split('@').next().unwrap_or_default();

    match name {
        "login" => Command::Login,
        "list" => Command::List,
        "join" => Command::Join(argument.to_string()),
        _ => Command::Other,
    }
}

/// Entry point for every inbound message. Errors stop here: each one becomes
/// at most a single reply and never reaches the update loop.
pub struct CommandRouter {
    login: Arc<LoginService>,
    holdings: Arc<dyn HoldingsLookup>,
    membership: Arc<dyn GroupMembership>,
    transport: Arc<dyn ChatTransport>,
    config: Arc<Config>,
}

impl CommandRouter {
    pub fn new(
        login: Arc<LoginService>,
        holdings: Arc<dyn HoldingsLookup>,
        membership: Arc<dyn GroupMembership>,
        transport: Arc<dyn ChatTransport>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            login,
            holdings,
            membership,
            transport,
            config,
        }
    }

    pub async fn handle_message(&self, message: IncomingMessage) {
        let Some(text) = message.text() else {
            return;
        };

        let ctx = message.context();
        let command = parse_command(text);
        BOT_COMMANDS_TOTAL.with_label_values(&[command.label()]).inc();

        let result = match command {
            Command::Login => self.handle_login(&ctx).await,
            Command::List => self.handle_list(&ctx).await,
            Command::Join(room) => self.handle_join(&ctx, &room).await,
            Command::Other => self.handle_other(&ctx, text).await,
        };

        if let Err(e) = result {
            self.report(&ctx, e).await;
        }
    }

    async fn handle_login(&self, ctx: &RequestContext) -> CommandResult<()> {
        self.login.issue_challenge(ctx).await.map_err(CommandError::Login)?;

        if let Some(session) = self.session(ctx).await? {
            self.send_holdings(ctx, &session).await;
        }

        Ok(())
    }

    async fn handle_list(&self, ctx: &RequestContext) -> CommandResult<()> {
        match self.session(ctx).await? {
            Some(session) => self.send_holdings(ctx, &session).await,
            None => {
                self.login.issue_challenge(ctx).await.map_err(CommandError::Login)?;
            }
        }

        Ok(())
    }

    async fn handle_join(&self, ctx: &RequestContext, room_name: &str) -> CommandResult<()> {
        let Some(room) = self.config.find_room(room_name) else {
            self.reply(ctx, &self.unknown_room_message(room_name)).await;
            return Ok(());
        };

        let Some(session) = self.session(ctx).await? else {
            self.login.issue_challenge(ctx).await.map_err(CommandError::Login)?;
            return Ok(());
        };

        if !self.is_eligible(&session, room).await {
            info!(identity = %ctx.sender, room = %room.name, "Join refused, required NFT not held");
            let contract = room.contract_address.as_deref().unwrap_or_default();
            self.reply(
                ctx,
                &format!(
                    "Sorry, {} is only open to holders of `{}`, and I couldn't find one in {}.",
                    room.name, contract, session.address
                ),
            )
            .await;
            return Ok(());
        }

        self.membership
            .add_member(&room.group_id, &ctx.sender, MemberRole::Writer)
            .await?;

        info!(identity = %ctx.sender, room = %room.name, "Member added to room");
        self.reply(
            ctx,
            &format!(
                "You're in! I sent you an invite link for {} in a private message.",
                room.name
            ),
        )
        .await;

        Ok(())
    }

    /// Free text only matters while a challenge is pending; otherwise it is
    /// ordinary chatter and gets no reply.
    async fn handle_other(&self, ctx: &RequestContext, text: &str) -> CommandResult<()> {
        match self.login.submit_signature(ctx, text).await {
            Ok(_) | Err(LoginError::NoPendingChallenge) => Ok(()),
            Err(e) => Err(CommandError::Login(e)),
        }
    }

    async fn is_eligible(&self, session: &Session, room: &RoomConfig) -> bool {
        let Some(contract) = room.contract_address.as_deref() else {
            return true;
        };

        self.holdings
            .holdings(&session.address)
            .await
            .iter()
            .filter(|chain| room.chain_id.map_or(true, |id| chain.chain_id == id))
            .any(|chain| chain.holds_contract(contract))
    }

    async fn session(&self, ctx: &RequestContext) -> CommandResult<Option<Session>> {
        self.login.session(&ctx.sender).await.map_err(CommandError::SessionLookup)
    }

    async fn send_holdings(&self, ctx: &RequestContext, session: &Session) {
        let holdings = self.holdings.holdings(&session.address).await;
        debug!(identity = %ctx.sender, chains = holdings.len(), "Listing holdings");
        self.reply(ctx, &format_holdings(&session.address, &holdings)).await;
    }

    fn unknown_room_message(&self, room_name: &str) -> String {
        let rooms: Vec<&str> = self.config.rooms.iter().map(|room| room.name.as_str()).collect();
        let available = if rooms.is_empty() {
            "none".to_string()
        } else {
            rooms.join(", ")
        };

        if room_name.trim().is_empty() {
            format!("Which room would you like to join? Available rooms: {}", available)
        } else {
            format!("I don't know a room called {}. Available rooms: {}", room_name.trim(), available)
        }
    }

    async fn reply(&self, ctx: &RequestContext, text: &str) {
        send_best_effort(self.transport.as_ref(), &ctx.conversation_id, text).await;
    }

    async fn report(&self, ctx: &RequestContext, err: CommandError) {
        match &err {
            CommandError::Login(e) => debug!(identity = %ctx.sender, error = %e, "Login flow ended with an error"),
            CommandError::SessionLookup(_) => error!(identity = %ctx.sender, error = %err, "Command failed"),
            CommandError::Membership(_) => warn!(identity = %ctx.sender, error = %err, "Command failed"),
        }

        if let Some(text) = err.user_message() {
            self.reply(ctx, text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            chat::{ConversationId, MessageContent, MessageId},
            eth_address::EthAddress,
            holdings::{ChainHoldings, TokenBalance},
            identity::Identity,
        },
        services::{
            chat_transport::MockGroupMembership,
            holdings_service::MockHoldingsLookup,
            login_service::LoginState,
        },
        utils::test_login::{context, create_test_login, extract_nonce, signed_payload, TestLogin},
    };
    use alloy::signers::local::PrivateKeySigner;
    use mockall::predicate::eq;

    const PUNKS: &str = "0xb47e3cd837dDF8e4c57F05d70Ab865de6e193BBB";

    fn router(t: &TestLogin, holdings: MockHoldingsLookup, membership: MockGroupMembership) -> CommandRouter {
        CommandRouter::new(
            t.service.clone(),
            Arc::new(holdings),
            Arc::new(membership),
            t.transport.clone(),
            Arc::new(t.config.clone()),
        )
    }

    fn text_message(sender: &str, message_id: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            sender: Identity::new(sender),
            conversation_id: ConversationId(format!("chat-{}", sender)),
            message_id: MessageId(message_id.to_string()),
            content: MessageContent::Text(text.to_string()),
        }
    }

    fn holdings_with(contract: &str, chain_id: u64) -> Vec<ChainHoldings> {
        vec![ChainHoldings {
            chain_name: "Ethereum".to_string(),
            chain_id,
            tokens: vec![TokenBalance {
                contract_name: Some("CryptoPunks".to_string()),
                contract_ticker_symbol: Some("PUNK".to_string()),
                contract_address: contract.to_lowercase(),
                balance: "1".to_string(),
                token_ids: vec!["7804".to_string()],
            }],
        }]
    }

    async fn log_in(t: &TestLogin, sender: &str, signer: &PrivateKeySigner) {
        let challenge = t.service.issue_challenge(&context(sender, "100")).await.unwrap();
        let payload = signed_payload(signer, &challenge.nonce, &challenge.nonce);
        t.service.submit_signature(&context(sender, "101"), &payload).await.unwrap();
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("!login"), Command::Login);
        assert_eq!(parse_command("/login@NFTChatBot"), Command::Login);
        assert_eq!(parse_command("  !list  "), Command::List);
        assert_eq!(parse_command("!join   punks  "), Command::Join("punks".to_string()));
        assert_eq!(parse_command("/join"), Command::Join(String::new()));
        assert_eq!(parse_command("!unknown"), Command::Other);
        assert_eq!(parse_command("hello !login"), Command::Other);
        assert_eq!(parse_command("{\"address\": \"0x\"}"), Command::Other);
    }

    #[tokio::test]
    async fn test_alice_logs_in_through_the_router() {
        let t = create_test_login();
        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().never();
        let router = router(&t, holdings, MockGroupMembership::new());
        let signer = PrivateKeySigner::random();

        router.handle_message(text_message("alice", "1", "!login")).await;

        let texts = t.transport.sent_texts();
        assert_eq!(texts.len(), 4);
        let nonce = extract_nonce(&texts[2]);

        let payload = signed_payload(&signer, &nonce, &nonce);
        router.handle_message(text_message("alice", "2", &payload)).await;

        let alice = Identity::new("alice");
        assert!(t.db.challenges.get(&alice).await.unwrap().is_none());
        assert_eq!(
            t.db.sessions.get(&alice).await.unwrap().unwrap().address,
            EthAddress::from_recovered(signer.address())
        );
        assert_eq!(t.transport.deleted(), vec![MessageId("2".to_string())]);
        assert_eq!(
            t.transport.sent_texts().last().unwrap(),
            &format!("You are now logged in with your Ethereum address: {}", signer.address())
        );
    }

    #[tokio::test]
    async fn test_bob_list_without_session_issues_challenge() {
        let t = create_test_login();
        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().never();
        let router = router(&t, holdings, MockGroupMembership::new());

        router.handle_message(text_message("bob", "1", "!list")).await;

        let texts = t.transport.sent_texts();
        assert_eq!(texts.len(), 4);
        assert!(texts[0].starts_with("Welcome to NFTChat!"));
        assert_eq!(
            t.service.login_state(&Identity::new("bob")).await.unwrap(),
            LoginState::ChallengeIssued
        );
    }

    #[tokio::test]
    async fn test_list_with_session_shows_holdings() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let expected = EthAddress::from_recovered(signer.address());
        let mut holdings = MockHoldingsLookup::new();
        holdings
            .expect_holdings()
            .with(eq(expected.clone()))
            .times(1)
            .returning(|_| holdings_with(PUNKS, 1));
        let router = router(&t, holdings, MockGroupMembership::new());
        let before = t.transport.sent().len();

        router.handle_message(text_message("alice", "3", "/list")).await;

        let sent = t.transport.sent();
        assert_eq!(sent.len(), before + 1);
        assert!(sent[before].text.starts_with(&format!("NFTs held by {}", expected)));
        assert!(sent[before].text.contains("CryptoPunks"));
    }

    #[tokio::test]
    async fn test_login_while_authenticated_refreshes_holdings() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().times(1).returning(|_| Vec::new());
        let router = router(&t, holdings, MockGroupMembership::new());
        let before = t.transport.sent().len();

        router.handle_message(text_message("alice", "3", "!login")).await;

        let texts = t.transport.sent_texts();
        assert_eq!(texts.len(), before + 5);
        assert!(texts.last().unwrap().starts_with("No NFTs found"));
        assert!(t.db.sessions.get(&Identity::new("alice")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_chatter_without_challenge_is_ignored() {
        let t = create_test_login();
        let router = router(&t, MockHoldingsLookup::new(), MockGroupMembership::new());

        router.handle_message(text_message("carol", "1", "gm everyone")).await;
        router.handle_message(text_message("carol", "2", "{\"address\": \"0x\", \"msg\": \"x\", \"sig\": \"0x\"}")).await;

        assert!(t.transport.sent().is_empty());
        assert!(t.transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_chatter_during_store_outage_is_ignored() {
        let t = create_test_login();
        let router = router(&t, MockHoldingsLookup::new(), MockGroupMembership::new());
        router.handle_message(text_message("alice", "1", "!login")).await;
        t.store.set_unavailable(true);

        router.handle_message(text_message("carol", "2", "gm everyone")).await;
        router.handle_message(text_message("alice", "3", "brb")).await;

        assert_eq!(t.transport.sent_texts().len(), 4);
        assert!(t.transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_non_text_messages_are_ignored() {
        let t = create_test_login();
        let router = router(&t, MockHoldingsLookup::new(), MockGroupMembership::new());
        t.service.issue_challenge(&context("alice", "1")).await.unwrap();
        let before = t.transport.sent().len();

        router
            .handle_message(IncomingMessage {
                content: MessageContent::Other,
                ..text_message("alice", "2", "")
            })
            .await;

        assert_eq!(t.transport.sent().len(), before);
        assert!(t.transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_bad_payload_during_login_gets_single_reply() {
        let t = create_test_login();
        let router = router(&t, MockHoldingsLookup::new(), MockGroupMembership::new());
        router.handle_message(text_message("alice", "1", "!login")).await;

        router.handle_message(text_message("alice", "2", "not json")).await;

        let texts = t.transport.sent_texts();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts[4], "Oops, I wasn't able to read that signature! Try again.");
        assert_eq!(t.transport.deleted(), vec![MessageId("2".to_string())]);
        assert_eq!(
            t.service.login_state(&Identity::new("alice")).await.unwrap(),
            LoginState::ChallengeIssued
        );
    }

    #[tokio::test]
    async fn test_join_unknown_room_lists_rooms() {
        let t = create_test_login();
        let mut membership = MockGroupMembership::new();
        membership.expect_add_member().never();
        let router = router(&t, MockHoldingsLookup::new(), membership);

        router.handle_message(text_message("alice", "1", "!join apes")).await;

        assert_eq!(
            t.transport.sent_texts(),
            vec!["I don't know a room called apes. Available rooms: nftchattest, punks".to_string()]
        );
    }

    #[tokio::test]
    async fn test_join_without_session_issues_challenge() {
        let t = create_test_login();
        let mut membership = MockGroupMembership::new();
        membership.expect_add_member().never();
        let router = router(&t, MockHoldingsLookup::new(), membership);

        router.handle_message(text_message("bob", "1", "!join")).await;

        assert_eq!(t.transport.sent_texts().len(), 4);
    }

    #[tokio::test]
    async fn test_join_default_room_adds_writer() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().never();
        let mut membership = MockGroupMembership::new();
        membership
            .expect_add_member()
            .with(eq("-1001"), eq(Identity::new("alice")), eq(MemberRole::Writer))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let router = router(&t, holdings, membership);

        router.handle_message(text_message("alice", "3", "!join")).await;

        assert_eq!(
            t.transport.sent_texts().last().unwrap(),
            "You're in! I sent you an invite link for nftchattest in a private message."
        );
    }

    #[tokio::test]
    async fn test_join_gated_room_requires_holding() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut holdings = MockHoldingsLookup::new();
        holdings
            .expect_holdings()
            .times(1)
            .returning(|_| holdings_with("0x0000000000000000000000000000000000000001", 1));
        let mut membership = MockGroupMembership::new();
        membership.expect_add_member().never();
        let router = router(&t, holdings, membership);

        router.handle_message(text_message("alice", "3", "!join punks")).await;

        assert!(t.transport.sent_texts().last().unwrap().starts_with("Sorry, punks is only open to holders"));
    }

    #[tokio::test]
    async fn test_join_gated_room_ignores_other_chains() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().times(1).returning(|_| holdings_with(PUNKS, 137));
        let mut membership = MockGroupMembership::new();
        membership.expect_add_member().never();
        let router = router(&t, holdings, membership);

        router.handle_message(text_message("alice", "3", "!join punks")).await;

        assert!(t.transport.sent_texts().last().unwrap().starts_with("Sorry"));
    }

    #[tokio::test]
    async fn test_join_gated_room_with_holding() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut holdings = MockHoldingsLookup::new();
        holdings.expect_holdings().times(1).returning(|_| holdings_with(PUNKS, 1));
        let mut membership = MockGroupMembership::new();
        membership
            .expect_add_member()
            .with(eq("-1002"), eq(Identity::new("alice")), eq(MemberRole::Writer))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let router = router(&t, holdings, membership);

        router.handle_message(text_message("alice", "3", "!join PUNKS")).await;

        assert!(t.transport.sent_texts().last().unwrap().starts_with("You're in!"));
    }

    #[tokio::test]
    async fn test_membership_failure_is_reported() {
        let t = create_test_login();
        let signer = PrivateKeySigner::random();
        log_in(&t, "alice", &signer).await;

        let mut membership = MockGroupMembership::new();
        membership.expect_add_member().times(1).returning(|_, _, _| {
            Err(TransportError::Api {
                code: 400,
                description: "Bad Request: not enough rights to manage chat invite link".to_string(),
            })
        });
        let router = router(&t, MockHoldingsLookup::new(), membership);

        router.handle_message(text_message("alice", "3", "!join nftchattest")).await;

        assert_eq!(t.transport.sent_texts().last().unwrap(), MEMBERSHIP_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_session_lookup_failure_is_reported() {
        let t = create_test_login();
        let router = router(&t, MockHoldingsLookup::new(), MockGroupMembership::new());
        t.store.set_unavailable(true);

        router.handle_message(text_message("alice", "1", "!list")).await;

        assert_eq!(t.transport.sent_texts(), vec![STORE_FAILURE_MESSAGE.to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_leave_latest_nonce() {
        let t = create_test_login();
        let router = Arc::new(router(&t, MockHoldingsLookup::new(), MockGroupMembership::new()));

        let first = tokio::spawn({
            let router = router.clone();
            async move { router.handle_message(text_message("alice", "1", "!login")).await }
        });
        let second = tokio::spawn({
            let router = router.clone();
            async move { router.handle_message(text_message("alice", "2", "!login")).await }
        });
        first.await.unwrap();
        second.await.unwrap();

        let texts = t.transport.sent_texts();
        assert_eq!(texts.len(), 8);
        for sequence in texts.chunks(4) {
            assert!(sequence[0].starts_with("Welcome to NFTChat!"));
        }

        let stored = t.db.challenges.get(&Identity::new("alice")).await.unwrap().unwrap();
        assert_eq!(extract_nonce(&texts[6]), stored.nonce);
    }
}
