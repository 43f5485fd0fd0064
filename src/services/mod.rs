pub mod chat_transport;
pub mod command_router;
pub mod holdings_service;
pub mod identity_locks;
pub mod login_service;
pub mod signature_service;
pub mod telegram_service;
