use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "nft-chat")]
#[command(about = "Chat bot that proves Ethereum wallet ownership and grants NFT-gated room access")]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Telegram bot token override
    #[arg(long)]
    pub telegram_token: Option<String>,

    /// Database URL override
    #[arg(long)]
    pub database_url: Option<String>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}
