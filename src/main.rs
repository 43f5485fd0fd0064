use clap::Parser;
use nft_chat::{
    args::Args,
    errors::{AppError, AppResult},
    http_server::{self, AppState},
    metrics::Metrics,
    Config, CommandRouter, DbPersistence, HoldingsService, LoginService, TelegramService,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();

    // Load configuration from --config path (defaults to config/default.toml)
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if let Some(token) = args.telegram_token {
        config.telegram.token = token;
    }
    if let Some(database_url) = args.database_url {
        config.data.database_url = database_url;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    init_logging(&config.logging.level)?;

    info!("🚀 Starting NFTChat v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", args.config);

    let db = Arc::new(DbPersistence::new(config.get_database_url(), &config.data.namespace).await?);
    info!("Database ready, namespace: {}", config.data.namespace);

    let telegram = Arc::new(TelegramService::new(&config.telegram)?);
    let bot = match telegram.get_me().await {
        Ok(bot) => bot,
        Err(e) => {
            error!("Failed to authenticate with Telegram: {}", e);
            return Err(AppError::Transport(e));
        }
    };
    info!(
        "Authenticated as @{} ({})",
        bot.username.as_deref().unwrap_or(&bot.first_name),
        bot.id
    );

    telegram.advertise_commands().await?;
    info!("Bot commands advertised");

    let config = Arc::new(config);
    let login = Arc::new(LoginService::new(db, telegram.clone(), &config));
    let holdings = Arc::new(HoldingsService::new(&config.holdings, config.get_holdings_timeout())?);
    let router = Arc::new(CommandRouter::new(
        login,
        holdings,
        telegram.clone(),
        telegram.clone(),
        config.clone(),
    ));

    let server_address = config.get_server_address();
    let state = AppState {
        metrics: Arc::new(Metrics::new()),
    };
    let server_addr_clone = server_address.clone();
    let server_task = tokio::spawn(async move {
        http_server::start_server(state, &server_addr_clone)
            .await
            .map_err(|e| AppError::Server(e.to_string()))
    });

    info!("🎯 NFTChat is now running!");
    info!("Health and metrics available at: http://{}", server_address);
    info!(
        "Rooms: {}",
        config
            .rooms
            .iter()
            .map(|room| room.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    tokio::select! {
        result = server_task => {
            error!("HTTP server exited: {:?}", result);
            result.map_err(|e| AppError::Server(e.to_string()))??;
        }
        _ = telegram.run_update_loop(router) => {
            error!("Telegram update loop exited");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping NFTChat");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed waiting for Ctrl+C signal: {}", e);
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed waiting for Ctrl+C signal: {}", e);
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed waiting for Ctrl+C signal: {}", e);
        }
    }
}

fn init_logging(level: &str) -> AppResult<()> {
    let log_level = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => {
            eprintln!("Invalid log level: {}, defaulting to info", level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nft_chat={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}
