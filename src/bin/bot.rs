use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use market_scan_bot::config::{load_config, ScanConfig};
use market_scan_bot::handler::{serve_events, EventHandler};
use market_scan_bot::provider::synthetic::SyntheticProvider;
use market_scan_bot::provider::yahoo::{self, YahooProvider};
use market_scan_bot::provider::MarketDataProvider;
use market_scan_bot::transport::console::{ConsoleEvents, ConsoleTransport};
use market_scan_bot::transport::telegram::{self, TelegramClient, TelegramTransport, TelegramUpdates};
use market_scan_bot::transport::{EventSource, Transport};
use market_scan_bot::{run_periodic, Scanner, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Yahoo,
    Synthetic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Telegram,
    Console,
}

#[derive(Parser, Debug)]
#[command(name = "bot", version, about = "Periodic market scanner with chat notifications")]
struct Args {
    /// TOML config file; built-in defaults are used when omitted.
    #[arg(long, env = "SCAN_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ProviderKind::Yahoo)]
    provider: ProviderKind,

    #[arg(long, env = "YAHOO_BASE_URL", default_value = yahoo::DEFAULT_BASE_URL)]
    yahoo_base_url: String,

    /// Per-request timeout for market data, in seconds.
    #[arg(long, default_value_t = 20)]
    fetch_timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = TransportKind::Telegram)]
    transport: TransportKind,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "TELEGRAM_API_BASE", default_value = telegram::DEFAULT_API_BASE)]
    telegram_api_base: String,

    /// Long-poll timeout for inbound updates, in seconds.
    #[arg(long, default_value_t = 30)]
    poll_timeout_secs: u64,

    /// Emit JSON log lines instead of human-readable ones.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("load {}", path.display()))?,
        None => {
            let config = ScanConfig::default();
            config.validate()?;
            config
        }
    };

    let provider: Arc<dyn MarketDataProvider> = match args.provider {
        ProviderKind::Yahoo => Arc::new(
            YahooProvider::new(&args.yahoo_base_url, Duration::from_secs(args.fetch_timeout_secs))
                .context("build yahoo provider")?,
        ),
        ProviderKind::Synthetic => Arc::new(SyntheticProvider::default()),
    };

    let poll_timeout = Duration::from_secs(args.poll_timeout_secs);
    let transport: Arc<dyn Transport>;
    let mut source: Box<dyn EventSource>;
    match args.transport {
        TransportKind::Telegram => {
            let token = args
                .telegram_token
                .as_deref()
                .context("telegram transport needs --telegram-token or TELEGRAM_BOT_TOKEN")?;
            let client = Arc::new(
                TelegramClient::new(&args.telegram_api_base, token, poll_timeout)
                    .context("build telegram client")?,
            );
            transport = Arc::new(TelegramTransport::new(Arc::clone(&client)));
            source = Box::new(TelegramUpdates::new(client, poll_timeout));
        }
        TransportKind::Console => {
            transport = Arc::new(ConsoleTransport::default());
            source = Box::new(ConsoleEvents::new());
        }
    }

    tracing::info!(
        instruments = config.instruments.len(),
        timeframes = config.timeframes.len(),
        provider = ?args.provider,
        transport = ?args.transport,
        "market scan bot starting"
    );

    let period = config.scan_period();
    let first_delay = config.first_delay();
    let state = SharedState::new(config.throttle_scope);
    let scanner = Arc::new(Scanner::new(config, state, provider, transport));
    let handler = EventHandler::new(Arc::clone(&scanner));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic = tokio::spawn(run_periodic(
        Arc::clone(&scanner),
        period,
        first_delay,
        Utc::now,
        shutdown_rx.clone(),
    ));

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = ctrl_c_tx.send(true);
        }
    });

    let served = serve_events(&handler, source.as_mut(), Utc::now, shutdown_rx).await;

    // Let an in-flight cycle finish before exiting.
    let _ = shutdown_tx.send(true);
    periodic.await.context("periodic scanner task")?;
    served
}
