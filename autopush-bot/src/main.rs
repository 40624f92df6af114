use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use autopush_core::{
    bind, spawn_poller, AppConfig, BindingStore, Broadcaster, CromClient, Event, LogBroadcaster,
    Poller, Session, WebhookBroadcaster, BIND_AUTHORITY,
};
use clap::{Parser, Subcommand};
use reqwest::ClientBuilder;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "autopush",
    version,
    about = "Pushes newly published wiki articles to chat channels"
)]
struct Cli {
    /// Directory holding config.json and bindings.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every bound channel on the configured interval until interrupted
    Run,
    /// Bind a channel to a binding id
    Bind {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        channel_id: String,
        #[arg(long)]
        id: Option<u32>,
    },
    /// List bindings and their cursors
    List,
    /// Poll every bound channel once and exit
    PollOnce,
    /// Print the configuration directory
    ConfigPath,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => config_dir()?,
    };

    match cli.command {
        Command::Run => cmd_run(&dir).await,
        Command::Bind {
            platform,
            channel_id,
            id,
        } => cmd_bind(&dir, platform, channel_id, id).await,
        Command::List => cmd_list(&dir).await,
        Command::PollOnce => cmd_poll_once(&dir).await,
        Command::ConfigPath => {
            println!("{}", dir.display());
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_dir() -> anyhow::Result<PathBuf> {
    // Linux: ~/.config/autopush
    AppConfig::config_dir().context("no configuration directory; pass --config-dir")
}

async fn load_store(dir: &Path) -> BindingStore {
    BindingStore::load_from(dir.join("bindings.json")).await
}

fn load_broadcaster(config: &AppConfig) -> anyhow::Result<Arc<dyn Broadcaster>> {
    match &config.broadcast.webhook_url {
        Some(url) => {
            let client = ClientBuilder::new()
                .timeout(config.upstream.request_timeout())
                .build()
                .context("failed to build webhook client")?;
            Ok(Arc::new(WebhookBroadcaster::new(client, url.clone())))
        }
        None => Ok(Arc::new(LogBroadcaster)),
    }
}

async fn load_poller(dir: &Path) -> anyhow::Result<Poller> {
    let config = AppConfig::load(dir);
    let poll_config = config.poll_config()?;
    let client = CromClient::from_config(&config.upstream)?;
    let broadcaster = load_broadcaster(&config)?;
    let store = load_store(dir).await;
    Ok(Poller::new(store, client, broadcaster, poll_config))
}

async fn cmd_run(dir: &Path) -> anyhow::Result<()> {
    let poller = load_poller(dir).await?;
    info!(
        bindings = poller.store().list().await.len(),
        interval_secs = poller.config().interval.as_secs(),
        "starting poller"
    );

    let (update_tx, mut update_rx) = mpsc::channel(64);
    let handle = spawn_poller(poller, update_tx);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            Some(event) = update_rx.recv() => log_event(&event),
        }
    }

    handle.stop().await?;
    Ok(())
}

async fn cmd_bind(
    dir: &Path,
    platform: String,
    channel_id: String,
    id: Option<u32>,
) -> anyhow::Result<()> {
    let store = load_store(dir).await;
    // Whoever runs the CLI on the host is the operator.
    let session = Session {
        platform,
        channel_id,
        authority: BIND_AUTHORITY,
    };
    let reply = bind(&store, &session, id).await?;
    println!("{reply}");
    Ok(())
}

async fn cmd_list(dir: &Path) -> anyhow::Result<()> {
    let store = load_store(dir).await;
    for binding in store.list().await {
        let last = if binding.never_pushed() {
            "(nothing pushed yet)".to_owned()
        } else {
            format!(
                "{} <{}> @{}",
                binding.title, binding.url, binding.last_index
            )
        };
        println!("{:>4}  {:<32}  {}", binding.id, binding.address(), last);
    }
    Ok(())
}

async fn cmd_poll_once(dir: &Path) -> anyhow::Result<()> {
    let poller = load_poller(dir).await?;
    for event in poller.poll_once().await {
        log_event(&event);
    }
    Ok(())
}

fn log_event(event: &Event) {
    match event {
        Event::Pushed {
            binding_id,
            articles,
        } => {
            info!(
                binding = binding_id,
                count = articles.len(),
                "delivered new publications"
            );
        }
    }
}
