use anyhow::{Context, Result};
use clap::Parser;
use newsrss::app::{App, AppEvent};
use newsrss::config::{Config, LlmProvider};
use newsrss::session::FeedSources;
use newsrss::ui;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Get the config directory path (~/.config/newsrss/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsrss"))
}

/// Create the config directory with user-only permissions.
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(config_dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                eprintln!(
                    "Warning: failed to set permissions on {}: {}",
                    config_dir.display(),
                    e
                );
            }
        }
    }
    Ok(())
}

/// Route `tracing` output to `newsrss.log`; the terminal belongs to the UI.
fn init_logging(config_dir: &Path) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_path = config_dir.join("newsrss.log");

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => {
            eprintln!("Warning: logging disabled, cannot open {}: {}", log_path.display(), e);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .init();
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "newsrss",
    version,
    about = "Terminal RSS reader with article extraction and Gemini analysis"
)]
struct Args {
    /// Config file (default: ~/.config/newsrss/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL to start with; repeat for several. Replaces configured feeds.
    #[arg(long = "feed", value_name = "URL")]
    feeds: Vec<String>,

    /// Language model backend
    #[arg(long, value_enum)]
    llm_provider: Option<LlmProvider>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;
    init_logging(&config_dir);

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if !args.feeds.is_empty() {
        config.feeds = args.feeds;
    }
    if let Some(provider) = args.llm_provider {
        config.llm.provider = provider;
    }
    tracing::debug!(?config, "Effective configuration");

    let sources = FeedSources::new(config.feeds.clone());
    let mut app = App::new(&config, sources).context("Failed to create application")?;

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, event_tx, event_rx).await?;

    tracing::info!(
        cached_articles = app.session.articles.len(),
        chat_messages = app.session.chat.len(),
        "Session ended"
    );
    println!("Goodbye!");
    Ok(())
}
