mod app;
mod catalog;
mod cleanup;
mod compile;
mod config;
mod constants;
mod deeplink;
mod duration;
mod feed;
mod fetch;
mod filter;
mod infer;
mod input;
mod loader;
mod model;
mod paginate;
mod player;
mod readme;
mod search;
mod selection;
mod session;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use app::App;
use catalog::SourceCatalog;
use config::{Config, TomlFilterStore};
use constants::constants;
use fetch::FetchOptions;
use infer::AnthropicClient;
use loader::{BundleLoader, BundleSource, http_client};
use player::{Player, PlayerKind};
use session::FeedSession;
use youtube::YouTubeClient;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse the catalog in the terminal
  Browse {
    /// Bundle location: an http(s) base URL or a directory with catalog.json
    #[arg(short, long)]
    source: Option<String>,
    /// Open this category on start
    #[arg(short, long)]
    category: Option<String>,
    /// Open this video once its category is loaded
    #[arg(long, requires = "category", conflicts_with = "link")]
    video: Option<String>,
    /// Share link carrying ?v=<video id>
    #[arg(long, requires = "category")]
    link: Option<String>,
    /// Keep search text and filter pills between sessions
    #[arg(long)]
    remember: bool,
    /// How videos are played
    #[arg(long, value_enum)]
    player: Option<PlayerKind>,
    /// Page address used to build share links
    #[arg(long, default_value_t = constants().link_base.clone())]
    share_base: String,
  },
  /// Pull channel and video metadata into the data directory
  Fetch {
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,
    #[arg(long, default_value = "data")]
    data: PathBuf,
    /// Uploads per channel
    #[arg(
      long,
      default_value_t = constants().default_video_limit,
      value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
      conflicts_with = "all"
    )]
    limit: usize,
    /// Fetch every upload
    #[arg(long)]
    all: bool,
    /// Re-run tag inference on already tagged videos and channels
    #[arg(long)]
    force_infer: bool,
    /// Only this category
    #[arg(long)]
    category: Option<String>,
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    youtube_key: Option<String>,
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,
  },
  /// Write the browser bundles from the data directory
  Compile {
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,
    #[arg(long, default_value = "data")]
    data: PathBuf,
    #[arg(long, default_value = "public")]
    out: PathBuf,
  },
  /// Delete channel files no catalog entry refers to
  Cleanup {
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,
    #[arg(long, default_value = "data")]
    data: PathBuf,
    /// Only report what would go
    #[arg(long)]
    dry_run: bool,
  },
  /// Regenerate the channel tables of the README
  Readme {
    #[arg(long, default_value = "catalog.toml")]
    catalog: PathBuf,
    #[arg(long, default_value = "data")]
    data: PathBuf,
    #[arg(long, default_value = "README.md")]
    readme: PathBuf,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

// --- Logging ---

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edutube=info"))
}

fn init_stderr_logging() {
  tracing_subscriber::registry().with(env_filter()).with(fmt::layer().with_writer(std::io::stderr)).init();
}

/// The browser owns the terminal, so its log goes to a file.
fn init_file_logging() -> tracing_appender::non_blocking::WorkerGuard {
  let appender = tracing_appender::rolling::never(config::log_dir(), "edutube.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::registry().with(env_filter()).with(fmt::layer().with_ansi(false).with_writer(writer)).init();
  guard
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  match args.command {
    Command::Browse { source, category, video, link, remember, player, share_base } => {
      let _guard = init_file_logging();
      let video = match link {
        Some(link) => Some(deeplink::video_id_from_link(&link).ok_or_else(|| anyhow!("No video in link: {}", link))?),
        None => video,
      };
      browse(BrowseOptions { source, category, video, remember, player, share_base }).await
    }
    Command::Fetch { catalog, data, limit, all, force_infer, category, youtube_key, anthropic_key } => {
      init_stderr_logging();
      let youtube_key = youtube_key.context("YOUTUBE_API_KEY is not set")?;
      let anthropic_key = anthropic_key.context("ANTHROPIC_API_KEY is not set")?;
      let catalog = SourceCatalog::load(&catalog)?;
      let client = http_client()?;
      let yt = YouTubeClient::new(client.clone(), youtube_key);
      let llm = AnthropicClient::new(client, anthropic_key);
      let opts = FetchOptions { limit: if all { None } else { Some(limit) }, force_infer, category };
      let summary = fetch::run(&yt, &llm, &catalog, &data, &opts).await?;
      println!("{} saved, {} not found, {} failed", summary.saved, summary.not_found, summary.failed);
      Ok(())
    }
    Command::Compile { catalog, data, out } => {
      init_stderr_logging();
      let catalog = SourceCatalog::load(&catalog)?;
      let bundle = compile::run(&catalog, &data, &out).await?;
      let videos: usize = bundle.categories.iter().map(|c| c.video_count).sum();
      println!("{} categories, {} videos → {}", bundle.categories.len(), videos, out.display());
      Ok(())
    }
    Command::Cleanup { catalog, data, dry_run } => {
      init_stderr_logging();
      let catalog = SourceCatalog::load(&catalog)?;
      let summary = cleanup::run(&catalog, &data, dry_run)?;
      let verb = if dry_run { "would delete" } else { "deleted" };
      println!(
        "{} kept, {} {} files, {} {} directories",
        summary.kept, verb, summary.deleted, verb, summary.removed_dirs
      );
      Ok(())
    }
    Command::Readme { catalog, data, readme } => {
      init_stderr_logging();
      let catalog = SourceCatalog::load(&catalog)?;
      readme::run(&catalog, &data, &readme)?;
      println!("Updated {}", readme.display());
      Ok(())
    }
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Args::command(), "edutube", &mut std::io::stdout());
      Ok(())
    }
  }
}

struct BrowseOptions {
  source: Option<String>,
  category: Option<String>,
  video: Option<String>,
  remember: bool,
  player: Option<PlayerKind>,
  share_base: String,
}

async fn browse(opts: BrowseOptions) -> Result<()> {
  let config = Config::load();
  let source = opts.source.or_else(|| config.source.clone()).unwrap_or_else(|| ".".to_string());
  let loader = BundleLoader::new(BundleSource::parse(&source)?, http_client()?);
  let share_base = Url::parse(&opts.share_base).with_context(|| format!("Invalid share base: {}", opts.share_base))?;
  let player = Player::new(opts.player.or(config.player).unwrap_or_default());

  let mut session = FeedSession::default();
  if (opts.remember || config.remember_filters)
    && let Some(store) = TomlFilterStore::in_config_dir()
  {
    session = session.with_store(Box::new(store));
  }
  info!(source = %source, remember = session.remembers_filters(), player = ?player.kind(), "browse: starting");

  let mut app = App::new(loader, session, config, share_base, player).with_deep_link(opts.category, opts.video);

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  app.start();

  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, app))?;
    // The list height is only known after a draw.
    app.sync_sentinel();

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key).await;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.player.stop().await?;
  info!("browse: exiting");
  Ok(())
}
