use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sitecache::app::App;
use sitecache::cache::{CacheStorage, MemoryStorage, Request, SqliteStorage};
use sitecache::config::Config;
use sitecache::net::HttpFetcher;
use sitecache::ui::human_size;
use sitecache::worker::{
  ClientCommand, ClientRegistry, OfflineController, WindowAction, WorkerMessage, WorkerState,
};

#[derive(Parser, Debug)]
#[command(name = "sitecache")]
#[command(about = "Offline cache controller for the St. Louis Demo. J.H.S. website")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./sitecache.yaml or $XDG_CONFIG_HOME/sitecache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep the cache in memory for this run only
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Cache the seed list into the current bucket
  Install,
  /// Delete stale buckets and announce the current version
  Activate,
  /// Install then activate
  Deploy,
  /// Fetch URLs through the controller (paths resolve against the origin)
  Fetch {
    #[arg(required = true)]
    urls: Vec<String>,
  },
  /// List cache buckets and their entries
  Buckets,
  /// Ask the controller to open or focus a window
  Launch { url: Option<String> },
  /// Browse cache buckets in the terminal
  Browse,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = sitecache::logging::init(!matches!(args.command, Command::Browse))?;

  let config = Config::load(args.config.as_deref())?;

  if args.ephemeral {
    run(args.command, config, Arc::new(MemoryStorage::new())).await
  } else {
    let storage = SqliteStorage::open(config.cache.database.as_deref())?;
    run(args.command, config, Arc::new(storage)).await
  }
}

async fn run<S: CacheStorage + 'static>(
  command: Command,
  config: Config,
  storage: Arc<S>,
) -> Result<()> {
  let version = config.cache_version();
  info!(bucket = %version.bucket_name(), "sitecache v{}", env!("CARGO_PKG_VERSION"));

  let clients = Arc::new(ClientRegistry::new());
  // This process acts as one open tab so broadcasts can be shown
  let mut tab = clients.register("/");

  let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
  let controller = OfflineController::new(
    storage.clone(),
    fetcher,
    version,
    config.seed_urls()?,
    clients,
  );

  match command {
    Command::Install => {
      install(&controller).await?;
    }
    Command::Activate => {
      if controller.resume()? == WorkerState::Parsed {
        return Err(eyre!(
          "Bucket {} is not installed; run `sitecache install` first",
          controller.bucket()
        ));
      }
      activate(&controller).await?;
    }
    Command::Deploy => {
      install(&controller).await?;
      activate(&controller).await?;
    }
    Command::Fetch { urls } => {
      let requests = urls
        .iter()
        .map(|u| config.resolve_url(u).map(Request::get))
        .collect::<Result<Vec<_>>>()?;
      if !matches!(controller.resume()?, WorkerState::Activated) {
        warn!(bucket = %controller.bucket(), "bucket not active, requests bypass the cache");
      }
      let results = join_all(requests.iter().map(|r| controller.handle_fetch(r))).await;

      for (request, result) in requests.iter().zip(results) {
        match result {
          Ok(r) => println!(
            "{:<11} {:>3} {:>9}  {}",
            r.source.to_string(),
            r.data.status,
            human_size(r.data.body.len()),
            request.url
          ),
          Err(e) => println!("{:<11} {:>3} {:>9}  {} ({})", "failed", "-", "-", request.url, e),
        }
      }
    }
    Command::Buckets => {
      for name in storage.bucket_names()? {
        let entries = storage.entries(&name)?;
        let bytes: usize = entries.iter().map(|e| e.size).sum();
        let status = storage.bucket_status(&name)?.unwrap_or_default();
        let marker = if name == controller.bucket() { "*" } else { " " };
        println!(
          "{} {}  [{}] {} entries, {}",
          marker,
          name,
          status,
          entries.len(),
          human_size(bytes)
        );
      }
    }
    Command::Launch { url } => match controller.handle_message(ClientCommand::LaunchApp { url }) {
      WindowAction::Focused(id) => println!("focused client {}", id),
      WindowAction::Opened(handle) => println!("opened client {}", handle.id),
    },
    Command::Browse => {
      let mut app = App::new(storage, controller.bucket().to_string(), config.list.clone())?;
      return app.run().await;
    }
  }

  print_broadcasts(&mut tab.rx)
}

async fn install<S: CacheStorage, F: sitecache::net::Fetcher>(
  controller: &OfflineController<S, F>,
) -> Result<()> {
  let report = controller.install().await?;
  println!(
    "bucket {}: cached {}/{} seeds",
    report.bucket,
    report.cached.len(),
    controller.seeds().len()
  );
  for failure in &report.failures {
    println!("  failed {}: {}", failure.url, failure.error);
  }
  Ok(())
}

async fn activate<S: CacheStorage, F: sitecache::net::Fetcher>(
  controller: &OfflineController<S, F>,
) -> Result<()> {
  let report = controller.activate().await?;
  println!(
    "active bucket {} ({} stale deleted, {} clients claimed)",
    report.bucket,
    report.deleted.len(),
    report.claimed
  );
  for (name, error) in &report.failed {
    println!("  could not delete {}: {}", name, error);
  }
  Ok(())
}

fn print_broadcasts(rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> Result<()> {
  while let Ok(message) = rx.try_recv() {
    let json =
      serde_json::to_string(&message).map_err(|e| eyre!("Failed to encode message: {}", e))?;
    println!("message: {}", json);
  }
  Ok(())
}
