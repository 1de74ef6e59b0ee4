//! Courier CLI: send files and links as transfers or boards.
//!
//! The API key comes from `--api-key`, `COURIER_API_KEY` or the config file,
//! in that order of precedence.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use courier_client::Session;
use courier_protocol::CollectionKind;
use courier_upload::{
    CollectionBuilder, CompletionCoordinator, LinkItem, RemoteCollection, UploadEvent,
    UploadOptions, UploadOrchestrator,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "courier", version, about = "Send files and links through the Courier API")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key (overrides the configuration file)
    #[arg(long, env = "COURIER_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Service base URL (overrides the configuration file)
    #[arg(long, env = "COURIER_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files and links as a transfer
    Transfer {
        /// Message shown to recipients
        #[arg(long, short)]
        message: String,
        #[command(flatten)]
        items: ItemArgs,
    },
    /// Collect files and links on a board
    Board {
        /// Board name
        #[arg(long, short)]
        name: String,
        #[command(flatten)]
        items: ItemArgs,
    },
    /// Show the state of an existing collection
    Status {
        #[arg(value_enum)]
        kind: KindArg,
        /// Collection id
        id: String,
        /// Poll until the collection is downloadable or failed
        #[arg(long)]
        wait: bool,
    },
    /// Add links to an existing board
    AddLinks {
        /// Board id
        board: String,
        /// Link URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Configuration operations
    Config {
        #[command(subcommand)]
        sub: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Store the API key in the configuration file
    SetKey {
        key: String,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Args)]
struct ItemArgs {
    /// Optional description
    #[arg(long, short)]
    description: Option<String>,

    /// File to upload (repeatable)
    #[arg(long = "file", short = 'f')]
    files: Vec<PathBuf>,

    /// Web link to include (repeatable)
    #[arg(long = "link", short = 'l')]
    links: Vec<String>,

    /// Files uploaded at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Give up on a single file after this many seconds
    #[arg(long)]
    file_timeout: Option<u64>,

    /// Poll until the collection is downloadable
    #[arg(long)]
    wait: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Transfer,
    Board,
}

impl From<KindArg> for CollectionKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Transfer => CollectionKind::Transfer,
            KindArg::Board => CollectionKind::Board,
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 120;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = CliConfig::load_from(&config_path)?;

    if let Commands::Config { sub } = &cli.command {
        return run_config(sub, cfg, &config_path);
    }

    cfg.apply_overrides(cli.api_key, cli.base_url);
    let session = Arc::new(
        Session::new(cfg.session_config()?).context("failed to create API session")?,
    );

    match cli.command {
        Commands::Transfer { message, items } => {
            send(session, CollectionBuilder::transfer(message), items, &cfg).await
        }
        Commands::Board { name, items } => {
            send(session, CollectionBuilder::board(name), items, &cfg).await
        }
        Commands::Status { kind, id, wait } => status(session, kind.into(), &id, wait).await,
        Commands::AddLinks { board, urls } => add_links(session, &board, urls).await,
        Commands::Config { .. } => Ok(()),
    }
}

async fn send(
    session: Arc<Session>,
    mut builder: CollectionBuilder,
    args: ItemArgs,
    cfg: &CliConfig,
) -> anyhow::Result<()> {
    if let Some(description) = &args.description {
        builder.description(description.as_str());
    }
    for path in &args.files {
        builder
            .add_file_at_path(path)
            .with_context(|| format!("cannot add {}", path.display()))?;
    }
    for url in &args.links {
        builder
            .add_web_link(url.as_str(), None)
            .with_context(|| format!("cannot add link {url}"))?;
    }
    let draft = builder.build().context("nothing to send")?;

    let options = UploadOptions {
        max_concurrent_files: args.concurrency.unwrap_or(cfg.max_concurrent_files),
        file_deadline: args.file_timeout.map(Duration::from_secs),
        ..UploadOptions::default()
    };
    let mut orch = UploadOrchestrator::new(session.clone(), options);
    let ledger = orch.ledger().clone();

    let printer = orch.take_events().map(|rx| tokio::spawn(print_events(rx)));
    let cancel = orch.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling uploads");
            cancel.cancel();
        }
    });

    let result = orch.run(draft).await;
    // Closes the event channel so the printer drains and exits.
    drop(orch);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let mut report = result?;

    for failed in report.failed() {
        eprintln!(
            "failed: {} ({})",
            failed.name,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(err) = &report.finalize_error {
        bail!(
            "finalize failed for {} {}: {err}",
            report.collection.kind(),
            report.collection.id()
        );
    }
    if !report.finalized {
        bail!(
            "{} file(s) failed; collection {} was not finalized",
            report.failed().count(),
            report.collection.id()
        );
    }

    if args.wait {
        let coordinator = CompletionCoordinator::new(session, ledger);
        let state = coordinator
            .wait_until_settled(&mut report.collection, POLL_INTERVAL, MAX_POLLS)
            .await?;
        eprintln!("state: {state}");
    }

    match report.collection.share_url() {
        Some(url) => println!("{url}"),
        None => println!("{}", report.collection.id()),
    }
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::Created {
                collection_id,
                items,
            } => eprintln!("created {collection_id} with {items} item(s)"),
            UploadEvent::PartUploaded {
                file_id,
                part_number,
                part_count,
                bytes,
            } => eprintln!("  {file_id}: part {part_number}/{part_count} ({bytes} bytes)"),
            UploadEvent::FileCompleted { name, .. } => eprintln!("completed {name}"),
            UploadEvent::FileFailed { name, error, .. } => eprintln!("failed {name}: {error}"),
            UploadEvent::Finalized { collection_id, .. } => eprintln!("finalized {collection_id}"),
        }
    }
}

async fn fetch_collection(
    session: &Session,
    kind: CollectionKind,
    id: &str,
) -> anyhow::Result<RemoteCollection> {
    let resp = session
        .fetch(kind, id)
        .await
        .with_context(|| format!("cannot fetch {kind} {id}"))?;
    Ok(RemoteCollection::from_response(kind, resp)?)
}

async fn status(
    session: Arc<Session>,
    kind: CollectionKind,
    id: &str,
    wait: bool,
) -> anyhow::Result<()> {
    let mut collection = fetch_collection(&session, kind, id).await?;
    if wait {
        let coordinator = CompletionCoordinator::new(session, Default::default());
        coordinator
            .wait_until_settled(&mut collection, POLL_INTERVAL, MAX_POLLS)
            .await?;
    }

    println!("{kind} {}: {}", collection.id(), collection.state());
    if let Some(url) = collection.share_url() {
        println!("url: {url}");
    }
    for file in collection.files() {
        println!(
            "  file {} {} ({} bytes, {} part(s))",
            file.id, file.name, file.size, file.multipart.part_count
        );
    }
    for link in collection.links() {
        println!("  link {} {} ({})", link.id, link.url, link.title);
    }
    Ok(())
}

async fn add_links(session: Arc<Session>, board: &str, urls: Vec<String>) -> anyhow::Result<()> {
    let mut collection = fetch_collection(&session, CollectionKind::Board, board).await?;
    let links: Vec<LinkItem> = urls
        .into_iter()
        .map(|url| LinkItem {
            title: url.clone(),
            url,
        })
        .collect();

    let coordinator = CompletionCoordinator::new(session, Default::default());
    let added = coordinator.add_items(&mut collection, &links).await?;
    println!("added {added} link(s) to board {}", collection.id());
    Ok(())
}

fn run_config(
    sub: &ConfigCommands,
    mut cfg: CliConfig,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    match sub {
        ConfigCommands::SetKey { key } => {
            if key.trim().is_empty() {
                bail!("API key must not be empty");
            }
            cfg.api_key = key.clone();
            cfg.save_to(path)?;
            println!("API key saved to {}", path.display());
        }
        ConfigCommands::Show => {
            println!("path: {}", path.display());
            println!("{cfg:#?}");
        }
    }
    Ok(())
}
