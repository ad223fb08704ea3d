use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xcap_server::http::{router, HttpState};
use xcap_server::{Config, Dispatcher};

#[derive(Parser, Debug)]
#[command(name = "xcap-server")]
#[command(about = "XCAP server for resource lists, presence rules and PIDF documents", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (defaults to xcap.config.json in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket address to listen on
    #[arg(short, long)]
    listen: Option<String>,

    /// Path prefix of the XCAP root
    #[arg(short, long)]
    root: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let cwd = std::env::current_dir()?;
            Config::load(&cwd.to_string_lossy())?
        }
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(root) = args.root {
        config.root = root;
    }

    let dispatcher = Dispatcher::new(config.dispatcher_config()?);
    info!(
        usages = ?dispatcher.registry().auids().collect::<Vec<_>>(),
        storage = ?config.storage,
        "application usages registered"
    );

    let state = HttpState::new(
        Arc::new(dispatcher),
        &config.root,
        &config.authorization.identity_header,
    )?;
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(listen = %config.listen, root = %config.root, "XCAP server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
