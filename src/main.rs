//! git-workspace - hosted working trees for many repositories
//!
//! # Usage
//! ```bash
//! git-workspace                          # Serve ./data on 127.0.0.1:3001
//! git-workspace --data-dir /srv/ws -p 80 # Custom data directory and port
//! ```

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_workspace::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("✗ Failed to open data directory: {}", e);
            eprintln!("  Path: {}", config.data_dir.display());
            std::process::exit(1);
        }
    };

    let app = git_workspace::app(state);

    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to {}: {}", addr, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    let data_dir = std::fs::canonicalize(&config.data_dir).unwrap_or_else(|_| config.data_dir.clone());
    println!();
    println!("  ┌─────────────────────────────────────────────┐");
    println!("  │                git-workspace                │");
    println!("  └─────────────────────────────────────────────┘");
    println!();
    println!("  Data:   {}", data_dir.display());
    println!("  Server: http://{}", addr);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();
    info!(addr = %addr, data_dir = %data_dir.display(), "listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("  Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
