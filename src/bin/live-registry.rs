//! Live registry server
//!
//! Run with: cargo run --bin live-registry -- [OPTIONS]
//!
//! ## Register a service
//!
//!   websocat 'ws://localhost:9090/?name=svc-a&host=10.0.0.1&port=8080'
//!
//! then type `UP`, `DOWN`, `OUT` or `ALL`.
//!
//! ## Watch the registry
//!
//!   websocat 'ws://localhost:9090/?isUI=true&token=<token>'
//!
//! The first token is printed at startup. Each token admits one observer;
//! the replacement is logged as soon as it is issued.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use live_registry::{RegistryConfig, RegistryServer, ServerConfig};

#[derive(Parser)]
#[command(name = "live-registry")]
#[command(about = "Live service registry over WebSocket")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9090")]
    bind: SocketAddr,

    /// Seconds a disconnected service stays listed as DOWN before removal
    #[arg(long, default_value_t = 10)]
    grace_secs: u64,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Length of observer admission tokens
    #[arg(long, default_value_t = 32)]
    token_len: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("live_registry=info")),
        )
        .init();

    let config = ServerConfig::with_addr(cli.bind)
        .max_connections(cli.max_connections)
        .admission_token_len(cli.token_len);
    let registry_config =
        RegistryConfig::default().eviction_grace_period(Duration::from_secs(cli.grace_secs));

    let server = RegistryServer::with_registry_config(config, registry_config);
    let token = server.hub().gate().issue_and_rotate();

    println!("Starting registry on {}", server.bind_addr());
    println!();
    println!("=== Register a service ===");
    println!("ws://localhost:{}/?name=svc-a&host=10.0.0.1&port=8080", server.bind_addr().port());
    println!();
    println!("=== Watch the registry ===");
    println!("ws://localhost:{}/?isUI=true&token={}", server.bind_addr().port(), token);
    println!();

    let mut rotations = server.hub().gate().subscribe();
    tokio::spawn(async move {
        while rotations.changed().await.is_ok() {
            let token = rotations.borrow_and_update().clone();
            tracing::info!(token = %token, "Next observer token");
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await?;
    Ok(())
}
