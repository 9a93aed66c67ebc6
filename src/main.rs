//! emberkv server entry point.
//!
//! Thin I/O plumbing only: argument parsing, logging setup, the TCP accept
//! loop, and graceful shutdown. Everything with real behavior lives in the
//! library crate.

use emberkv::commands::Dispatcher;
use emberkv::connection::{handle_connection, ConnectionStats};
use emberkv::storage::{start_sweeper, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: emberkv::DEFAULT_HOST.to_string(),
            port: emberkv::DEFAULT_PORT,
        }
    }
}

impl Config {
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("emberkv version {}", emberkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
emberkv - in-memory key-value server (RESP2 subset)

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 6379)
    -v, --version        Print version information
        --help           Print this help message

COMMANDS:
    PING, ECHO <msg>, SET <key> <value> [PX <ms>], GET <key>
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // The single shared store, handed to every connection task by Arc.
    let store = Arc::new(Store::new());
    let _sweeper = start_sweeper(Arc::clone(&store));

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), version = emberkv::VERSION, "listening");

    let shutdown = async {
        signal::ctrl_c().await.ok();
        info!("shutdown signal received, stopping server");
    };

    tokio::select! {
        _ = accept_loop(listener, store, stats) => {}
        _ = shutdown => {}
    }

    info!("server shutdown complete");
    Ok(())
}

async fn accept_loop(listener: TcpListener, store: Arc<Store>, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let dispatcher = Dispatcher::new(Arc::clone(&store));
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    handle_connection(stream, addr, dispatcher, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
