use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;

use brocante::{AppState, DevPasswordHasher, InMemoryStore, api_router, load_fixtures};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Host to bind the HTTP server")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind the HTTP server")]
    port: Option<u16>,
    #[arrrg(flag, "Seed the store with development fixtures")]
    fixtures: bool,
}

const HELP_TEXT: &str = r#"brocanted - Brocante marketplace daemon

USAGE:
    brocanted [OPTIONS]

OPTIONS:
    --host <HOST>        Host to bind the HTTP server [default: 127.0.0.1]
    --port <PORT>        Port to bind the HTTP server [default: 8080]
    --fixtures           Seed the store with development fixtures

DESCRIPTION:
    Runs the Brocante marketplace daemon with resource endpoints
    mounted under /api/

    The server supports graceful shutdown via SIGTERM or Ctrl+C.

API ENDPOINTS:
    Users:
      GET    /api/users            List all users
      POST   /api/users            Create a user
      GET    /api/users/{id}       Get a specific user
      PATCH  /api/users/{id}       Patch a user
      DELETE /api/users/{id}       Delete a user

    Shops:
      GET    /api/shops            List all shops
      POST   /api/shops            Create a shop
      GET    /api/shops/{id}       Get a specific shop
      PATCH  /api/shops/{id}       Patch a shop
      DELETE /api/shops/{id}       Delete a shop

    Categories:
      GET    /api/categories       List all categories
      POST   /api/categories       Create a category
      GET    /api/categories/{id}  Get a specific category
      PATCH  /api/categories/{id}  Patch a category
      DELETE /api/categories/{id}  Delete a category

    Items:
      GET    /api/items            List all items
      POST   /api/items            Create an item
      GET    /api/items/{id}       Get a specific item
      PATCH  /api/items/{id}       Patch an item
      DELETE /api/items/{id}       Delete an item"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = Args::from_command_line("USAGE: brocanted [OPTIONS]");

    if !free.is_empty() && free[0] == "help" {
        println!("{}", HELP_TEXT);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_args(args);

    let store = Arc::new(InMemoryStore::new());
    let hasher = Arc::new(DevPasswordHasher);

    if config.fixtures {
        load_fixtures(&*store, &*hasher)?;
    }

    let state = AppState::new(store, hasher);
    let app = Router::new().nest("/api", api_router(state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(addr = %addr, "brocanted listening");
    println!("Brocante daemon listening on http://{}", addr);
    println!("Use Ctrl+C or send SIGTERM for graceful shutdown");

    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        () = shutdown_signal => {
            tracing::info!("shutdown signal received");
            println!();
            println!("Brocante daemon stopped");
        }
    }

    Ok(())
}

struct ServerConfig {
    host: String,
    port: u16,
    fixtures: bool,
}

impl ServerConfig {
    fn from_args(args: Args) -> Self {
        Self {
            host: args.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: args.port.unwrap_or(8080),
            fixtures: args.fixtures,
        }
    }
}
