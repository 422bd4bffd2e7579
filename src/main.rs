//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration and the endpoint tree
//! - Initializes the database and the catalog engines
//! - Starts the HTTP server with graceful shutdown support

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use nestcrud::catalog;
use nestcrud::config::CrudConfig;
use nestcrud::database::init_db;
use nestcrud::route::{create_app, AppState};

/// Application entry point
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `ENDPOINTS_FILE` - YAML endpoint tree (default: "endpoints.yaml")
#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("nestcrud=debug,tower_http=debug")
        .init();

    let port_str = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let port: u16 = port_str.parse().unwrap_or(8080);

    let db_name = env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string());
    let endpoints_file =
        env::var("ENDPOINTS_FILE").unwrap_or_else(|_| "endpoints.yaml".to_string());

    let config = CrudConfig::load(&endpoints_file).expect("Failed to load endpoint file");

    let db = Arc::new(init_db(&db_name).expect("Failed to initialize database"));
    let registry = catalog::registry(db).expect("Failed to open catalog tables");

    let state = AppState {
        config: Arc::new(config),
        registry,
    };

    // fails fast on entity, depth or id-type mismatches
    let app = create_app(state)
        .expect("Invalid endpoint configuration")
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await.unwrap();

    tracing::info!("server running at http://localhost:{}", port);
    tracing::info!("using database {} and endpoints {}", db_name, endpoints_file);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// Open connections are allowed to complete before the process exits, so no
/// write transaction is cut short.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
