use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use poegate::cli::Args;
use poegate::config;
use poegate::power::PowerController;
use poegate::server::{create_router, AppState};
use poegate::unifi::UnifiClient;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env if present; an explicit --env-file must exist.
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    } else {
        dotenvy::dotenv().ok();
    }

    let cfg = match config::load_or_create(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file {}: {}", args.config.display(), e);
            process::exit(1);
        }
    };

    let client = match UnifiClient::new(&cfg.unifi) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build UniFi client: {}", e);
            process::exit(1);
        }
    };

    let controller = Arc::new(PowerController::new(Arc::new(client)));

    let bind_addr = args.bind_addr.as_deref().unwrap_or(&cfg.webhook.host);
    let port = args.port.unwrap_or(cfg.webhook.port);
    let addr = format!("{}:{}", bind_addr, port);

    info!("Starting poegate on {}", addr);
    info!(
        "Configured ports: {:?}",
        cfg.ports.keys().collect::<Vec<_>>()
    );
    if !cfg.webhook.auth_token.is_empty() {
        info!("Authentication required: token via Authorization header or ?token=");
    }

    let state = AppState::new(cfg, controller.clone());
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            process::exit(1);
        }
    };

    info!("Server listening on {}", addr);
    info!("Endpoints:");
    info!("  POST /power/on/{{port}}     - Power on port");
    info!("  POST /power/off/{{port}}    - Power off port");
    info!("  POST /power/cycle/{{port}}  - Power cycle port");
    info!("  GET  /power/status/{{port}} - Get port status");
    info!("  GET  /ports               - List configured ports");
    info!("  GET  /health              - Health check");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    if let Err(e) = serve.await {
        error!("Server error: {}", e);
        process::exit(1);
    }

    info!("Shutting down, stopping deferred-operation worker");
    controller.shutdown().await;
}
