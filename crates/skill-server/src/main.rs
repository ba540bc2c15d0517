use std::net::SocketAddr;
use std::sync::Arc;

use shared::config::{LogFormat, SkillConfig};
use shared::llm::{HttpCompletionClient, load_system_prompt};
use shared::skill::SkillRouter;
use skill_server::http::{self, AppState, RequestVerification};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "skill_server=info,shared=info";

#[tokio::main]
async fn main() {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    let config = match SkillConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            init_tracing(LogFormat::default());
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let system_prompt = match load_system_prompt(&config.system_prompt_path) {
        Ok(prompt) => prompt,
        Err(err) => {
            error!("failed to load system prompt: {err}");
            std::process::exit(1);
        }
    };

    let completion_client = match HttpCompletionClient::new(config.completion.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!("failed to build completion client: {err}");
            std::process::exit(1);
        }
    };

    let app = http::build_router(AppState {
        skill_router: SkillRouter::new(Arc::new(completion_client), system_prompt),
        verification: RequestVerification {
            skill_id: config.skill_id.clone(),
            timestamp_tolerance_seconds: config.timestamp_tolerance_seconds,
        },
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid SKILL_BIND_ADDR {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        endpoint = %config.completion.endpoint_url,
        skill_id_check = config.skill_id.is_some(),
        "skill server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
