//! Harness for black-box tests of the skill endpoint: a scripted
//! chat-completions provider and a router wired the way `main` wires it.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::llm::{CompletionClientConfig, HttpCompletionClient};
use shared::skill::SkillRouter;
use skill_server::http::{AppState, RequestVerification, build_router};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

pub const TEST_API_KEY: &str = "integration-test-key";
pub const TEST_SKILL_ID: &str = "amzn1.ask.skill.integration-test";
pub const TEST_SYSTEM_PROMPT: &str = "You are a voice assistant. Keep answers short.";

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: Value,
}

impl MockReply {
    pub fn answer(content: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            }),
        }
    }

    pub fn provider_error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": { "message": message } }),
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_bodies: Arc<Mutex<Vec<Value>>>,
    seen_api_keys: Arc<Mutex<Vec<String>>>,
}

pub struct MockCompletionProvider {
    pub url: String,
    state: ProviderState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: Option<tokio::task::JoinHandle<()>>,
}

impl MockCompletionProvider {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = ProviderState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_bodies: Arc::new(Mutex::new(Vec::new())),
            seen_api_keys: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let local_addr = listener
            .local_addr()
            .expect("listener address should resolve");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock provider should run");
        });

        Self {
            url: format!("http://{local_addr}/chat/completions"),
            state,
            shutdown_tx: Some(shutdown_tx),
            server_task: Some(server_task),
        }
    }

    pub async fn seen_bodies(&self) -> Vec<Value> {
        self.state.seen_bodies.lock().await.clone()
    }

    pub async fn seen_api_keys(&self) -> Vec<String> {
        self.state.seen_api_keys.lock().await.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(server_task) = self.server_task.take() {
            server_task.await.expect("mock provider task should join");
        }
    }
}

async fn chat_completions(
    State(state): State<ProviderState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(key) = headers.get("api-key").and_then(|value| value.to_str().ok()) {
        state.seen_api_keys.lock().await.push(key.to_string());
    }
    state.seen_bodies.lock().await.push(payload);

    let reply = state
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| {
            MockReply::provider_error(StatusCode::INTERNAL_SERVER_ERROR, "exhausted test replies")
        });

    (reply.status, Json(reply.body))
}

pub fn build_test_router(completion_url: &str, verification: RequestVerification) -> Router {
    let client = HttpCompletionClient::new(CompletionClientConfig {
        endpoint_url: completion_url.to_string(),
        api_key: TEST_API_KEY.to_string(),
        api_key_header: "api-key".to_string(),
        timeout_ms: Some(5_000),
    })
    .expect("completion client should build");

    build_router(AppState {
        skill_router: SkillRouter::new(Arc::new(client), TEST_SYSTEM_PROMPT),
        verification,
    })
}

pub fn strict_verification() -> RequestVerification {
    RequestVerification {
        skill_id: Some(TEST_SKILL_ID.to_string()),
        timestamp_tolerance_seconds: 150,
    }
}
