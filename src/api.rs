//! REST API server for the banking assistant
//!
//! Exposes the dialogue engine and the NLU resolver via HTTP endpoints
//! Integrates with frontend UI

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::dialogue::{DialogueEngine, Session};
use crate::resolver;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub account_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

/// Sessions are individually locked so a slow turn (oracle or LLM call)
/// only blocks its own account; the map lock is held for lookup/insert
/// only.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DialogueEngine>,
    pub sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.account_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("account_id is required".into())),
        );
    }

    info!(account = %req.account_id, "Received chat message");

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions
            .entry(req.account_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(req.account_id.clone()))))
            .clone()
    };

    // Turns are serialized per session, not per process.
    let mut session = session.lock().await;

    match state.engine.handle_turn(&mut session, &req.message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "reply": reply,
                "pending": session.pending_action,
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Chat handling failed: {}", e))),
        ),
    }
}

/// =============================
/// NLU Parse Endpoint
/// =============================

/// Resolver-only view of a message, for the NLU visualizer UI.
async fn parse_handler(Json(req): Json<ParseRequest>) -> (StatusCode, Json<ApiResponse>) {
    let resolved = resolver::resolve(&req.text);

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "intent": resolved.intent,
            "confidence": resolved.confidence,
            "entities": resolved.entities,
            "source": resolved.source,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: Arc<DialogueEngine>) -> Router {
    let state = ApiState {
        engine,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/nlu/parse", post(parse_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: Arc<DialogueEngine>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ChatAuditLog;
    use crate::faq::FaqStore;
    use crate::ledger::{hash_password, InMemoryLedger, Ledger};
    use crate::models::Account;
    use crate::responder::CannedResponder;
    use tokio::time::{timeout, Duration};

    async fn test_state() -> ApiState {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger
            .create_account(Account {
                account_number: "1001".to_string(),
                holder_name: "Asha".to_string(),
                account_type: "Savings".to_string(),
                balance: 5000.0,
                password_hash: hash_password("secret123"),
            })
            .await
            .unwrap();

        let engine = DialogueEngine::new(
            ledger,
            Arc::new(FaqStore::new()),
            Box::new(CannedResponder::default()),
            Arc::new(ChatAuditLog::new()),
        );

        ApiState {
            engine: Arc::new(engine),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[tokio::test]
    async fn test_chat_handler_round_trip() {
        let state = test_state().await;

        let (status, Json(response)) = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                account_id: "1001".to_string(),
                message: "what is my balance".to_string(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.success);

        let data = response.data.unwrap();
        assert!(data["reply"].as_str().unwrap().contains("password"));
        assert_eq!(data["pending"]["kind"], "balance_query");
    }

    #[tokio::test]
    async fn test_busy_session_does_not_block_other_accounts() {
        let state = test_state().await;

        // Occupy one account's session for the whole test, as a slow
        // oracle or LLM call would.
        let busy = Arc::new(Mutex::new(Session::new("1001")));
        state
            .sessions
            .write()
            .await
            .insert("1001".to_string(), busy.clone());
        let _held = busy.lock().await;

        let other = chat_handler(
            State(state.clone()),
            Json(ChatRequest {
                account_id: "2002".to_string(),
                message: "hello".to_string(),
            }),
        );

        let (status, _) = timeout(Duration::from_secs(1), other)
            .await
            .expect("turn for another account must not wait on a busy session");
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_api_response_success_wraps_data() {
        let response = ApiResponse::success(serde_json::json!({ "reply": "hello" }));
        assert!(response.success);
        assert!(response.error.is_none());
        assert_eq!(response.data.unwrap()["reply"], "hello");
    }

    #[test]
    fn test_api_response_error() {
        let response = ApiResponse::error("boom".to_string());
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert!(response.data.is_none());
    }
}
