//! Axum-based chat gateway: entry point for DeepRoot. Config-driven via CoreConfig.
//!
//! The model is loaded once at startup. When initialization fails the
//! service still starts and answers every chat/introduce request with a
//! 500 instead of crashing, so deploys degrade rather than flap.

use axum::extract::{Json, Query, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use deeproot_core::{
    CandleGenerator, ChatEngine, CoreConfig, GenerationParams, MockGenerator, ModelFamily,
    TextGenerator,
};

#[derive(Clone)]
struct AppState {
    config: Arc<CoreConfig>,
    /// `None` when model initialization failed at startup (degraded mode).
    engine: Arc<Option<ChatEngine>>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[deeproot-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("Config load failed: {}. Using defaults.", e);
            Arc::new(CoreConfig::default())
        }
    };

    let engine = Arc::new(build_engine(&config).await);
    let app = build_app(AppState {
        config: Arc::clone(&config),
        engine,
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.app_name, addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown initiated (Ctrl+C received)");
        }
    }
}

/// Construct the chat engine per `llm_mode`. Local weights load on a
/// blocking thread; any failure leaves the service in degraded mode.
async fn build_engine(config: &CoreConfig) -> Option<ChatEngine> {
    let family = ModelFamily::from_str(&config.model_family);

    if !config.llm_local() {
        tracing::info!(family = family.as_str(), "LLM mode: mock");
        let generator: Box<dyn TextGenerator> = Box::new(MockGenerator::new(family));
        return Some(ChatEngine::from_config(config, generator));
    }

    let model_id = config.model_id.clone();
    let revision = config.model_revision.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        CandleGenerator::load(
            family,
            model_id.as_deref(),
            &revision,
            GenerationParams::default(),
        )
    })
    .await;

    match loaded {
        Ok(Ok(generator)) => {
            tracing::info!("DeepRoot model initialized successfully");
            Some(ChatEngine::from_config(config, Box::new(generator)))
        }
        Ok(Err(e)) => {
            tracing::error!("Error initializing DeepRoot: {}", e);
            None
        }
        Err(e) => {
            tracing::error!("Model load task failed: {}", e);
            None
        }
    }
}

fn build_app(state: AppState) -> Router {
    // The gateway holds no credentials and serves localhost demos; CORS is
    // wide open so any local UI can talk to it.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/introduce", get(introduce))
        .route("/chat", get(chat_get).post(chat_post))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
}

async fn health(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "app_name": state.config.app_name,
        "llm_mode": state.config.llm_mode,
        "model_ready": state.engine.is_some(),
    }))
}

async fn introduce(State(state): State<AppState>) -> (StatusCode, axum::Json<serde_json::Value>) {
    match state.engine.as_ref() {
        Some(engine) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "introduction": engine.introduce() })),
        ),
        None => model_not_initialized(),
    }
}

#[derive(serde::Deserialize, Default)]
struct ChatQuery {
    #[serde(default)]
    message: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
}

async fn chat_get(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    respond(state, query.message).await
}

/// POST: message comes from the JSON body first, query parameter as fallback.
async fn chat_post(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    body: Option<Json<ChatBody>>,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    let message = body.and_then(|b| b.0.message).or(query.message);
    respond(state, message).await
}

async fn respond(
    state: AppState,
    message: Option<String>,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    if state.engine.is_none() {
        return model_not_initialized();
    }

    let Some(message) = message else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": "No message provided" })),
        );
    };
    if message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": "Message cannot be empty" })),
        );
    }

    let correlation_id = Uuid::new_v4();
    tracing::info!(
        target: "deeproot::chat",
        %correlation_id,
        chars = message.len(),
        "Received message"
    );

    // Generation is CPU-bound and synchronous; keep it off the async workers.
    let engine = Arc::clone(&state.engine);
    let outcome = tokio::task::spawn_blocking(move || {
        (*engine).as_ref().map(|e| e.generate_response(&message))
    })
    .await;

    match outcome {
        Ok(Some(Ok(text))) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "message": text })),
        ),
        Ok(Some(Err(e))) => {
            tracing::error!(target: "deeproot::chat", %correlation_id, "Generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(serde_json::json!({ "error": "Failed to generate response" })),
            )
        }
        Ok(None) => model_not_initialized(),
        Err(e) => {
            tracing::error!(target: "deeproot::chat", %correlation_id, "Generation task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(serde_json::json!({ "error": "Internal server error" })),
            )
        }
    }
}

async fn not_found() -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "Endpoint not found" })),
    )
}

fn model_not_initialized() -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "error": "Model not initialized" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use deeproot_core::{KeywordSet, Persona, RelevanceGate};
    use tower::ServiceExt;

    fn test_engine() -> ChatEngine {
        let gate = RelevanceGate::new(KeywordSet::from_lines(["soil", "ph", "plant"]), 2);
        ChatEngine::new(
            Persona::deep_root(),
            gate,
            Box::new(MockGenerator::new(ModelFamily::Causal)),
        )
    }

    fn test_app(engine: Option<ChatEngine>) -> Router {
        build_app(AppState {
            config: Arc::new(CoreConfig::default()),
            engine: Arc::new(engine),
        })
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_post_returns_generated_message() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message": "How do I improve soil pH?"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        let message = json["message"].as_str().unwrap();
        assert!(!message.is_empty());
        assert!(message.contains("[Generated – Mock LLM]"));
    }

    #[tokio::test]
    async fn chat_get_without_message_is_rejected() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("GET")
            .uri("/chat")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "No message provided");
    }

    #[tokio::test]
    async fn chat_post_blank_message_is_rejected() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message": "   "}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn chat_post_falls_back_to_query_parameter() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("POST")
            .uri("/chat?message=hi")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert!(json["message"].as_str().unwrap().contains("Mock LLM"));
    }

    #[tokio::test]
    async fn chat_get_with_query_message_works() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("GET")
            .uri("/chat?message=Hey%20DeepRoot")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn off_topic_chat_returns_refusal_not_error() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"message": "what is the capital of France today"}"#,
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("I'm sorry, but I can only provide advice"));
    }

    #[tokio::test]
    async fn introduce_returns_persona_introduction() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("GET")
            .uri("/introduce")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert!(json["introduction"]
            .as_str()
            .unwrap()
            .starts_with("Hi! I'm DeepRoot."));
    }

    #[tokio::test]
    async fn introduce_without_model_is_500() {
        let app = test_app(None);
        let req = Request::builder()
            .method("GET")
            .uri("/introduce")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Model not initialized");
    }

    #[tokio::test]
    async fn chat_without_model_is_500() {
        let app = test_app(None);
        let req = Request::builder()
            .method("GET")
            .uri("/chat?message=hi")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Model not initialized");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("GET")
            .uri("/no/such/route")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app(Some(test_engine()));
        let req = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_ready"], true);
    }
}
