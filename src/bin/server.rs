//! Process entry point: wires the nine components into a running axum server exposing the
//! JSON-RPC endpoint, the notifications WebSocket, and a chat endpoint over the orchestrator.
//!
//! "CLI entry and argument parsing" is an out-of-scope external collaborator per `SPEC_FULL.md`
//! §1, but something has to assemble C1-C9 into a process — this binary is that assembly,
//! grounded on the axum routing conventions already present in the retrieval pack
//! (`tacryt-socryp-cinch-rs/crates/cinch-web`).

use aigateway::adapter::openai::OpenAiCompatibleAdapter;
use aigateway::adapter::anthropic::AnthropicAdapter;
use aigateway::adapter::gemini::GeminiAdapter;
use aigateway::adapter::ProviderAdapter;
use aigateway::config::GatewayConfig;
use aigateway::config_tools::{
    AiConfigureTool, ListAvailableModelsTool, ParameterInfoTool, ResetConfigTool, ShowCurrentConfigTool,
    SwitchProviderTool,
};
use aigateway::configuration::ConfigurationAuthority;
use aigateway::mcp::{McpServer, NotificationHub};
use aigateway::orchestrator::ChatOrchestrator;
use aigateway::tool::ToolRegistry;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    mcp: Arc<McpServer>,
    notifications: Arc<NotificationHub>,
    orchestrator: Arc<ChatOrchestrator>,
}

#[tokio::main]
async fn main() {
    aigateway::logging::init();

    let gateway_config = GatewayConfig::load(&std::path::PathBuf::from("aigateway.yaml"));
    let notifications = Arc::new(NotificationHub::new());

    let configuration = match ConfigurationAuthority::load(
        gateway_config.config_path.clone(),
        notifications.clone() as Arc<dyn aigateway::configuration::ChangeNotifier>,
    )
    .await
    {
        Ok(c) => Arc::new(c),
        Err(e) => {
            log::error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(ToolRegistry::with_notifier(
        notifications.clone() as Arc<dyn aigateway::configuration::ChangeNotifier>
    ));
    registry.register(Arc::new(AiConfigureTool::new(configuration.clone()))).await;
    registry.register(Arc::new(ShowCurrentConfigTool::new(configuration.clone()))).await;
    registry.register(Arc::new(ListAvailableModelsTool)).await;
    registry.register(Arc::new(SwitchProviderTool::new(configuration.clone()))).await;
    registry.register(Arc::new(ParameterInfoTool::new(configuration.clone()))).await;
    registry.register(Arc::new(ResetConfigTool::new(configuration.clone()))).await;

    let mcp = Arc::new(McpServer::new(registry.clone(), notifications.clone()));

    let adapters = build_adapters(&configuration).await;
    let orchestrator = Arc::new(ChatOrchestrator::new(configuration, registry, mcp.clone(), adapters));

    let state = AppState { mcp, notifications, orchestrator };

    let app = Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/notifications", get(notifications_handler))
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("{}:{}", gateway_config.host, gateway_config.port);
    log::info!("aigateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

async fn build_adapters(configuration: &Arc<ConfigurationAuthority>) -> HashMap<&'static str, Arc<dyn ProviderAdapter>> {
    let mut adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>> = HashMap::new();

    if let Some(model) = configuration.provider_config("openai").await {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            adapters.insert("openai", Arc::new(OpenAiCompatibleAdapter::openai(key, model.model)));
        }
    }
    if let Some(model) = configuration.provider_config("anthropic").await {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            adapters.insert("anthropic", Arc::new(AnthropicAdapter::new(key, model.model)));
        }
    }
    if let Some(model) = configuration.provider_config("gemini").await {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            adapters.insert("gemini", Arc::new(GeminiAdapter::new(key, model.model)));
        }
    }
    if let Some(model) = configuration.provider_config("openrouter").await {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            adapters.insert("openrouter", Arc::new(OpenAiCompatibleAdapter::openrouter(key, model.model)));
        }
    }

    adapters
}

async fn rpc_handler(State(state): State<AppState>, Json(body): Json<Value>) -> impl IntoResponse {
    match state.mcp.handle_raw(body).await {
        Some(response) => Json(response),
        None => Json(json!({})),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools_count = state.mcp.registry.list().await.len();
    Json(json!({
        "status": "healthy",
        "protocol_version": aigateway::mcp::jsonrpc::PROTOCOL_VERSION,
        "tools_count": tools_count,
        "notification_subscribers": state.notifications.subscriber_count(),
        "tools_version": state.mcp.registry.version(),
        "capabilities": { "tools": { "listChanged": true } },
        "endpoints": { "jsonrpc": "/rpc", "notifications": "/notifications" },
    }))
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat_handler(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    let events = state.orchestrator.run_turn(&req.message).await;
    let rendered: Vec<Value> = events
        .into_iter()
        .map(|event| match event {
            aigateway::orchestrator::TurnEvent::Content(text) => json!({ "status": "chunk", "chunk": text }),
            aigateway::orchestrator::TurnEvent::ToolInvoked { name, result_summary } => {
                json!({ "status": "chunk", "chunk": format!("[{}] {}", name, result_summary) })
            }
            aigateway::orchestrator::TurnEvent::Complete => json!({ "status": "complete" }),
            aigateway::orchestrator::TurnEvent::Error(message) => json!({ "status": "error", "error": message }),
        })
        .collect();
    Json(json!({ "events": rendered }))
}

async fn notifications_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_notifications_socket(socket, state))
}

async fn handle_notifications_socket(socket: axum::extract::ws::WebSocket, state: AppState) {
    let (mut sink, mut stream) = futures_util::StreamExt::split(socket);
    let mut receiver = state.notifications.subscribe();

    let forward = tokio::spawn(async move {
        use futures_util::SinkExt;
        loop {
            tokio::select! {
                msg = receiver.recv() => {
                    match msg {
                        Ok(payload) => {
                            let text = serde_json::to_string(&payload).unwrap_or_default();
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(30)) => {
                    let ping = NotificationHub::ping_payload(chrono::Utc::now().timestamp());
                    if sink.send(Message::Text(serde_json::to_string(&ping).unwrap_or_default().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = futures_util::StreamExt::next(&mut stream).await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
    forward.abort();
}
