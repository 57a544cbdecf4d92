//! Integration tests against an in-process fake backend.
//!
//! The fake mirrors the real server's routes (trailing slashes included)
//! and its chat consumer: every user frame is persisted, answered with a
//! debug frame and then an `answer` frame.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use parley::adapters::{HttpConversationApi, WebSocketConnector};
use parley::application::{SendOutcome, SessionController, SessionHandle, SessionSnapshot};
use parley::config::{BackendConfig, RealtimeConfig};
use parley::domain::conversation::{
    ChatMessage, ConnectionStatus, ConversationFilter, ConversationQuery, ConversationStatus,
    SessionPhase,
};
use parley::domain::foundation::ConversationId;
use parley::ports::{ApiError, ConversationApi};

// =============================================================================
// Fake backend
// =============================================================================

const STARTED_AT: &str = "2025-03-02T09:00:00Z";

struct FakeConversation {
    id: i64,
    title: Option<String>,
    status: &'static str,
    summary: Option<String>,
    messages: Vec<Value>,
}

impl FakeConversation {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "status": self.status,
            "start_timestamp": STARTED_AT,
            "end_timestamp": if self.status == "ENDED" { Some(STARTED_AT) } else { None },
            "summary": self.summary,
            "duration": 0.0,
            "message_count": self.messages.len(),
            "messages": self.messages,
        })
    }

    fn push(&mut self, sender: &str, content: &str) {
        let id = self.messages.len() + 1;
        self.messages.push(json!({
            "id": id,
            "conversation": self.id,
            "sender": sender,
            "content": content,
            "timestamp": STARTED_AT,
        }));
    }
}

#[derive(Default)]
struct Backend {
    next_id: i64,
    conversations: BTreeMap<i64, FakeConversation>,
    frames: Vec<Value>,
    connections: usize,
    drop_after_next_reply: bool,
}

impl Backend {
    fn insert(&mut self, title: Option<&str>) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.conversations.insert(
            id,
            FakeConversation {
                id,
                title: title.map(str::to_string),
                status: "ACTIVE",
                summary: None,
                messages: Vec::new(),
            },
        );
        id
    }
}

type Shared = Arc<Mutex<Backend>>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Conversation not found"})),
    )
        .into_response()
}

async fn create(State(backend): State<Shared>) -> Response {
    let id = backend.lock().unwrap().insert(None);
    (StatusCode::CREATED, Json(json!({"id": id}))).into_response()
}

async fn list(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let backend = backend.lock().unwrap();
    let search = params.get("search").map(|s| s.to_lowercase());
    let rows: Vec<Value> = backend
        .conversations
        .values()
        .rev()
        .filter(|c| params.get("status").map_or(true, |s| s == c.status))
        .filter(|c| match &search {
            Some(needle) => c
                .title
                .as_deref()
                .map_or(false, |t| t.to_lowercase().contains(needle)),
            None => true,
        })
        .map(FakeConversation::to_json)
        .collect();
    Json(Value::Array(rows))
}

async fn detail(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    match backend.lock().unwrap().conversations.get(&id) {
        Some(c) => Json(c.to_json()).into_response(),
        None => not_found(),
    }
}

async fn end(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut backend = backend.lock().unwrap();
    match backend.conversations.get_mut(&id) {
        Some(c) => {
            c.status = "ENDED";
            c.summary = Some(format!("Exchanged {} messages.", c.messages.len()));
            Json(c.to_json()).into_response()
        }
        None => not_found(),
    }
}

async fn query(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let question = body["query"].as_str().unwrap_or_default().trim().to_string();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Query is required"})),
        )
            .into_response();
    }
    let max_results = body["max_results"].as_u64().unwrap_or(5) as usize;

    let backend = backend.lock().unwrap();
    let related: Vec<Value> = backend
        .conversations
        .values()
        .take(max_results)
        .map(|c| json!({"id": c.id, "title": c.title, "start_timestamp": STARTED_AT}))
        .collect();

    Json(json!({
        "answer": format!("You asked: {}", question),
        "relevant_excerpts": [],
        "related_conversations": related,
    }))
    .into_response()
}

async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(id): Path<i64>,
    State(backend): State<Shared>,
) -> Response {
    if !backend.lock().unwrap().conversations.contains_key(&id) {
        return not_found();
    }
    ws.on_upgrade(move |socket| serve_chat(socket, id, backend))
}

async fn serve_chat(mut socket: WebSocket, id: i64, backend: Shared) {
    backend.lock().unwrap().connections += 1;

    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let frame: Value = serde_json::from_str(&text).unwrap();
        let content = frame["message"].as_str().unwrap_or_default().to_string();
        let reply = format!("Echo: {}", content);

        let drop_now = {
            let mut backend = backend.lock().unwrap();
            backend.frames.push(frame);
            if let Some(c) = backend.conversations.get_mut(&id) {
                c.push("USER", &content);
                c.push("AI", &reply);
            }
            std::mem::take(&mut backend.drop_after_next_reply)
        };

        let debug = json!({"type": "debug", "info": "received"}).to_string();
        let answer = json!({"message": reply, "type": "answer"}).to_string();
        if socket.send(WsMessage::Text(debug)).await.is_err()
            || socket.send(WsMessage::Text(answer)).await.is_err()
        {
            return;
        }

        if drop_now {
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    }
}

struct FakeServer {
    addr: SocketAddr,
    backend: Shared,
}

impl FakeServer {
    async fn start() -> Self {
        let backend: Shared = Arc::new(Mutex::new(Backend::default()));
        let app = Router::new()
            .route("/api/conversations/", post(create).get(list))
            .route("/api/conversations/query/", post(query))
            .route("/api/conversations/:id/", get(detail))
            .route("/api/conversations/:id/end/", post(end))
            .route("/ws/chat/:id/", get(chat_socket))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, backend }
    }

    fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            api_base_url: format!("http://{}/api/", self.addr),
            ws_base_url: format!("ws://{}/ws/chat", self.addr),
            request_timeout_secs: 5,
        }
    }

    fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            initial_backoff_ms: 20,
            max_backoff_ms: 100,
            ..RealtimeConfig::default()
        }
    }

    fn api(&self) -> HttpConversationApi {
        HttpConversationApi::new(&self.backend_config()).unwrap()
    }

    fn session(&self) -> SessionHandle {
        SessionController::spawn(
            Arc::new(self.api()),
            Arc::new(WebSocketConnector::new(
                self.backend_config(),
                self.realtime_config(),
            )),
        )
    }

    fn seed(&self, title: &str, turns: &[(&str, &str)]) -> ConversationId {
        let mut backend = self.backend.lock().unwrap();
        let id = backend.insert(Some(title));
        let conversation = backend.conversations.get_mut(&id).unwrap();
        for (sender, content) in turns {
            conversation.push(sender, content);
        }
        ConversationId::new(id)
    }
}

async fn wait_for(
    session: &SessionHandle,
    condition: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut snapshots = session.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(condition))
        .await
        .expect("timed out waiting for session state")
        .expect("controller stopped")
        .clone();
    snapshot
}

// =============================================================================
// REST client
// =============================================================================

#[tokio::test]
async fn rest_client_creates_fetches_and_ends() {
    let server = FakeServer::start().await;
    let api = server.api();

    let id = api.create_conversation().await.unwrap();
    let detail = api.get_conversation(id).await.unwrap();
    assert_eq!(detail.id, id);
    assert_eq!(detail.status, ConversationStatus::Active);
    assert!(detail.messages.is_empty());

    let ended = api.end_conversation(id).await.unwrap();
    assert_eq!(ended.summary.as_deref(), Some("Exchanged 0 messages."));
    assert_eq!(
        api.get_conversation(id).await.unwrap().status,
        ConversationStatus::Ended
    );
}

#[tokio::test]
async fn rest_client_maps_missing_conversation_to_not_found() {
    let server = FakeServer::start().await;
    let api = server.api();

    assert_eq!(
        api.get_conversation(ConversationId::new(77)).await,
        Err(ApiError::NotFound)
    );
    assert_eq!(
        api.end_conversation(ConversationId::new(77)).await,
        Err(ApiError::NotFound)
    );
}

#[tokio::test]
async fn rest_client_lists_with_filters() {
    let server = FakeServer::start().await;
    let api = server.api();
    let trips = server.seed("Summer trips", &[("USER", "Where to go?")]);
    server.seed("Tax return", &[]);

    let all = api
        .list_conversations(&ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let found = api
        .list_conversations(&ConversationFilter::default().with_search("trip"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, trips);
    assert_eq!(found[0].message_count, 1);

    let ended = api
        .list_conversations(&ConversationFilter::default().with_status(ConversationStatus::Ended))
        .await
        .unwrap();
    assert!(ended.is_empty());
}

#[tokio::test]
async fn rest_client_posts_queries() {
    let server = FakeServer::start().await;
    let api = server.api();
    server.seed("One", &[]);
    server.seed("Two", &[]);

    let answer = api
        .query_conversations(&ConversationQuery::new("what did we plan?").unwrap().with_max_results(1))
        .await
        .unwrap();

    assert_eq!(answer.answer, "You asked: what did we plan?");
    assert_eq!(answer.related_conversations.len(), 1);
}

#[tokio::test]
async fn rest_client_reports_backend_errors() {
    let server = FakeServer::start().await;
    let api = server.api();

    let mut query = ConversationQuery::new("placeholder").unwrap();
    query.query = "  ".to_string();

    assert_eq!(
        api.query_conversations(&query).await,
        Err(ApiError::Status {
            status: 400,
            body: "Query is required".to_string()
        })
    );
}

#[tokio::test]
async fn rest_client_reports_unreachable_backend() {
    let config = BackendConfig {
        api_base_url: "http://127.0.0.1:9/api".to_string(),
        request_timeout_secs: 2,
        ..BackendConfig::default()
    };
    let api = HttpConversationApi::new(&config).unwrap();

    let err = api.create_conversation().await.unwrap_err();
    assert!(err.is_retryable(), "{:?}", err);
}

// =============================================================================
// Live session over WebSocket
// =============================================================================

#[tokio::test]
async fn first_message_creates_conversation_and_gets_answer() {
    let server = FakeServer::start().await;
    let session = server.session();

    assert_eq!(
        session.send_user_message("hello").await,
        Ok(SendOutcome::Sent)
    );

    let snapshot = wait_for(&session, |s| s.messages.len() == 2).await;
    let id = snapshot.conversation_id.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Active);
    assert_eq!(
        snapshot.messages,
        vec![ChatMessage::user("hello"), ChatMessage::ai("Echo: hello")]
    );
    assert!(!snapshot.pending_reply);

    let frames = server.backend.lock().unwrap().frames.clone();
    assert_eq!(frames, vec![json!({"message": "hello", "chat_id": id.get()})]);
}

#[tokio::test]
async fn ending_returns_server_summary() {
    let server = FakeServer::start().await;
    let session = server.session();
    session.send_user_message("hello").await.unwrap();
    wait_for(&session, |s| s.messages.len() == 2).await;

    let summary = session.end_conversation().await.unwrap();

    assert_eq!(summary.as_deref(), Some("Exchanged 2 messages."));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Ended);
    assert_eq!(snapshot.conversation_id, None);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test]
async fn loading_resumes_with_server_history() {
    let server = FakeServer::start().await;
    let id = server.seed(
        "Recipes",
        &[("USER", "Best bread flour?"), ("AI", "Strong white flour.")],
    );
    let session = server.session();

    session.load_conversation(id).await.unwrap();
    wait_for(&session, |s| s.phase == SessionPhase::Active).await;
    session.send_user_message("And for pizza?").await.unwrap();

    let snapshot = wait_for(&session, |s| s.messages.len() == 4).await;
    assert_eq!(
        snapshot.messages,
        vec![
            ChatMessage::user("Best bread flour?"),
            ChatMessage::ai("Strong white flour."),
            ChatMessage::user("And for pizza?"),
            ChatMessage::ai("Echo: And for pizza?"),
        ]
    );
}

#[tokio::test]
async fn channel_reconnects_after_server_drop() {
    let server = FakeServer::start().await;
    let session = server.session();
    server.backend.lock().unwrap().drop_after_next_reply = true;

    session.send_user_message("first").await.unwrap();
    wait_for(&session, |s| s.messages.len() == 2).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.backend.lock().unwrap().connections < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client did not reconnect");

    session.send_user_message("second").await.unwrap();
    let snapshot = wait_for(&session, |s| s.messages.len() == 4).await;

    assert_eq!(snapshot.messages[3], ChatMessage::ai("Echo: second"));
    assert_eq!(snapshot.phase, SessionPhase::Active);
    wait_for(&session, |s| s.connection == ConnectionStatus::Open).await;
    assert_eq!(server.backend.lock().unwrap().connections, 2);
}
