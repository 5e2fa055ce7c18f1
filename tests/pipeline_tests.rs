// End-to-end pipeline tests against scripted TCP servers.
//
// Each mock server is handed a fixed list of raw HTTP responses, serves one
// per connection with `Connection: close`, and forwards the raw request text
// over a channel so tests can assert on exactly what hit the wire.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use prepdesk_client::api::{auth, knowledge, question};
use prepdesk_client::api::auth::LoginRequest;
use prepdesk_client::api::knowledge::KnowledgeDocumentCreate;
use prepdesk_client::api::question::{
    ExtractionEvent, PendingBankListParams, QuestionBankListParams, QuestionType,
};
use prepdesk_client::config::ClientConfig;
use prepdesk_client::http::{ApiClient, ApiError};
use prepdesk_client::router::{Router, ROUTE_LOGIN};
use prepdesk_client::session::SessionStore;
use prepdesk_client::storage::{SessionStorage, KEY_ACCESS_TOKEN, KEY_USER_INFO};

// ---------------------------------------------------------------------------
// Mock server harness
// ---------------------------------------------------------------------------

struct MockServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    /// Serve the given raw responses, one per connection, in order.
    async fn spawn(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests: rx }
    }

    async fn request(&mut self) -> String {
        self.requests.recv().await.expect("expected a captured request")
    }
}

/// Read one HTTP request: headers, then a Content-Length body if present.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn response(status: u16, reason: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    )
}

/// 200 response wrapping `data` in the standard envelope.
fn envelope(data: &str) -> String {
    response(200, "OK", &format!("{{\"code\":0,\"message\":\"ok\",\"data\":{data}}}"))
}

fn user_json() -> String {
    r#"{
        "id": "u-1",
        "username": "alice",
        "email": "alice@example.com",
        "real_name": null,
        "avatar_url": null,
        "role": "user",
        "status": "active",
        "created_at": "2025-03-01T09:30:00Z"
    }"#
    .to_string()
}

fn bank_json(id: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "name": "Rust drills",
            "description": null,
            "category": "engineering",
            "tags": null,
            "status": "active",
            "created_by": "u-1",
            "created_at": "2025-03-01T09:30:00Z"
        }}"#
    )
}

// ---------------------------------------------------------------------------
// Client wiring
// ---------------------------------------------------------------------------

/// Install a log subscriber once so `RUST_LOG=debug cargo test` shows the
/// pipeline's tracing output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn wire_client_with(
    addr: SocketAddr,
    storage: SessionStorage,
) -> (ApiClient, Arc<SessionStore>, Arc<Router>) {
    init_tracing();
    let session = Arc::new(SessionStore::open(storage).unwrap());
    let router = Arc::new(Router::new(session.clone()));
    let config = ClientConfig {
        base_url: format!("http://{addr}"),
        api_prefix: "/api/v1".to_string(),
        timeout: Duration::from_secs(5),
        storage_path: None,
    };
    let client = ApiClient::new(&config, session.clone(), router.clone()).unwrap();
    (client, session, router)
}

fn wire_client(addr: SocketAddr) -> (ApiClient, Arc<SessionStore>, Arc<Router>) {
    wire_client_with(addr, SessionStorage::open(":memory:").unwrap())
}

fn logged_in(session: &SessionStore, token: &str) {
    let user = serde_json::from_str(&user_json()).unwrap();
    session.set_session(token, "R", &user).unwrap();
}

fn temp_db_path(name: &str) -> String {
    let path = std::env::temp_dir().join(format!("prepdesk-{name}-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path.to_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Auth round trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_installs_session_and_posts_credentials() {
    let token_payload = format!(
        r#"{{
            "access_token": "A",
            "refresh_token": "R",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {}
        }}"#,
        user_json()
    );
    let mut server = MockServer::spawn(vec![envelope(&token_payload)]).await;
    let (client, session, _router) = wire_client(server.addr);

    let tokens = auth::login(
        &client,
        &LoginRequest {
            username: "alice".into(),
            password: "hunter2".into(),
            device_type: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(tokens.access_token, "A");
    assert_eq!(tokens.user.username, "alice");
    assert!(session.is_logged_in());
    assert_eq!(session.access_token().as_deref(), Some("A"));
    assert_eq!(session.refresh_token().as_deref(), Some("R"));
    assert_eq!(session.display_name(), "alice");

    let request = server.request().await;
    assert!(request.starts_with("POST /api/v1/auth/login HTTP/1.1"));
    assert!(request.contains(r#""username":"alice""#));
    assert!(request.contains(r#""password":"hunter2""#));
    // Logged out at send time, so no credential header.
    assert!(!request.to_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn login_persists_session_durably() {
    let token_payload = format!(
        r#"{{"access_token":"A","refresh_token":"R","token_type":"bearer","expires_in":3600,"user":{}}}"#,
        user_json()
    );
    let server = MockServer::spawn(vec![envelope(&token_payload)]).await;
    let db_path = temp_db_path("login-durable");
    let (client, _session, _router) =
        wire_client_with(server.addr, SessionStorage::open(&db_path).unwrap());

    auth::login(
        &client,
        &LoginRequest {
            username: "alice".into(),
            password: "hunter2".into(),
            device_type: None,
        },
    )
    .await
    .unwrap();

    // A second handle onto the same database sees the committed session.
    let reopened = SessionStorage::open(&db_path).unwrap();
    assert_eq!(reopened.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("A"));
    let stored_user = reopened.get(KEY_USER_INFO).unwrap().unwrap();
    let expected: serde_json::Value = serde_json::from_str(&user_json()).unwrap();
    let actual: serde_json::Value = serde_json::from_str(&stored_user).unwrap();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn bearer_header_attached_to_authenticated_requests() {
    let page = r#"{"items":[],"total":0,"page":1,"page_size":10,"total_pages":0}"#;
    let mut server = MockServer::spawn(vec![envelope(page)]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    question::list_banks(&client, &QuestionBankListParams::default())
        .await
        .unwrap();

    let request = server.request().await;
    assert!(request.starts_with("GET /api/v1/questions/banks HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: bearer tok-123"));
}

#[tokio::test]
async fn logout_clears_local_session_when_backend_errors() {
    let mut server =
        MockServer::spawn(vec![response(500, "Internal Server Error", r#"{"message":"boom"}"#)])
            .await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    auth::logout(&client).await.unwrap();

    assert!(!session.is_logged_in());
    assert_eq!(session.user(), None);
    let request = server.request().await;
    assert!(request.starts_with("POST /api/v1/auth/logout HTTP/1.1"));
}

#[tokio::test]
async fn logout_clears_local_session_when_backend_is_unreachable() {
    // Bind then drop: the port refuses connections.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let (client, session, _router) = wire_client(addr);
    logged_in(&session, "tok-123");

    auth::logout(&client).await.unwrap();
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn failed_profile_refresh_leaves_session_untouched() {
    let mut server =
        MockServer::spawn(vec![response(500, "Internal Server Error", r#"{"message":"boom"}"#)])
            .await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let err = auth::fetch_current_user(&client).await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 500, .. }));

    assert!(session.is_logged_in());
    assert_eq!(session.user().unwrap().username, "alice");
    let request = server.request().await;
    assert!(request.starts_with("GET /api/v1/auth/me HTTP/1.1"));
}

// ---------------------------------------------------------------------------
// Error taxonomy and the 401 side effect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_response_clears_session_and_forces_login() {
    let db_path = temp_db_path("unauthorized");
    let server =
        MockServer::spawn(vec![response(401, "Unauthorized", r#"{"message":"Token expired"}"#)])
            .await;
    let (client, session, router) =
        wire_client_with(server.addr, SessionStorage::open(&db_path).unwrap());
    logged_in(&session, "stale-token");
    router.navigate("/knowledge");

    let err = knowledge::get(&client, "d-1").await.unwrap_err();
    match err {
        ApiError::Auth { message } => assert_eq!(message, "Token expired"),
        other => panic!("expected Auth, got {other:?}"),
    }

    // Memory, durable storage, and the router all converge to logged-out.
    assert!(!session.is_logged_in());
    assert_eq!(session.user(), None);
    assert_eq!(router.current().name, ROUTE_LOGIN);
    let reopened = SessionStorage::open(&db_path).unwrap();
    assert_eq!(reopened.get(KEY_ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn forbidden_response_maps_to_permission_and_keeps_session() {
    let mut server =
        MockServer::spawn(vec![response(403, "Forbidden", r#"{"message":"Admin role required"}"#)])
            .await;
    let (client, session, router) = wire_client(server.addr);
    logged_in(&session, "tok-123");
    router.navigate("/questions/banks");

    let err = question::list_pending_banks(&client, &PendingBankListParams::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Permission { message } => assert_eq!(message, "Admin role required"),
        other => panic!("expected Permission, got {other:?}"),
    }

    // Unlike a 401, a 403 leaves the session and the route alone.
    assert!(session.is_logged_in());
    assert_eq!(router.current().name, "question-bank-list");
    let request = server.request().await;
    assert!(request.starts_with("GET /api/v1/questions/community/pending"));
}

#[tokio::test]
async fn unreachable_backend_surfaces_network_error() {
    // Bind then drop: the port refuses connections.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let (client, session, _router) = wire_client(addr);
    logged_in(&session, "tok-123");

    let err = knowledge::get(&client, "d-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    // A failure with no response is not an auth verdict.
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn validation_detail_is_preserved_verbatim() {
    let server = MockServer::spawn(vec![response(
        422,
        "Unprocessable Entity",
        r#"{"message":"Validation Error","detail":[{"field":"title","msg":"required"}]}"#,
    )])
    .await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let err = knowledge::create(
        &client,
        &KnowledgeDocumentCreate {
            title: String::new(),
            content: "body".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    match err {
        ApiError::Validation { message, detail } => {
            assert_eq!(message, "Validation Error");
            assert_eq!(detail[0]["field"], "title");
            assert_eq!(detail[0]["msg"], "required");
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    // Non-401 failures never touch the session.
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn page_metadata_comes_from_the_wire() {
    let page = format!(
        r#"{{"items":[{}],"total":42,"page":1,"page_size":10,"total_pages":5}}"#,
        bank_json("b-1")
    );
    let server = MockServer::spawn(vec![envelope(&page)]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let page = question::list_banks(&client, &QuestionBankListParams::default())
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "b-1");
    assert_eq!(page.total, 42);
    // The backend said 5; one item in hand must not change that.
    assert_eq!(page.total_pages, 5);
}

// ---------------------------------------------------------------------------
// Path assembly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn community_copy_hits_the_expected_path() {
    let mut server = MockServer::spawn(vec![envelope(&bank_json("b-copy"))]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let bank = question::copy_community_bank(&client, "b-1").await.unwrap();
    assert_eq!(bank.id, "b-copy");

    let request = server.request().await;
    assert!(request.starts_with("POST /api/v1/questions/community/banks/b-1/copy HTTP/1.1"));
}

#[tokio::test]
async fn delete_unwraps_null_data() {
    let mut server = MockServer::spawn(vec![envelope("null")]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    knowledge::delete(&client, "d-1").await.unwrap();

    let request = server.request().await;
    assert!(request.starts_with("DELETE /api/v1/knowledge/documents/d-1 HTTP/1.1"));
}

// ---------------------------------------------------------------------------
// Extraction stream
// ---------------------------------------------------------------------------

fn sse_response(frames: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/event-stream\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\r\n{frames}"
    )
}

#[tokio::test]
async fn extraction_stream_delivers_progress_then_complete() {
    let frames = concat!(
        "event: progress\n",
        "data: {\"task_id\":\"t1\",\"chunk\":1,\"total_chunks\":2,\"progress\":50.0,",
        "\"new_questions\":[],\"total_questions_so_far\":0}\n",
        "\n",
        "event: complete\n",
        "data: {\"task_id\":\"t1\",\"total_questions\":1,\"questions\":[",
        "{\"title\":\"What is ownership?\",\"content\":\"Explain.\",",
        "\"type\":\"technical\",\"difficulty\":\"medium\"}]}\n",
        "\n",
    );
    let mut server = MockServer::spawn(vec![sse_response(frames)]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let (tx, mut rx) = mpsc::channel(16);
    question::extract_questions(&client, "b-1", "interview.pdf", b"%PDF-1.4".to_vec(), tx)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(events.len(), 2);
    match &events[0] {
        ExtractionEvent::Progress {
            task_id,
            chunk,
            total_chunks,
            progress,
            ..
        } => {
            assert_eq!(task_id, "t1");
            assert_eq!(*chunk, 1);
            assert_eq!(*total_chunks, 2);
            assert_eq!(*progress, 50.0);
        }
        other => panic!("expected Progress, got {other:?}"),
    }
    match &events[1] {
        ExtractionEvent::Complete {
            task_id,
            total_questions,
            questions,
        } => {
            assert_eq!(task_id, "t1");
            assert_eq!(*total_questions, 1);
            assert_eq!(questions[0].title, "What is ownership?");
            assert_eq!(questions[0].question_type, QuestionType::Technical);
        }
        other => panic!("expected Complete, got {other:?}"),
    }

    let request = server.request().await;
    assert!(request.starts_with("POST /api/v1/questions/extract HTTP/1.1"));
    let lower = request.to_lowercase();
    assert!(lower.contains("content-type: multipart/form-data"));
    assert!(lower.contains("authorization: bearer tok-123"));
    // Both form fields cross the wire.
    assert!(request.contains("name=\"file\""));
    assert!(request.contains("filename=\"interview.pdf\""));
    assert!(request.contains("name=\"bank_id\""));
    assert!(request.contains("b-1"));
}

#[tokio::test]
async fn extraction_failure_event_is_forwarded() {
    let frames = concat!(
        "event: error\n",
        "data: {\"task_id\":\"t1\",\"message\":\"unsupported file type\"}\n",
        "\n",
    );
    let server = MockServer::spawn(vec![sse_response(frames)]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let (tx, mut rx) = mpsc::channel(16);
    question::extract_questions(&client, "b-1", "notes.txt", b"plain text".to_vec(), tx)
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(
        event,
        ExtractionEvent::Failed {
            task_id: Some("t1".into()),
            message: "unsupported file type".into(),
        }
    );
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn extraction_truncated_stream_yields_failed_event() {
    // Progress frame but the connection drops before any terminal event.
    let frames = concat!(
        "event: progress\n",
        "data: {\"task_id\":\"t1\",\"chunk\":1,\"total_chunks\":4,\"progress\":25.0,",
        "\"new_questions\":[],\"total_questions_so_far\":2}\n",
        "\n",
    );
    let server = MockServer::spawn(vec![sse_response(frames)]).await;
    let (client, session, _router) = wire_client(server.addr);
    logged_in(&session, "tok-123");

    let (tx, mut rx) = mpsc::channel(16);
    question::extract_questions(&client, "b-1", "interview.pdf", b"%PDF-1.4".to_vec(), tx)
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, ExtractionEvent::Progress { .. }));
    let second = rx.recv().await.unwrap();
    assert!(matches!(second, ExtractionEvent::Failed { task_id: None, .. }));
}

#[tokio::test]
async fn extraction_unauthorized_maps_through_the_shared_pipeline() {
    let server =
        MockServer::spawn(vec![response(401, "Unauthorized", r#"{"message":"Token expired"}"#)])
            .await;
    let (client, session, router) = wire_client(server.addr);
    logged_in(&session, "stale-token");

    let (tx, _rx) = mpsc::channel(16);
    let err = question::extract_questions(&client, "b-1", "interview.pdf", Vec::new(), tx)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Auth { .. }));
    // The streaming endpoint runs the same 401 convergence as envelope calls.
    assert!(!session.is_logged_in());
    assert_eq!(router.current().name, ROUTE_LOGIN);
}
