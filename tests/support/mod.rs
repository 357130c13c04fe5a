//! Harness for end-to-end tests: a fake OpenAI-compatible server and the
//! real application router, each on an ephemeral local port.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use nutrition_assistant::core::config::{AppPaths, Settings};
use nutrition_assistant::llm::OpenAiProvider;
use nutrition_assistant::server::router::router;
use nutrition_assistant::state::AppState;

pub const UPSTREAM_KEY: &str = "sk-test";

/// Embeds by keyword onto three axes, like the unit-test mock.
pub fn vector_for(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    if lower.contains("protein") {
        vec![1.0, 0.0, 0.0]
    } else if lower.contains("fiber") {
        vec![0.0, 1.0, 0.0]
    } else {
        vec![0.0, 0.0, 1.0]
    }
}

#[derive(Clone, Default)]
pub struct FakeOpenAi {
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    pub chat_body: Arc<Mutex<String>>,
    pub embeddings_down: Arc<AtomicBool>,
}

impl FakeOpenAi {
    pub fn reply_with(&self, chunks: &[Value]) {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        body.push_str("data: [DONE]\n\n");
        *self.chat_body.lock().unwrap() = body;
    }

    pub fn last_chat_request(&self) -> Option<Value> {
        self.chat_requests.lock().unwrap().last().cloned()
    }

    /// Makes every embeddings call answer 500 until switched back.
    pub fn fail_embeddings(&self, down: bool) {
        self.embeddings_down.store(down, Ordering::SeqCst);
    }
}

fn unauthorized(headers: &HeaderMap) -> Option<Response> {
    let expected = format!("Bearer {}", UPSTREAM_KEY);
    let sent = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if sent == Some(expected.as_str()) {
        return None;
    }
    let error = json!({ "error": { "message": "Incorrect API key provided" } });
    Some((StatusCode::UNAUTHORIZED, Json(error)).into_response())
}

/// Returns items in reverse order, each tagged with its input index.
async fn embeddings(
    State(fake): State<FakeOpenAi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = unauthorized(&headers) {
        return rejection;
    }
    if fake.embeddings_down.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "The server had an error").into_response();
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, input)| json!({ "index": index, "embedding": vector_for(input) }))
        .collect();

    Json(json!({ "object": "list", "data": data })).into_response()
}

async fn chat_completions(
    State(fake): State<FakeOpenAi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = unauthorized(&headers) {
        return rejection;
    }
    fake.chat_requests.lock().unwrap().push(body);
    let reply = fake.chat_body.lock().unwrap().clone();
    ([(header::CONTENT_TYPE, "text/event-stream")], reply).into_response()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub openai: FakeOpenAi,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Settings)) -> Self {
        let openai = FakeOpenAi::default();
        let upstream = spawn(
            Router::new()
                .route("/v1/embeddings", post(embeddings))
                .route("/v1/chat/completions", post(chat_completions))
                .with_state(openai.clone()),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::in_dir(dir.path().to_path_buf()));

        let mut settings = Settings::default();
        settings.openai.base_url = format!("http://{}", upstream);
        settings.openai.api_key = Some(UPSTREAM_KEY.to_string());
        settings.openai.embedding_dimensions = 3;
        settings.chat.appointment_delay_ms = 0;
        configure(&mut settings);

        let provider = Arc::new(OpenAiProvider::new(&settings.openai).unwrap());
        let state = AppState::build(paths, settings, provider).await.unwrap();
        let addr = spawn(router(state)).await;

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            openai,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn create_patient(&self, body: Value) -> Value {
        let res = self
            .client
            .post(self.url("/api/patients"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        res.json::<Value>().await.unwrap()["patient"].clone()
    }

    pub async fn create_document(&self, name: &str, content: &str) -> Value {
        let res = self
            .client
            .post(self.url("/api/documents"))
            .json(&json!({ "name": name, "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        res.json::<Value>().await.unwrap()["document"].clone()
    }
}

/// Splits an SSE body into `(event, data)` pairs, skipping keep-alive comments.
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data = serde_json::from_str(rest.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}
