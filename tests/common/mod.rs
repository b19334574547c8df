//! In-process stand-in for the Gemini API and for a target website.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use outreach_generator::config::{UpstreamConfig, DEFAULT_MODELS};
use outreach_generator::generator::OutreachGenerator;
use outreach_generator::llm::{GeminiClient, API_KEY_HEADER};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub method: String,
    /// Credential as sent in the API key header.
    pub key: Option<String>,
    /// Credential as sent in the query string, which must never happen.
    pub query_key: Option<String>,
    pub prompt: String,
}

#[derive(Default)]
struct StubState {
    discovery: Mutex<Option<(u16, String)>>,
    generation: Mutex<HashMap<String, (u16, String)>>,
    page: Mutex<Option<(u16, String)>>,
    discovery_calls: AtomicUsize,
    discovery_keys: Mutex<Vec<Option<String>>>,
    page_hits: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Clone)]
pub struct Stub {
    state: Arc<StubState>,
    pub base: String,
}

pub fn candidate_body(text: &str) -> String {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

pub fn models_body(entries: &[(&str, &[&str])]) -> String {
    let models: Vec<Value> = entries
        .iter()
        .map(|(name, methods)| json!({"name": name, "supportedGenerationMethods": methods}))
        .collect();
    json!({ "models": models }).to_string()
}

impl Stub {
    pub async fn start() -> Stub {
        let state = Arc::new(StubState::default());
        let app = Router::new()
            .route("/v1beta/models", get(list_models))
            .route("/v1beta/models/:call", post(generate))
            .route("/site", get(site))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Stub {
            state,
            base: format!("http://{}", addr),
        }
    }

    pub fn api_base(&self) -> String {
        format!("{}/v1beta", self.base)
    }

    pub fn site_url(&self) -> String {
        format!("{}/site", self.base)
    }

    pub fn set_discovery(&self, status: u16, body: impl Into<String>) {
        *self.state.discovery.lock().unwrap() = Some((status, body.into()));
    }

    pub fn set_generation(&self, model: &str, status: u16, body: impl Into<String>) {
        self.state
            .generation
            .lock()
            .unwrap()
            .insert(model.to_string(), (status, body.into()));
    }

    pub fn set_page(&self, status: u16, html: impl Into<String>) {
        *self.state.page.lock().unwrap() = Some((status, html.into()));
    }

    pub fn discovery_calls(&self) -> usize {
        self.state.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn discovery_keys(&self) -> Vec<Option<String>> {
        self.state.discovery_keys.lock().unwrap().clone()
    }

    pub fn page_hits(&self) -> usize {
        self.state.page_hits.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn total_requests(&self) -> usize {
        self.discovery_calls() + self.page_hits() + self.calls().len()
    }

    pub fn upstream_config(&self, method: &str) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.api_base(),
            generation_method: method.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn generator(&self, method: &str) -> OutreachGenerator {
        OutreachGenerator::new(
            GeminiClient::new(self.upstream_config(method)),
            3000,
            Duration::from_secs(5),
        )
    }
}

fn reply(status: u16, body: String) -> impl IntoResponse {
    (
        StatusCode::from_u16(status).unwrap(),
        [("content-type", "application/json")],
        body,
    )
}

fn header_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_models(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.discovery_calls.fetch_add(1, Ordering::SeqCst);
    state.discovery_keys.lock().unwrap().push(header_key(&headers));
    let (status, body) = state
        .discovery
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((500, "discovery not configured".to_string()));
    reply(status, body)
}

async fn generate(
    State(state): State<Arc<StubState>>,
    Path(call): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (model, method) = call.split_once(':').unwrap_or((call.as_str(), ""));
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.calls.lock().unwrap().push(RecordedCall {
        model: model.to_string(),
        method: method.to_string(),
        key: header_key(&headers),
        query_key: query.get("key").cloned(),
        prompt,
    });

    let (status, body) = state
        .generation
        .lock()
        .unwrap()
        .get(model)
        .cloned()
        .unwrap_or((404, format!("model {} not found", model)));
    reply(status, body)
}

async fn site(State(state): State<Arc<StubState>>) -> impl IntoResponse {
    state.page_hits.fetch_add(1, Ordering::SeqCst);
    let (status, html) = state
        .page
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((200, "<html><body><h1>Acme</h1><p>We make anvils.</p></body></html>".to_string()));
    (StatusCode::from_u16(status).unwrap(), Html(html))
}
