//! Test utilities for subscout-core
//!
//! A mock of the hosted inference API (submit + poll) that runs on a local
//! port, so the real HTTP backend can be exercised end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::mock::answer_for;

/// How the mock server answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Report "processing" once, then succeed with an answer derived from the prompt
    Succeed,
    /// Reject every submit with HTTP 500
    SubmitError,
    /// Accept the submit, then report the job as failed
    JobFails,
}

#[derive(Debug)]
struct Job {
    prompt: String,
    polls: usize,
}

#[derive(Clone)]
struct ServerState {
    mode: ServerMode,
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    next_id: Arc<AtomicUsize>,
    submits: Arc<AtomicUsize>,
}

/// Mock inference server for integration tests
pub struct MockInferenceServer {
    addr: SocketAddr,
    submits: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockInferenceServer {
    /// Start the mock server on an available port
    pub async fn start(mode: ServerMode) -> Self {
        let submits = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            mode,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            submits: submits.clone(),
        };
        let app = Router::new()
            .route("/v1/models/:owner/:name/predictions", post(handle_submit))
            .route("/v1/predictions/:id", get(handle_poll))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            submits,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of submit requests received, including rejected ones
    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInferenceServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    input: SubmitInput,
}

#[derive(Debug, Deserialize)]
struct SubmitInput {
    prompt: String,
}

fn prediction(id: &str, status: &str, output: Value, error: Value) -> Json<Value> {
    Json(json!({
        "id": id,
        "status": status,
        "output": output,
        "error": error,
    }))
}

async fn handle_submit(
    State(state): State<ServerState>,
    Path((_owner, _name)): Path<(String, String)>,
    Json(request): Json<SubmitRequest>,
) -> Response {
    state.submits.fetch_add(1, Ordering::SeqCst);
    if state.mode == ServerMode::SubmitError {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable").into_response();
    }

    let id = format!("pred-{}", state.next_id.fetch_add(1, Ordering::SeqCst));
    state.jobs.lock().unwrap().insert(
        id.clone(),
        Job {
            prompt: request.input.prompt,
            polls: 0,
        },
    );
    (
        StatusCode::CREATED,
        prediction(&id, "starting", Value::Null, Value::Null),
    )
        .into_response()
}

async fn handle_poll(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let mut jobs = state.jobs.lock().unwrap();
    let Some(job) = jobs.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, "prediction not found").into_response();
    };
    job.polls += 1;

    match state.mode {
        ServerMode::JobFails => prediction(
            &id,
            "failed",
            Value::Null,
            json!("CUDA out of memory"),
        )
        .into_response(),
        _ if job.polls == 1 => prediction(&id, "processing", Value::Null, Value::Null).into_response(),
        // streamed models answer as a list of chunks
        _ => {
            let answer = answer_for(&job.prompt);
            let mid = (0..=answer.len() / 2)
                .rev()
                .find(|&i| answer.is_char_boundary(i))
                .unwrap_or(0);
            let (head, tail) = answer.split_at(mid);
            prediction(&id, "succeeded", json!([head, tail]), Value::Null).into_response()
        }
    }
}
