//! Test doubles: a scripted in-process gateway and a fake HTTP push endpoint.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::Value;
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    error::GatewayError,
    gateway::{PushGateway, PushMessage, PushTicket, TicketStatus},
};

/// Scripted gateway recording every request it receives.
///
/// Responses are consumed in FIFO order; once the script runs out every
/// message gets an `ok` ticket.
#[derive(Default)]
pub struct RecordingGateway {
    responses: Mutex<VecDeque<Result<Vec<PushTicket>, GatewayError>>>,
    pub calls: Mutex<Vec<Vec<PushMessage>>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<Vec<PushTicket>, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn respond(&self, messages: Vec<PushMessage>) -> Result<Vec<PushTicket>, GatewayError> {
        let count = messages.len();
        self.calls.lock().await.push(messages);
        match self.responses.lock().await.pop_front() {
            Some(response) => response,
            None => Ok((0..count).map(|_| ticket(TicketStatus::Ok)).collect()),
        }
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &PushMessage) -> Result<Vec<PushTicket>, GatewayError> {
        self.respond(vec![message.clone()]).await
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, GatewayError> {
        self.respond(messages.to_vec()).await
    }
}

pub fn ticket(status: TicketStatus) -> PushTicket {
    PushTicket {
        status,
        id: None,
        message: None,
        details: None,
    }
}

/// A request captured by [`FakeGatewayServer`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub accept: Option<String>,
    pub accept_encoding: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    reply: Value,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Local HTTP server standing in for the Expo push endpoint.
pub struct FakeGatewayServer {
    url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl FakeGatewayServer {
    pub async fn spawn(status: StatusCode, reply: Value) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            reply,
            captured: captured.clone(),
        };

        let app = Router::new()
            .route("/--/api/v2/push/send", post(push_send))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake gateway");
        let addr = listener.local_addr().expect("fake gateway address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/--/api/v2/push/send", addr),
            captured,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().await.clone()
    }
}

async fn push_send(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.captured.lock().await.push(CapturedRequest {
        accept: header_value(header::ACCEPT),
        accept_encoding: header_value(header::ACCEPT_ENCODING),
        body,
    });

    (state.status, Json(state.reply.clone()))
}
