//! Push delivery gateway client.
//!
//! Builds push messages and posts them to the Expo push endpoint, one object
//! for a single send or a JSON array for a batch, and decodes the returned
//! delivery tickets.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::GatewayError, models::NotificationData};

/// Expo push endpoint.
pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

const DEFAULT_SOUND: &str = "default";
const HIGH_PRIORITY: &str = "high";

/// One message addressed to one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub priority: String,
}

impl PushMessage {
    /// Build a message with the fixed `default` sound and `high` priority.
    pub fn new(to: &str, title: &str, body: &str, data: &NotificationData) -> Self {
        Self {
            to: to.to_string(),
            sound: DEFAULT_SOUND.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
            priority: HIGH_PRIORITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetails {
    /// `DeviceNotRegistered`, `InvalidCredentials`, `MessageTooBig`, ...
    pub error: Option<String>,
}

/// Per-message delivery ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushTicket {
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<TicketDetails>,
}

impl PushTicket {
    pub fn is_ok(&self) -> bool {
        self.status == TicketStatus::Ok
    }
}

/// Anything that can deliver push messages.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Post a single message object.
    async fn send(&self, message: &PushMessage) -> Result<Vec<PushTicket>, GatewayError>;

    /// Post all messages as one JSON array in a single request.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, GatewayError>;
}

/// HTTP client for the Expo push service.
#[derive(Debug, Clone)]
pub struct ExpoGateway {
    http: reqwest::Client,
    url: String,
}

impl ExpoGateway {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post<T>(&self, payload: &T) -> Result<Vec<PushTicket>, GatewayError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_ENCODING, "gzip, deflate")
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(status = status.as_u16(), body = %body, "Push gateway returned error");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let tickets = parse_tickets(&text)?;
        debug!(tickets = tickets.len(), "Push gateway accepted request");
        Ok(tickets)
    }
}

impl Default for ExpoGateway {
    fn default() -> Self {
        Self::new(EXPO_PUSH_URL)
    }
}

#[async_trait]
impl PushGateway for ExpoGateway {
    async fn send(&self, message: &PushMessage) -> Result<Vec<PushTicket>, GatewayError> {
        self.post(message).await
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, GatewayError> {
        self.post(messages).await
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tickets {
    Many(Vec<PushTicket>),
    One(PushTicket),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketBody {
    Envelope { data: Tickets },
    Bare(Tickets),
}

/// Decode a gateway response: a ticket or ticket array, optionally wrapped
/// in a `{"data": ...}` envelope.
pub fn parse_tickets(body: &str) -> Result<Vec<PushTicket>, GatewayError> {
    let parsed: TicketBody =
        serde_json::from_str(body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

    let tickets = match parsed {
        TicketBody::Envelope { data } | TicketBody::Bare(data) => data,
    };

    Ok(match tickets {
        Tickets::Many(tickets) => tickets,
        Tickets::One(ticket) => vec![ticket],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGatewayServer;
    use axum::http::StatusCode;
    use serde_json::json;

    fn sample_data() -> NotificationData {
        let mut data = NotificationData::new();
        data.insert("screen".to_string(), json!("budget"));
        data
    }

    #[test]
    fn message_carries_fixed_sound_and_priority() {
        let msg = PushMessage::new("ExponentPushToken[a]", "Budget", "Over limit", &sample_data());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["to"], "ExponentPushToken[a]");
        assert_eq!(json["sound"], "default");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["data"]["screen"], "budget");
    }

    #[test]
    fn parses_bare_array_single_ticket_and_envelope() {
        let many = parse_tickets(r#"[{"status":"ok","id":"a"},{"status":"error","message":"gone"}]"#)
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many[0].is_ok());
        assert!(!many[1].is_ok());

        let one = parse_tickets(r#"{"status":"ok","id":"x"}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id.as_deref(), Some("x"));

        let wrapped = parse_tickets(
            r#"{"data":[{"status":"error","details":{"error":"DeviceNotRegistered"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            wrapped[0].details.as_ref().and_then(|d| d.error.as_deref()),
            Some("DeviceNotRegistered")
        );
    }

    #[test]
    fn rejects_unrecognised_body() {
        assert!(matches!(
            parse_tickets(r#"{"unexpected":true}"#),
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn single_send_posts_one_object_with_gateway_headers() {
        let server = FakeGatewayServer::spawn(
            StatusCode::OK,
            json!({"data": {"status": "ok", "id": "ticket-1"}}),
        )
        .await;
        let gateway = ExpoGateway::new(server.url());

        let msg = PushMessage::new("ExponentPushToken[a]", "T", "B", &NotificationData::new());
        let tickets = gateway.send(&msg).await.unwrap();

        assert_eq!(tickets.len(), 1);
        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.is_object());
        assert_eq!(requests[0].body["to"], "ExponentPushToken[a]");
        assert_eq!(requests[0].accept.as_deref(), Some("application/json"));
        assert_eq!(requests[0].accept_encoding.as_deref(), Some("gzip, deflate"));
    }

    #[tokio::test]
    async fn batch_send_posts_an_array_in_one_request() {
        let server = FakeGatewayServer::spawn(
            StatusCode::OK,
            json!([{"status": "ok"}, {"status": "ok"}]),
        )
        .await;
        let gateway = ExpoGateway::new(server.url());

        let messages: Vec<PushMessage> = ["t1", "t2"]
            .iter()
            .map(|t| PushMessage::new(t, "T", "B", &NotificationData::new()))
            .collect();
        let tickets = gateway.send_batch(&messages).await.unwrap();

        assert_eq!(tickets.len(), 2);
        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server =
            FakeGatewayServer::spawn(StatusCode::TOO_MANY_REQUESTS, json!({"errors": []})).await;
        let gateway = ExpoGateway::new(server.url());

        let msg = PushMessage::new("t", "T", "B", &NotificationData::new());
        let err = gateway.send(&msg).await.unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_request_error() {
        let gateway = ExpoGateway::new("http://127.0.0.1:9/--/api/v2/push/send");
        let msg = PushMessage::new("t", "T", "B", &NotificationData::new());

        assert!(matches!(
            gateway.send(&msg).await,
            Err(GatewayError::Request(_))
        ));
    }
}
