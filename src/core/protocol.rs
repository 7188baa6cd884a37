//! Bridge wire protocol and request dispatch
//!
//! Every request is one JSON object carrying an `action` field
//! (case-insensitive). Every response carries `status` (`OK` / `ERROR`)
//! plus action-specific fields:
//!
//! | action            | response fields                                   |
//! |-------------------|---------------------------------------------------|
//! | GET_SIGNALS       | signals, queue_size                               |
//! | SEND_STATUS       | -                                                 |
//! | HEARTBEAT         | timestamp, queue_size                             |
//! | GET_BRIDGE_STATUS | connection_status, queue_size, stats, last_contact|
//! | anything else     | message (status ERROR)                            |

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::session::{lock_session, SharedSession, StatusReport};
use crate::core::signal::{timestamp_format, Signal};
use crate::core::store::SignalStore;

pub const ACTION_GET_SIGNALS: &str = "GET_SIGNALS";
pub const ACTION_SEND_STATUS: &str = "SEND_STATUS";
pub const ACTION_HEARTBEAT: &str = "HEARTBEAT";
pub const ACTION_GET_BRIDGE_STATUS: &str = "GET_BRIDGE_STATUS";

// =============================================================================
// Requests
// =============================================================================

/// A request that failed to parse. Answered with an ERROR response; the
/// bridge keeps serving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Invalid JSON: {0}")]
    Malformed(String),

    #[error("Request must be a JSON object")]
    NotAnObject,

    #[error("Missing action field")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid count: {0}")]
    InvalidCount(String),

    #[error("Payload too large (max {0} bytes)")]
    TooLarge(usize),
}

/// A well-formed request from the execution agent
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    /// Dequeue up to `count` signals (all when `None`)
    GetSignals { count: Option<usize> },
    /// Free-form status report from the peer
    SendStatus { status: String, message: String },
    Heartbeat,
    GetBridgeStatus,
}

impl BridgeRequest {
    /// Parse one raw request line
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RequestError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let object = value.as_object().ok_or(RequestError::NotAnObject)?;
        let action = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingAction)?
            .trim()
            .to_ascii_uppercase();

        match action.as_str() {
            ACTION_GET_SIGNALS => {
                let count = match object.get("count") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(
                        v.as_u64()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| RequestError::InvalidCount(v.to_string()))?,
                    ),
                };
                Ok(BridgeRequest::GetSignals { count })
            }
            ACTION_SEND_STATUS => Ok(BridgeRequest::SendStatus {
                status: string_field(object, "status"),
                message: string_field(object, "message"),
            }),
            ACTION_HEARTBEAT => Ok(BridgeRequest::Heartbeat),
            ACTION_GET_BRIDGE_STATUS => Ok(BridgeRequest::GetBridgeStatus),
            _ => Err(RequestError::UnknownAction(action)),
        }
    }

    /// Wire form, used by the client side
    pub fn to_value(&self) -> Value {
        match self {
            BridgeRequest::GetSignals { count } => match count {
                Some(n) => json!({ "action": ACTION_GET_SIGNALS, "count": n }),
                None => json!({ "action": ACTION_GET_SIGNALS }),
            },
            BridgeRequest::SendStatus { status, message } => json!({
                "action": ACTION_SEND_STATUS,
                "status": status,
                "message": message,
            }),
            BridgeRequest::Heartbeat => json!({ "action": ACTION_HEARTBEAT }),
            BridgeRequest::GetBridgeStatus => json!({ "action": ACTION_GET_BRIDGE_STATUS }),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            BridgeRequest::GetSignals { .. } => ACTION_GET_SIGNALS,
            BridgeRequest::SendStatus { .. } => ACTION_SEND_STATUS,
            BridgeRequest::Heartbeat => ACTION_HEARTBEAT,
            BridgeRequest::GetBridgeStatus => ACTION_GET_BRIDGE_STATUS,
        }
    }
}

/// Non-string values are rendered as JSON text
fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Response envelope: `status` plus the flattened body fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub status: ResponseStatus,
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Action-specific response fields.
///
/// Variant order matters for deserialization: `Ack` accepts any object
/// and must stay last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Signals { signals: Vec<Signal>, queue_size: usize },
    Heartbeat { timestamp: String, queue_size: usize },
    Status(StatusReport),
    Error { message: String },
    Ack {},
}

impl BridgeResponse {
    pub fn ok(body: ResponseBody) -> Self {
        Self { status: ResponseStatus::Ok, body }
    }

    pub fn ack() -> Self {
        Self::ok(ResponseBody::Ack {})
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            body: ResponseBody::Error { message: message.into() },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Error message, if this is an ERROR response
    pub fn message(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Serialize to one wire line (without the trailing newline)
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable through a non-finite float in a signal
            format!(
                r#"{{"status":"ERROR","message":{}}}"#,
                Value::String(format!("Response encoding failed: {}", e))
            )
        })
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Serves requests against the signal store and session state.
///
/// Cheap to clone; the request loop owns one.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: Arc<SignalStore>,
    session: SharedSession,
}

impl RequestHandler {
    pub fn new(store: Arc<SignalStore>, session: SharedSession) -> Self {
        Self { store, session }
    }

    /// Answer one raw request line. Never fails: parse errors become
    /// ERROR responses and leave store state untouched.
    pub fn handle_line(&self, raw: &str) -> BridgeResponse {
        match BridgeRequest::parse(raw) {
            Ok(request) => self.handle(request),
            Err(e) => self.reject(e),
        }
    }

    /// Count and answer a request that could not be served
    pub fn reject(&self, error: RequestError) -> BridgeResponse {
        warn!(error = %error, "[BRIDGE] Rejected request");
        lock_session(&self.session).record_error();
        BridgeResponse::error(error.to_string())
    }

    pub fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        debug!(action = request.action(), "[BRIDGE] Request");

        match request {
            BridgeRequest::GetSignals { count } => {
                let signals = self.store.take(count);
                let queue_size = self.store.size();
                {
                    let mut session = lock_session(&self.session);
                    session.record_sent(signals.len());
                    self.note_contact(&mut session);
                }
                if !signals.is_empty() {
                    info!(
                        count = signals.len(),
                        queue_size = queue_size,
                        "[SIGNAL] Delivered signals to peer"
                    );
                }
                BridgeResponse::ok(ResponseBody::Signals { signals, queue_size })
            }
            BridgeRequest::SendStatus { status, message } => {
                self.note_contact(&mut lock_session(&self.session));
                debug!(peer_status = %status, peer_message = %message, "[BRIDGE] Peer status");
                BridgeResponse::ack()
            }
            BridgeRequest::Heartbeat => {
                self.note_contact(&mut lock_session(&self.session));
                BridgeResponse::ok(ResponseBody::Heartbeat {
                    timestamp: timestamp_format::format(&Utc::now()),
                    queue_size: self.store.size(),
                })
            }
            BridgeRequest::GetBridgeStatus => {
                let queue_size = self.store.size();
                let report = lock_session(&self.session).report(queue_size);
                BridgeResponse::ok(ResponseBody::Status(report))
            }
        }
    }

    fn note_contact(&self, session: &mut crate::core::session::BridgeSession) {
        if session.record_contact() {
            info!(
                reconnections = session.stats().reconnections,
                "[HEARTBEAT] Peer reconnected"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
