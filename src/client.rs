//! Execution-agent side of the bridge protocol
//!
//! `BridgeClient` speaks the same line-delimited JSON as the bridge and
//! waits for exactly one response per request. Used by the integration
//! tests and the `bridge_probe` binary.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::core::protocol::{BridgeRequest, BridgeResponse, ResponseBody};
use crate::core::session::StatusReport;
use crate::core::signal::Signal;
use crate::error::{AppError, Result};

/// Default time to wait for a response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a response line (a GET_SIGNALS batch can be large)
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Reply to HEARTBEAT
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatAck {
    pub timestamp: String,
    pub queue_size: usize,
}

/// Reply to GET_SIGNALS
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBatch {
    pub signals: Vec<Signal>,
    pub queue_size: usize,
}

#[derive(Debug)]
pub struct BridgeClient {
    framed: Framed<TcpStream, LinesCodec>,
    response_timeout: Duration,
}

impl BridgeClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| AppError::Transport(format!("Failed to connect: {}", e)))?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_RESPONSE_BYTES)),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Send one request object and wait for its response
    pub async fn request(&mut self, request: &Value) -> Result<BridgeResponse> {
        let line = serde_json::to_string(request)?;
        self.send_raw(&line).await
    }

    /// Send one raw line (need not be valid JSON) and wait for the response
    pub async fn send_raw(&mut self, line: &str) -> Result<BridgeResponse> {
        self.framed.send(line).await.map_err(codec_error)?;

        let next = tokio::time::timeout(self.response_timeout, self.framed.next())
            .await
            .map_err(|_| AppError::Transport("Timed out waiting for response".to_string()))?;

        match next {
            Some(Ok(reply)) => Ok(serde_json::from_str(&reply)?),
            Some(Err(e)) => Err(codec_error(e)),
            None => Err(AppError::Transport("Connection closed by bridge".to_string())),
        }
    }

    pub async fn get_signals(&mut self, count: Option<usize>) -> Result<SignalBatch> {
        let response = self.call(BridgeRequest::GetSignals { count }).await?;
        match response.body {
            ResponseBody::Signals { signals, queue_size } => Ok(SignalBatch { signals, queue_size }),
            other => Err(unexpected("GET_SIGNALS", &other)),
        }
    }

    pub async fn heartbeat(&mut self) -> Result<HeartbeatAck> {
        let response = self.call(BridgeRequest::Heartbeat).await?;
        match response.body {
            ResponseBody::Heartbeat { timestamp, queue_size } => Ok(HeartbeatAck { timestamp, queue_size }),
            other => Err(unexpected("HEARTBEAT", &other)),
        }
    }

    pub async fn send_status(&mut self, status: &str, message: &str) -> Result<()> {
        self.call(BridgeRequest::SendStatus {
            status: status.to_string(),
            message: message.to_string(),
        })
        .await
        .map(|_| ())
    }

    pub async fn bridge_status(&mut self) -> Result<StatusReport> {
        let response = self.call(BridgeRequest::GetBridgeStatus).await?;
        match response.body {
            ResponseBody::Status(report) => Ok(report),
            other => Err(unexpected("GET_BRIDGE_STATUS", &other)),
        }
    }

    /// Typed request; an ERROR response becomes `AppError::Bridge`
    async fn call(&mut self, request: BridgeRequest) -> Result<BridgeResponse> {
        let response = self.request(&request.to_value()).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(AppError::Bridge(
                response.message().unwrap_or("Unknown error").to_string(),
            ))
        }
    }
}

fn codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::Io(e) => AppError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Transport(format!("Response exceeds {} bytes", MAX_RESPONSE_BYTES))
        }
    }
}

fn unexpected(action: &str, body: &ResponseBody) -> AppError {
    AppError::Bridge(format!("Unexpected {} response: {:?}", action, body))
}
