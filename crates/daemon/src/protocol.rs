// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol: message types and wire framing for the build-offload socket.
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload. One message
//! per accepted connection; the server replies on the same connection for
//! `Heartbeat` and `QueryBuild`, and closes immediately with no reply for
//! `AddTask`.

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Maximum message size: generous for a failure report's captured stdout,
/// far short of the wire's theoretical 4GB length-prefix ceiling.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Socket accept timeout, per the Request Server's idle-detection window.
pub const ACCEPT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Timeout used by Client Helpers for a single request/reply round trip.
pub const CLIENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Timeout the Request Server allows a connected client to send its request
/// or receive its reply before giving up on that connection.
pub const SERVER_IO_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("unexpected response shape for this request")]
    UnexpectedResponse,
}

/// A decoded client request. Tagged by the wire's `message_type` field;
/// a message with no `message_type` at all is treated as `AddTask`, for
/// tolerance with older clients (see [`decode_request`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "message_type")]
pub enum Request {
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,

    #[serde(rename = "ADD_TASK")]
    AddTask {
        name: String,
        cwd: PathBuf,
        cmd: Vec<String>,
        build_id: String,
        stamp_file: Option<String>,
        #[serde(default)]
        experimental: bool,
        #[serde(default)]
        tty: Option<String>,
    },

    #[serde(rename = "QUERY_BUILD")]
    QueryBuild { build_id: String },
}

/// A server reply. `Heartbeat` and `QueryBuild` replies have distinct JSON
/// shapes (there is no reply at all for `AddTask`), so this is untagged
/// rather than sharing a single discriminant field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Heartbeat {
        status: String,
    },
    QueryBuild {
        build_id: String,
        completed_tasks: u64,
        pending_tasks: i64,
        pending_outputs: Vec<String>,
    },
}

impl Response {
    /// The literal `{"status":"OK"}` heartbeat reply.
    pub fn heartbeat_ok() -> Self {
        Response::Heartbeat {
            status: "OK".to_string(),
        }
    }
}

/// Encode a message to JSON bytes (without the length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(json)
}

/// Decode a message from wire bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode a [`Request`], defaulting a missing `message_type` field to
/// `ADD_TASK`, for tolerance with clients that omit it entirely.
pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
    if let serde_json::Value::Object(ref mut map) = value {
        map.entry("message_type")
            .or_insert_with(|| serde_json::Value::String("ADD_TASK".to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Read a length-prefixed message from an async reader.
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write a length-prefixed message to an async writer.
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a request with a timeout, applying [`decode_request`]'s default-tag
/// tolerance.
pub async fn read_request<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode_request(&bytes)
}

/// Write a response with a timeout.
pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
