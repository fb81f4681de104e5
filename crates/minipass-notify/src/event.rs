//! # Wire Events
//!
//! Decoding for the server's event-stream frames. The server pushes
//! `data: {json}` frames separated by blank lines, with a heartbeat
//! every 30 seconds. Individual malformed payloads are dropped by the
//! caller; nothing in here is fatal to the channel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of event carried on the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A payment was received
    Payment,
    /// A new signup was registered
    Signup,
    /// Liveness signal, no user-visible effect
    Heartbeat,
    /// Server-side error report, logged only
    Error,
}

/// A single event received on the notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event kind, carried as `type` on the wire
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Server-assigned identifier for the event
    #[serde(default)]
    pub id: String,
    /// Kind-specific payload fields
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl StreamEvent {
    /// Parse an event from a raw JSON document
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Whether this event should produce a displayed notification
    pub fn is_renderable(&self) -> bool {
        matches!(self.kind, EventKind::Payment | EventKind::Signup)
    }

    /// Whether the notification must not auto-dismiss
    pub fn is_persistent(&self) -> bool {
        self.data
            .get("persistent")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Fetch a string field from the payload
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Fetch a numeric field from the payload
    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }
}

/// Incremental decoder turning raw channel bytes into event payloads.
///
/// Accepts both SSE framing (`data:` prefixed lines, `:` comments,
/// blank-line separators) and bare line-delimited JSON.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning any complete payloads
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos.min(line.len())]);
            let line = line.trim_end_matches('\r');

            if let Some(payload) = Self::decode_line(line) {
                payloads.push(payload.to_string());
            }
        }
        payloads
    }

    /// Decode a single framed line into its payload, if it carries one
    fn decode_line(line: &str) -> Option<&str> {
        if line.is_empty() {
            // Frame separator
            return None;
        }
        if line.starts_with(':') {
            // SSE comment line, used by some servers as keep-alive
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let payload = rest.strip_prefix(' ').unwrap_or(rest);
            if payload.is_empty() {
                return None;
            }
            return Some(payload);
        }
        // Tolerate bare line-delimited JSON
        Some(line)
    }
}
