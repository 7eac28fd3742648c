//! Decision and response types exchanged with the transport layer.

use crate::config::TargetEndpoint;

/// Whether the hidden service is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Requests are answered by the gate itself.
    Closed,
    /// Non-knock requests are forwarded to the target.
    Open,
}

/// What the gate decided for one request or upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand the request to the forwarding engine.
    Forward(TargetEndpoint),
    /// The open sequence just completed.
    RespondOpen,
    /// The close sequence just completed.
    RespondClosed,
    /// Answer with the decoy (or drop, for upgrades).
    RespondDecoy,
}

/// A fully built HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,

    /// Reason phrase for the status line.
    pub reason: &'static str,

    /// Headers in write order.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: Vec<u8>,

    /// Whether the connection may be reused afterwards.
    pub keep_alive: bool,
}

impl HttpReply {
    /// Plain `200 OK` with a text body.
    pub fn ok_text(body: &str) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            keep_alive: true,
        }
    }

    /// `200 OK` with no body.
    pub fn empty() -> Self {
        Self::ok_text("")
    }

    /// Body of the reply that announces an opened gate.
    pub fn opened() -> Self {
        Self::ok_text("Open\n")
    }

    /// Body of the reply that announces a closed gate.
    pub fn closed() -> Self {
        Self::ok_text("Closed\n")
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize as an HTTP/1.1 response.
    ///
    /// A `Content-Length` header is added when the reply doesn't carry one.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if self.header("Content-Length").is_none() {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// How the transport should answer one request or upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Pipe the request to this endpoint.
    Forward(TargetEndpoint),
    /// Write this response.
    Page(HttpReply),
    /// Close the connection without writing anything.
    Drop,
}
