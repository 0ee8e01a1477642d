// Line-oriented JSON client for server tests

use indexd::rpc::protocol::{Envelope, Greeting, ReplyEnvelope};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestClient {
    pub peer: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

#[allow(dead_code)] // Used in integration tests
impl TestClient {
    /// Connect and consume the greeting
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (read_half, writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let greeting = read_line(&mut lines, REPLY_TIMEOUT)
            .await
            .expect("No greeting");
        let greeting: Greeting = serde_json::from_str(&greeting).expect("Bad greeting");

        Self {
            peer: greeting.peer,
            lines,
            writer,
            next_id: 1,
        }
    }

    /// Send a request to `to` and wait for its reply
    pub async fn call(&mut self, to: &str, request: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&Envelope {
            id: Some(json!(id)),
            to: to.to_string(),
            request,
        })
        .await;

        let reply = self
            .recv_within(REPLY_TIMEOUT)
            .await
            .expect("Connection closed before reply");
        assert_eq!(reply.id, json!(id), "reply id mismatch");
        reply.reply
    }

    /// Send a request without an id
    pub async fn cast(&mut self, to: &str, request: Value) {
        self.send(&Envelope {
            id: None,
            to: to.to_string(),
            request,
        })
        .await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next reply line, or None if nothing arrives in time
    pub async fn recv_within(&mut self, timeout: Duration) -> Option<ReplyEnvelope> {
        let line = read_line(&mut self.lines, timeout).await?;
        Some(serde_json::from_str(&line).expect("Bad reply envelope"))
    }

    async fn send(&mut self, envelope: &Envelope) {
        let line = serde_json::to_string(envelope).unwrap();
        self.send_raw(&line).await;
    }
}

async fn read_line(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    timeout: Duration,
) -> Option<String> {
    match tokio::time::timeout(timeout, lines.next_line()).await {
        Ok(Ok(line)) => line,
        _ => None,
    }
}
