//! Line-delimited JSON writer

use crate::rpc::error::ServerError;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

pub struct LineTransport<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> LineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Write one message as a JSON line and flush it
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), ServerError> {
        let json = serde_json::to_string(message)?;
        debug!("Sending: {}", json);

        // Write JSON + newline
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ServerError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
