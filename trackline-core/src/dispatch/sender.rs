//! Packet transmission.
//!
//! [`PacketSender`] is the seam the dispatcher depends on;
//! [`HttpPacketSender`] talks to the collector over HTTP.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::{Error, Result};

use super::packet::{BulkRequest, Packet};

/// Per-transmission settings, owned by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Connect + read timeout
    pub timeout: Duration,
    /// Gzip POST bodies
    pub gzip: bool,
}

/// Transmits one packet synchronously.
///
/// Implementations must not panic on transport problems; every failure is
/// reported as an `Err` and the packet's events are requeued by the caller.
pub trait PacketSender: Send + Sync {
    fn send(&self, packet: &Packet, options: &SendOptions) -> Result<()>;
}

/// Only 200 and 204 acknowledge a packet
pub fn is_success_status(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::NO_CONTENT
}

/// Serialize a bulk body, optionally gzip-compressed
pub fn encode_body(body: &BulkRequest, gzip: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(body)?;
    if !gzip {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// HTTP sender for the collector API
///
/// Runs on the dispatcher thread; owns a current-thread runtime to drive the
/// async client, like a blocking wrapper around it.
pub struct HttpPacketSender {
    http_client: reqwest::Client,
    // Only taken in Drop
    runtime: Option<tokio::runtime::Runtime>,
}

impl HttpPacketSender {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to create runtime: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            runtime: Some(runtime),
        })
    }

    async fn send_async(&self, packet: &Packet, options: &SendOptions) -> Result<()> {
        let request = match packet.post_body() {
            Some(body) => {
                let mut request = self
                    .http_client
                    .post(packet.target_url())
                    .header(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/json; charset=utf-8"),
                    )
                    .body(encode_body(body, options.gzip)?);
                if options.gzip {
                    request = request.header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                }
                request
            }
            None => self.http_client.get(packet.target_url()),
        };

        let response = request
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| Error::Transmission(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        // Always read the body to the end so the connection can be reused
        let body = response.text().await;

        if is_success_status(status) {
            tracing::trace!(status = %status, "Transmission successful");
            Ok(())
        } else {
            let reason = body.unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transmission(format!(
                "collector responded {}: {}",
                status,
                reason.trim()
            )))
        }
    }
}

impl PacketSender for HttpPacketSender {
    fn send(&self, packet: &Packet, options: &SendOptions) -> Result<()> {
        tracing::debug!(%packet, "Sending packet");
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::Transmission("sender is shut down".to_string()))?;
        runtime.block_on(self.send_async(packet, options))
    }
}

impl Drop for HttpPacketSender {
    fn drop(&mut self) {
        // The last tracker handle may be dropped from inside an async context
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
