//! Packets: wire-level transmission units built from drained events.
//!
//! ```text
//! 1 event   → GET  <api_url>?idsite=1&url=...
//! n events  → POST <api_url>  {"requests": ["?idsite=1&...", "?idsite=1&...", ...]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::Event;

/// Maximum number of events per bulk packet
pub const PAGE_SIZE: usize = 20;

/// Body of a bulk POST packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    /// Endpoint-relative query strings, in submission order
    pub requests: Vec<String>,
}

/// Data that can be sent to the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    target_url: String,
    post_body: Option<BulkRequest>,
    event_count: usize,
}

impl Packet {
    /// Single-event packet; the target URL carries the full query
    pub fn get(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            post_body: None,
            event_count: 1,
        }
    }

    /// Bulk packet posting `body` to `target_url`
    pub fn post(target_url: impl Into<String>, body: BulkRequest) -> Self {
        let event_count = body.requests.len();
        Self {
            target_url: target_url.into(),
            post_body: Some(body),
            event_count,
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// `None` for single-event GET packets
    pub fn post_body(&self) -> Option<&BulkRequest> {
        self.post_body.as_ref()
    }

    /// How many queued events this packet acknowledges on success
    pub fn event_count(&self) -> usize {
        self.event_count
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.post_body {
            Some(body) => write!(f, "Packet(type=POST, events={})", body.requests.len()),
            None => write!(f, "Packet(type=GET, url={})", self.target_url),
        }
    }
}

/// Groups drained events into packets of at most [`PAGE_SIZE`] events
#[derive(Debug, Clone)]
pub struct PacketFactory {
    api_url: String,
    page_size: usize,
}

impl PacketFactory {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_page_size(api_url, PAGE_SIZE)
    }

    pub fn with_page_size(api_url: impl Into<String>, page_size: usize) -> Self {
        Self {
            api_url: api_url.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Build `ceil(events / page_size)` packets in event order
    pub fn build_packets(&self, events: &[Event]) -> Vec<Packet> {
        events
            .chunks(self.page_size)
            .map(|page| match page {
                [single] => self.build_get(single),
                _ => self.build_post(page),
            })
            .collect()
    }

    fn build_get(&self, event: &Event) -> Packet {
        Packet::get(format!("{}{}", self.api_url, event.encoded_query()))
    }

    fn build_post(&self, events: &[Event]) -> Packet {
        let requests = events
            .iter()
            .map(|event| event.encoded_query().to_string())
            .collect();
        Packet::post(self.api_url.clone(), BulkRequest { requests })
    }
}
