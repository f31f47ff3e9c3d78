//! Network reachability probe consulted by the dispatcher.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Kind of link the device is currently using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    None,
    Mobile,
    Wifi,
}

impl LinkType {
    fn to_u8(self) -> u8 {
        match self {
            LinkType::None => 0,
            LinkType::Mobile => 1,
            LinkType::Wifi => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkType::Mobile,
            2 => LinkType::Wifi,
            _ => LinkType::None,
        }
    }
}

/// Reports current reachability. Called from the dispatcher thread.
pub trait Connectivity: Send + Sync {
    /// Whether any network is reachable
    fn is_connected(&self) -> bool;

    /// The current link type, `LinkType::None` when disconnected
    fn link_type(&self) -> LinkType;
}

/// Connectivity state pushed in by the host application.
///
/// Starts out connected over wifi. Hosts that observe network changes call
/// [`ManualConnectivity::set`]; tests use it to script transitions.
#[derive(Debug)]
pub struct ManualConnectivity {
    connected: AtomicBool,
    link: AtomicU8,
}

impl ManualConnectivity {
    pub fn new(connected: bool, link: LinkType) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            link: AtomicU8::new(link.to_u8()),
        }
    }

    /// Update both reachability and link type
    pub fn set(&self, connected: bool, link: LinkType) {
        self.link.store(link.to_u8(), Ordering::SeqCst);
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_link_type(&self, link: LinkType) {
        self.link.store(link.to_u8(), Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true, LinkType::Wifi)
    }
}

impl Connectivity for ManualConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn link_type(&self) -> LinkType {
        if !self.is_connected() {
            return LinkType::None;
        }
        LinkType::from_u8(self.link.load(Ordering::SeqCst))
    }
}
