//! Dispatch mode: when the dispatcher may consider itself online.

use crate::connectivity::{Connectivity, LinkType};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Dispatch whenever connected (default)
    #[default]
    #[serde(alias = "ALWAYS")]
    Always,
    /// Dispatch only over wifi
    #[serde(alias = "WIFI_ONLY")]
    WifiOnly,
    /// Assume offline so nothing is lost while the process is going down.
    /// Never persisted.
    #[serde(alias = "EXCEPTION")]
    Exception,
}

impl DispatchMode {
    /// Persisted representation
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchMode::Always => "ALWAYS",
            DispatchMode::WifiOnly => "WIFI_ONLY",
            DispatchMode::Exception => "EXCEPTION",
        }
    }

    /// Whether this mode survives a restart
    pub fn is_persistent(self) -> bool {
        !matches!(self, DispatchMode::Exception)
    }

    /// Combine the mode with current connectivity
    pub fn is_online(self, connectivity: &dyn Connectivity) -> bool {
        if !connectivity.is_connected() {
            return false;
        }
        match self {
            DispatchMode::Exception => false,
            DispatchMode::Always => true,
            DispatchMode::WifiOnly => connectivity.link_type() == LinkType::Wifi,
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "ALWAYS" => Ok(DispatchMode::Always),
            "WIFI_ONLY" => Ok(DispatchMode::WifiOnly),
            "EXCEPTION" => Ok(DispatchMode::Exception),
            _ => Err(format!("unknown dispatch mode: {}", raw)),
        }
    }
}
