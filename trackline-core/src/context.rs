//! Shared context for every tracker of a process.
//!
//! Create one [`Trackline`] at startup and pass it by reference to
//! [`TrackerBuilder::build`](crate::tracker::TrackerBuilder::build). It owns
//! the persisted store and hands out one [`Preferences`] per tracker name, so
//! trackers with the same name share the same lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::connectivity::{Connectivity, ManualConnectivity};
use crate::error::Result;
use crate::store::{self, KeyValueStore, MemoryStore, Preferences, SqliteStore};

/// Reported when the screen size is not known
pub const UNKNOWN_RESOLUTION: &str = "unknown";

/// Device properties sent with every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub user_agent: String,
    /// Width and height in pixels
    pub resolution: Option<(u32, u32)>,
    /// Language code, e.g. `en`
    pub language: String,
}

impl DeviceInfo {
    /// Best-effort description of the current host
    pub fn detect() -> Self {
        Self {
            user_agent: format!(
                "trackline/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            resolution: None,
            language: detect_language(),
        }
    }

    /// `res` parameter value, e.g. `1920x1080`
    pub fn resolution_string(&self) -> String {
        match self.resolution {
            Some((width, height)) => format!("{}x{}", width, height),
            None => UNKNOWN_RESOLUTION.to_string(),
        }
    }
}

/// Language from the POSIX locale variables, `en` when unset
fn detect_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|locale| parse_locale_language(&locale))
        .unwrap_or_else(|| "en".to_string())
}

/// `de_DE.UTF-8` → `de`; `C` and `POSIX` carry no language
fn parse_locale_language(locale: &str) -> Option<String> {
    let language = locale
        .split(&['_', '.', '@', '-'][..])
        .next()?
        .to_ascii_lowercase();
    match language.as_str() {
        "" | "c" | "posix" => None,
        _ => Some(language),
    }
}

pub struct Trackline {
    application_id: String,
    store: Arc<dyn KeyValueStore>,
    base_preferences: Arc<Preferences>,
    device_info: DeviceInfo,
    connectivity: Arc<dyn Connectivity>,
    cache_dir: Option<PathBuf>,
    tracker_preferences: Mutex<HashMap<String, Arc<Preferences>>>,
}

impl Trackline {
    /// Context over `store`, with detected device info, an always-connected
    /// probe and no on-disk offline cache
    pub fn new(application_id: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            application_id: application_id.into(),
            base_preferences: Arc::new(Preferences::new(store.clone(), store::BASE_NAMESPACE)),
            store,
            device_info: DeviceInfo::detect(),
            connectivity: Arc::new(ManualConnectivity::default()),
            cache_dir: None,
            tracker_preferences: Mutex::new(HashMap::new()),
        }
    }

    /// Context that persists nothing
    pub fn in_memory(application_id: impl Into<String>) -> Self {
        Self::new(application_id, Arc::new(MemoryStore::new()))
    }

    /// Context backed by the SQLite store and offline cache in the XDG data dir
    pub fn open_default(application_id: impl Into<String>) -> Result<Self> {
        let store = SqliteStore::open(&Config::store_path())?;
        Ok(Self::new(application_id, Arc::new(store)).with_cache_dir(Config::cache_dir()))
    }

    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Directory for per-tracker offline cache files
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Base URL used when a tracker does not configure one
    pub fn default_application_base_url(&self) -> String {
        format!("https://{}/", self.application_id)
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn connectivity(&self) -> Arc<dyn Connectivity> {
        self.connectivity.clone()
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Settings shared by all trackers
    pub fn base_preferences(&self) -> Arc<Preferences> {
        self.base_preferences.clone()
    }

    /// Settings of the tracker called `tracker_name`; same instance for the same name
    pub fn tracker_preferences(&self, tracker_name: &str) -> Arc<Preferences> {
        let mut map = self.tracker_preferences.lock().unwrap();
        map.entry(tracker_name.to_string())
            .or_insert_with(|| {
                Arc::new(Preferences::new(
                    self.store.clone(),
                    store::tracker_namespace(tracker_name),
                ))
            })
            .clone()
    }
}
