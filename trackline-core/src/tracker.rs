//! The tracker: session handling and parameter injection in front of the
//! dispatcher.
//!
//! ```text
//! track(bag) ── tracking lock ─────────────────────────────────────────────┐
//!   │ new session?  → new_visit, _idts, _idvc, _viewts (preferences lock)  │
//!   │ base params   → idsite, rec, apiv, rand, cdt, _id, uid, res, ua, url │
//!   │ callbacks     → fold, `None` aborts                                  │
//!   └ opted out?    → drop, else Dispatcher::submit                        ┘
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{
    validate_api_url, Config, DEFAULT_OFFLINE_CACHE_AGE_MS, DEFAULT_OFFLINE_CACHE_SIZE,
    DEFAULT_SESSION_TIMEOUT_MS,
};
use crate::context::Trackline;
use crate::dispatch::{
    DiskCache, DispatchMode, DispatchStats, Dispatcher, DryRunSink, EventCache, FailureCallback,
    HttpPacketSender, PacketFactory, PacketSender,
};
use crate::error::{Error, Result};
use crate::query::{QueryParam, TrackMe};
use crate::store::Preferences;

pub const PREF_KEY_OPT_OUT: &str = "tracker.optout";
pub const PREF_KEY_USER_ID: &str = "tracker.userid";
pub const PREF_KEY_VISITOR_ID: &str = "tracker.visitorid";
pub const PREF_KEY_FIRST_VISIT: &str = "tracker.firstvisit";
pub const PREF_KEY_VISIT_COUNT: &str = "tracker.visitcount";
pub const PREF_KEY_PREVIOUS_VISIT: &str = "tracker.previousvisit";
pub const PREF_KEY_OFFLINE_CACHE_AGE: &str = "tracker.cache.age";
pub const PREF_KEY_OFFLINE_CACHE_SIZE: &str = "tracker.cache.size";
pub const PREF_KEY_DISPATCH_MODE: &str = "tracker.dispatcher.mode";

const DEFAULT_TRUE_VALUE: &str = "1";
const DEFAULT_RECORD_VALUE: &str = DEFAULT_TRUE_VALUE;
const DEFAULT_API_VERSION_VALUE: &str = "1";
const REQUEST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// Transforms a bag right before submission; `None` aborts tracking
pub type TrackingCallback = Box<dyn Fn(TrackMe) -> Option<TrackMe> + Send + Sync>;

/// Handle returned by [`Tracker::add_tracking_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Random visitor id: 16 lowercase hex characters
pub fn make_random_visitor_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Exactly 16 lowercase hex characters
pub fn is_valid_visitor_id(visitor_id: &str) -> bool {
    visitor_id.len() == 16
        && visitor_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// `scheme://rest`, where the scheme is made of word characters
fn is_absolute_url(path: &str) -> bool {
    match path.find("://") {
        Some(idx) if idx > 0 => {
            path[..idx]
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_')
                && path.len() > idx + 3
        }
        _ => false,
    }
}

/// Resolve a bag's `url` against the application base URL.
///
/// Absolute URLs are kept; relative paths are joined with exactly one `/`.
/// A missing path falls back to the last URL tracked.
fn resolve_url_path(base_url: &str, path: Option<&str>, last_url: Option<&str>) -> Option<String> {
    let path = match path {
        None => return last_url.map(str::to_string),
        Some(path) => path,
    };
    if is_absolute_url(path) {
        return Some(path.to_string());
    }
    let joined = match (base_url.ends_with('/'), path.starts_with('/')) {
        (false, false) => format!("{}/{}", base_url, path),
        (true, true) => format!("{}{}", base_url, &path[1..]),
        _ => format!("{}{}", base_url, path),
    };
    Some(joined)
}

/// Offline cache file for one tracker: `<host>-<name digest>.db`
fn cache_file_name(api_url: &url::Url, tracker_name: &str) -> String {
    let digest = hex::encode(Sha256::digest(tracker_name.as_bytes()));
    format!(
        "{}-{}.db",
        api_url.host_str().unwrap_or("collector"),
        &digest[..12]
    )
}

/// Builds a [`Tracker`] against a [`Trackline`] context.
#[derive(Debug, Clone)]
pub struct TrackerBuilder {
    api_url: String,
    site_id: u32,
    name: String,
    application_base_url: Option<String>,
    settings: Option<Config>,
}

impl TrackerBuilder {
    pub fn new(api_url: impl Into<String>, site_id: u32) -> Self {
        Self {
            api_url: api_url.into(),
            site_id,
            name: crate::config::TrackerConfig::default().name,
            application_base_url: None,
            settings: None,
        }
    }

    /// Builder from a loaded config; dispatch, session and cache settings are
    /// applied to the tracker on build
    pub fn from_config(config: &Config) -> Result<Self> {
        config.tracker.validate()?;
        let tracker = &config.tracker;
        Ok(Self {
            api_url: tracker.api_url.clone().unwrap_or_default(),
            site_id: tracker.site_id.unwrap_or_default(),
            name: tracker.name.clone(),
            application_base_url: tracker.application_base_url.clone(),
            settings: Some(config.clone()),
        })
    }

    /// Unique name; trackers are keyed by it in the preference store
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn application_base_url(mut self, url: impl Into<String>) -> Self {
        self.application_base_url = Some(url.into());
        self
    }

    /// Build a tracker that sends over HTTP
    pub fn build(self, context: &Trackline) -> Result<Tracker> {
        let sender = HttpPacketSender::new()?;
        self.build_with_sender(context, Arc::new(sender))
    }

    /// Build a tracker over a custom packet sender
    pub fn build_with_sender(
        self,
        context: &Trackline,
        sender: Arc<dyn PacketSender>,
    ) -> Result<Tracker> {
        let api_url = validate_api_url(&self.api_url)?;
        if self.site_id == 0 {
            return Err(Error::Config("site id must be greater than 0".to_string()));
        }
        if self.name.is_empty() {
            return Err(Error::Config("tracker name must not be empty".to_string()));
        }

        let application_base_url = self
            .application_base_url
            .clone()
            .unwrap_or_else(|| context.default_application_base_url());
        let preferences = context.tracker_preferences(&self.name);

        let max_age = preferences
            .get_i64(PREF_KEY_OFFLINE_CACHE_AGE)
            .unwrap_or(DEFAULT_OFFLINE_CACHE_AGE_MS);
        let max_size = preferences
            .get_i64(PREF_KEY_OFFLINE_CACHE_SIZE)
            .unwrap_or(DEFAULT_OFFLINE_CACHE_SIZE);
        let disk = match context.cache_dir() {
            Some(dir) => {
                let path = dir.join(cache_file_name(&api_url, &self.name));
                DiskCache::open(&path, max_age, max_size).or_else(|e| {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to open offline cache, using memory");
                    DiskCache::in_memory(max_age, max_size)
                })?
            }
            None => DiskCache::in_memory(max_age, max_size)?,
        };

        let dispatcher = Dispatcher::new(
            EventCache::new(disk),
            context.connectivity(),
            PacketFactory::new(self.api_url.clone()),
            sender,
        );

        let dispatch_mode = preferences
            .get_string(PREF_KEY_DISPATCH_MODE)
            .and_then(|raw| raw.parse::<DispatchMode>().ok())
            .filter(|mode| mode.is_persistent())
            .unwrap_or_default();
        dispatcher.set_dispatch_mode(dispatch_mode);

        let opt_out = preferences.get_bool(PREF_KEY_OPT_OUT).unwrap_or(false);

        let visitor_id = match preferences
            .get_string(PREF_KEY_VISITOR_ID)
            .filter(|id| is_valid_visitor_id(id))
        {
            Some(id) => id,
            None => {
                let id = make_random_visitor_id();
                preferences.put_string(PREF_KEY_VISITOR_ID, &id);
                id
            }
        };

        let device = context.device_info();
        let mut default_track_me = TrackMe::new();
        default_track_me
            .set_opt(QueryParam::UserId, preferences.get_string(PREF_KEY_USER_ID))
            .set(QueryParam::VisitorId, visitor_id)
            .set(QueryParam::ScreenResolution, device.resolution_string())
            .set(QueryParam::UserAgent, device.user_agent.clone())
            .set(QueryParam::Language, device.language.clone())
            .set(QueryParam::UrlPath, application_base_url.clone());

        tracing::debug!(
            name = %self.name,
            api_url = %self.api_url,
            site_id = self.site_id,
            %dispatch_mode,
            opt_out,
            "Tracker created"
        );

        let tracker = Tracker {
            api_url: self.api_url,
            site_id: self.site_id,
            name: self.name,
            application_base_url,
            preferences,
            dispatcher,
            state: Mutex::new(TrackingState {
                default_track_me,
                session_start: None,
                session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
                last_event: None,
            }),
            callbacks: RwLock::new(Vec::new()),
            next_callback_id: AtomicU64::new(0),
            opt_out: AtomicBool::new(opt_out),
        };

        if let Some(config) = self.settings {
            tracker.apply_config(&config);
        }
        Ok(tracker)
    }
}

/// State guarded by the tracking lock
struct TrackingState {
    default_track_me: TrackMe,
    /// `None` until the first event of a session
    session_start: Option<Instant>,
    session_timeout: Duration,
    last_event: Option<TrackMe>,
}

pub struct Tracker {
    api_url: String,
    site_id: u32,
    name: String,
    application_base_url: String,
    preferences: Arc<Preferences>,
    dispatcher: Dispatcher,
    state: Mutex<TrackingState>,
    callbacks: RwLock<Vec<(CallbackId, TrackingCallback)>>,
    next_callback_id: AtomicU64,
    opt_out: AtomicBool,
}

impl Tracker {
    /// Inject session and base parameters and queue the bag.
    ///
    /// Never fails: transmission problems are handled by the dispatcher, and
    /// opted-out or callback-aborted bags are dropped silently. Callbacks run
    /// under the tracking lock and must not call back into this tracker.
    pub fn track(&self, mut track_me: TrackMe) {
        let mut state = self.state.lock().unwrap();

        let new_session = state
            .session_start
            .map_or(true, |start| start.elapsed() > state.session_timeout);
        if new_session {
            state.session_start = Some(Instant::now());
            self.inject_initial_params(&mut state, &mut track_me);
        }

        self.inject_base_params(&mut state, &mut track_me);

        // A panicking callback drops the bag; the tracking lock stays usable
        let callbacks = self.callbacks.read().unwrap();
        let folded = panic::catch_unwind(AssertUnwindSafe(|| {
            callbacks.iter().try_fold(track_me, |bag, (id, callback)| {
                let result = callback(bag);
                if result.is_none() {
                    tracing::debug!(callback = id.0, "Tracking aborted by callback");
                }
                result
            })
        }));
        drop(callbacks);
        let track_me = match folded {
            Ok(Some(track_me)) => track_me,
            Ok(None) => return,
            Err(payload) => {
                tracing::warn!(
                    panic = %crate::exception::panic_message(payload.as_ref()),
                    "Tracking callback panicked, event dropped"
                );
                return;
            }
        };

        if self.is_opt_out() {
            tracing::debug!(event = %track_me, "Event omitted due to opt out");
        } else {
            self.dispatcher.submit(&track_me);
            tracing::debug!(event = %track_me, "Event added to the queue");
        }
        state.last_event = Some(track_me);
    }

    /// Parameters sent only with the first event of a session
    fn inject_initial_params(&self, state: &mut TrackingState, track_me: &mut TrackMe) {
        let now = Utc::now().timestamp();

        let (visit_count, first_visit, previous_visit) = {
            let prefs = &self.preferences;
            let _guard = prefs.lock();

            let visit_count = 1 + prefs.get_i64(PREF_KEY_VISIT_COUNT).unwrap_or(0);
            prefs.put_i64(PREF_KEY_VISIT_COUNT, visit_count);

            let first_visit = match prefs.get_i64(PREF_KEY_FIRST_VISIT) {
                Some(first_visit) => first_visit,
                None => {
                    prefs.put_i64(PREF_KEY_FIRST_VISIT, now);
                    now
                }
            };

            let previous_visit = prefs.get_i64(PREF_KEY_PREVIOUS_VISIT);
            prefs.put_i64(PREF_KEY_PREVIOUS_VISIT, now);

            (visit_count, first_visit, previous_visit)
        };

        let defaults = &mut state.default_track_me;
        defaults
            .set(QueryParam::FirstVisitTimestamp, first_visit.to_string())
            .set(QueryParam::TotalNumberOfVisits, visit_count.to_string())
            .set_opt(
                QueryParam::PreviousVisitTimestamp,
                previous_visit.map(|t| t.to_string()),
            );

        track_me.try_set(QueryParam::SessionStart, DEFAULT_TRUE_VALUE);
        for key in [
            QueryParam::FirstVisitTimestamp,
            QueryParam::TotalNumberOfVisits,
            QueryParam::PreviousVisitTimestamp,
        ] {
            track_me.try_set_opt(key.clone(), defaults.get(&key));
        }
    }

    /// Parameters required on every request
    fn inject_base_params(&self, state: &mut TrackingState, track_me: &mut TrackMe) {
        track_me
            .try_set(QueryParam::SiteId, self.site_id.to_string())
            .try_set(QueryParam::Record, DEFAULT_RECORD_VALUE)
            .try_set(QueryParam::ApiVersion, DEFAULT_API_VERSION_VALUE)
            .try_set(
                QueryParam::RandomNumber,
                rand::rng().random_range(0..100_000u32).to_string(),
            )
            .try_set(
                QueryParam::DatetimeOfRequest,
                Local::now().format(REQUEST_TIME_FORMAT).to_string(),
            )
            .try_set(QueryParam::SendImage, "0");

        let defaults = &mut state.default_track_me;
        for key in [
            QueryParam::VisitorId,
            QueryParam::UserId,
            QueryParam::ScreenResolution,
            QueryParam::UserAgent,
            QueryParam::Language,
        ] {
            track_me.try_set_opt(key.clone(), defaults.get(&key));
        }

        let url = resolve_url_path(
            &self.application_base_url,
            track_me.get(&QueryParam::UrlPath),
            defaults.get(&QueryParam::UrlPath),
        );
        if let Some(url) = url {
            // Later bags without a path are attributed to this one
            defaults.set(QueryParam::UrlPath, url.clone());
            track_me.set(QueryParam::UrlPath, url);
        }
    }

    /// Forget the current visitor: new visitor id, fresh visit counters and a
    /// new session. Queued events are dispatched first.
    pub fn reset(&self) {
        self.dispatch();

        let visitor_id = make_random_visitor_id();
        {
            let prefs = &self.preferences;
            let _guard = prefs.lock();
            prefs.remove(PREF_KEY_VISIT_COUNT);
            prefs.remove(PREF_KEY_PREVIOUS_VISIT);
            prefs.remove(PREF_KEY_FIRST_VISIT);
            prefs.remove(PREF_KEY_USER_ID);
            prefs.remove(PREF_KEY_OPT_OUT);
            prefs.put_string(PREF_KEY_VISITOR_ID, &visitor_id);
        }
        self.opt_out.store(false, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        let defaults = &mut state.default_track_me;
        defaults
            .set(QueryParam::VisitorId, visitor_id.clone())
            .remove(&QueryParam::UserId)
            .remove(&QueryParam::FirstVisitTimestamp)
            .remove(&QueryParam::TotalNumberOfVisits)
            .remove(&QueryParam::PreviousVisitTimestamp)
            .remove(&QueryParam::VisitScopeCustomVariables)
            .remove(&QueryParam::CampaignName)
            .remove(&QueryParam::CampaignKeyword);
        state.session_start = None;

        tracing::info!(visitor_id = %visitor_id, tracker = %self.name, "Tracker reset");
    }

    /// Stop (or resume) tracking. Persisted; opting out discards queued events.
    pub fn set_opt_out(&self, opt_out: bool) {
        self.opt_out.store(opt_out, Ordering::SeqCst);
        self.preferences.put_bool(PREF_KEY_OPT_OUT, opt_out);
        self.dispatcher.clear();
    }

    pub fn is_opt_out(&self) -> bool {
        self.opt_out.load(Ordering::SeqCst)
    }

    /// Dispatch queued events in the background
    pub fn dispatch(&self) {
        if self.is_opt_out() {
            return;
        }
        self.dispatcher.force_dispatch();
    }

    /// Dispatch queued events and wait until the worker is done
    pub fn dispatch_blocking(&self) {
        if self.is_opt_out() {
            return;
        }
        self.dispatcher.force_dispatch_blocking();
    }

    /// The next tracked event starts a new session
    pub fn start_new_session(&self) {
        self.state.lock().unwrap().session_start = None;
    }

    pub fn set_session_timeout_ms(&self, timeout_ms: u64) {
        self.state.lock().unwrap().session_timeout = Duration::from_millis(timeout_ms);
    }

    pub fn session_timeout_ms(&self) -> u64 {
        self.state.lock().unwrap().session_timeout.as_millis() as u64
    }

    /// `None` removes the user id
    pub fn set_user_id(&self, user_id: Option<&str>) {
        let user_id = user_id.filter(|id| !id.is_empty());
        self.state
            .lock()
            .unwrap()
            .default_track_me
            .set_opt(QueryParam::UserId, user_id.map(str::to_string));
        match user_id {
            Some(id) => self.preferences.put_string(PREF_KEY_USER_ID, id),
            None => self.preferences.remove(PREF_KEY_USER_ID),
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .default_track_me
            .get(&QueryParam::UserId)
            .map(str::to_string)
    }

    /// Replace the visitor id; it must be 16 lowercase hex characters
    pub fn set_visitor_id(&self, visitor_id: &str) -> Result<()> {
        if !is_valid_visitor_id(visitor_id) {
            return Err(Error::InvalidVisitorId(visitor_id.to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .default_track_me
            .set(QueryParam::VisitorId, visitor_id);
        self.preferences.put_string(PREF_KEY_VISITOR_ID, visitor_id);
        Ok(())
    }

    pub fn visitor_id(&self) -> String {
        self.state
            .lock()
            .unwrap()
            .default_track_me
            .get(&QueryParam::VisitorId)
            .unwrap_or_default()
            .to_string()
    }

    /// Register a callback; runs in registration order
    pub fn add_tracking_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(TrackMe) -> Option<TrackMe> + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks.write().unwrap().push((id, Box::new(callback)));
        id
    }

    /// Returns false if the callback was not registered
    pub fn remove_tracking_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap();
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != id);
        callbacks.len() != before
    }

    /// See [`Dispatcher::set_dispatch_interval`]
    pub fn set_dispatch_interval_ms(&self, interval_ms: i64) {
        self.dispatcher.set_dispatch_interval(interval_ms);
    }

    pub fn dispatch_interval_ms(&self) -> i64 {
        self.dispatcher.dispatch_interval_ms()
    }

    pub fn set_dispatch_gzipped(&self, gzip: bool) {
        self.dispatcher.set_dispatch_gzipped(gzip);
    }

    pub fn dispatch_gzipped(&self) -> bool {
        self.dispatcher.dispatch_gzipped()
    }

    /// Connect/read timeout of one transmission
    pub fn set_dispatch_timeout_ms(&self, timeout_ms: u64) {
        self.dispatcher.set_connection_timeout_ms(timeout_ms);
    }

    pub fn dispatch_timeout_ms(&self) -> u64 {
        self.dispatcher.connection_timeout_ms()
    }

    /// [`DispatchMode::Exception`] applies immediately but is never persisted
    pub fn set_dispatch_mode(&self, mode: DispatchMode) {
        if mode.is_persistent() {
            self.preferences
                .put_string(PREF_KEY_DISPATCH_MODE, mode.as_str());
        }
        self.dispatcher.set_dispatch_mode(mode);
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.dispatcher.dispatch_mode()
    }

    /// Maximum age of offline events: >0 ms, 0 unlimited, negative disables
    /// the offline cache
    pub fn set_offline_cache_age_ms(&self, max_age_ms: i64) {
        self.preferences
            .put_i64(PREF_KEY_OFFLINE_CACHE_AGE, max_age_ms);
        self.dispatcher
            .cache()
            .set_limits(max_age_ms, self.offline_cache_size());
    }

    pub fn offline_cache_age_ms(&self) -> i64 {
        self.preferences
            .get_i64(PREF_KEY_OFFLINE_CACHE_AGE)
            .unwrap_or(DEFAULT_OFFLINE_CACHE_AGE_MS)
    }

    /// Maximum size of the offline cache in bytes, 0 unlimited
    pub fn set_offline_cache_size(&self, max_size: i64) {
        self.preferences
            .put_i64(PREF_KEY_OFFLINE_CACHE_SIZE, max_size);
        self.dispatcher
            .cache()
            .set_limits(self.offline_cache_age_ms(), max_size);
    }

    pub fn offline_cache_size(&self) -> i64 {
        self.preferences
            .get_i64(PREF_KEY_OFFLINE_CACHE_SIZE)
            .unwrap_or(DEFAULT_OFFLINE_CACHE_SIZE)
    }

    /// Capture packets in `target` instead of sending them; `None` to send again
    pub fn set_dry_run_target(&self, target: Option<DryRunSink>) {
        self.dispatcher.set_dry_run_target(target);
    }

    pub fn dry_run_target(&self) -> Option<DryRunSink> {
        self.dispatcher.dry_run_target()
    }

    /// Called on the dispatcher thread for every failed transmission
    pub fn set_failure_callback(&self, callback: Option<FailureCallback>) {
        self.dispatcher.set_failure_callback(callback);
    }

    /// The last bag that passed the callbacks
    pub fn last_event(&self) -> Option<TrackMe> {
        self.state.lock().unwrap().last_event.clone()
    }

    /// Snapshot of the parameters injected into every bag
    pub fn default_track_me(&self) -> TrackMe {
        self.state.lock().unwrap().default_track_me.clone()
    }

    /// Events waiting in memory and on disk
    pub fn pending_events(&self) -> usize {
        let cache = self.dispatcher.cache();
        cache.memory_len() + cache.disk_len()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn site_id(&self) -> u32 {
        self.site_id
    }

    pub fn application_base_url(&self) -> &str {
        &self.application_base_url
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    fn apply_config(&self, config: &Config) {
        let dispatch = &config.dispatch;
        self.dispatcher.set_max_drain(dispatch.max_drain);
        self.set_dispatch_gzipped(dispatch.gzip);
        self.set_dispatch_timeout_ms(dispatch.timeout_ms);
        if let Some(mode) = dispatch.mode {
            self.set_dispatch_mode(mode);
        }
        self.set_session_timeout_ms(config.session.timeout_ms);
        if let Some(max_age_ms) = config.cache.max_age_ms {
            self.set_offline_cache_age_ms(max_age_ms);
        }
        if let Some(max_size) = config.cache.max_size_bytes {
            self.set_offline_cache_size(max_size);
        }
        self.set_dispatch_interval_ms(dispatch.interval_ms);
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("site_id", &self.site_id)
            .finish()
    }
}
