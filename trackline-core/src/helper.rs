//! Builders for the common kinds of tracking requests.
//!
//! ```rust,no_run
//! # use trackline_core::{helper::{TrackHelper, TrackRequest}, Tracker};
//! # fn demo(tracker: &Tracker) -> trackline_core::Result<()> {
//! TrackHelper::track()
//!     .screen("/settings/billing")
//!     .title("Billing")
//!     .with(tracker)?;
//!
//! TrackHelper::track()
//!     .event("player", "play")
//!     .name("intro.mp4")
//!     .value(1.0)
//!     .with(tracker)?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Trackline;
use crate::error::{Error, Result};
use crate::query::{QueryParam, TrackMe};
use crate::store::Preferences;
use crate::tracker::Tracker;

/// Collector limit for custom dimension values
pub const MAX_DIMENSION_LENGTH: usize = 255;

/// Event category used for exceptions
pub const EXCEPTION_CATEGORY: &str = "Exception";

/// Collector limit for custom variable names and values
pub const MAX_CUSTOM_VARIABLE_LENGTH: usize = 200;

/// Collector limit for the installer reported with a download
const MAX_INSTALLER_LENGTH: usize = 200;

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Set `dimension<id>` on a bag. Ids start at 1; values are cut to 255
/// characters and `None` removes the dimension. Returns false for id 0.
pub fn set_dimension(track_me: &mut TrackMe, id: u32, value: Option<&str>) -> bool {
    if id < 1 {
        tracing::warn!(id, "Custom dimension ids start at 1");
        return false;
    }
    let value = value.map(|v| {
        if v.chars().count() > MAX_DIMENSION_LENGTH {
            tracing::warn!(id, "Custom dimension value too long, truncating");
            v.chars().take(MAX_DIMENSION_LENGTH).collect()
        } else {
            v.to_string()
        }
    });
    track_me.set_opt(QueryParam::dimension(id), value);
    true
}

/// Name/value pairs sent as `_cvar` (visit scope) or `cvar` (screen scope).
///
/// Encoded as `{"1":["name","value"]}`. Collectors track five slots per
/// scope by default but can be configured for more, so only index 0 is
/// rejected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomVariables {
    vars: BTreeMap<u32, (String, String)>,
}

impl CustomVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a previously encoded set
    pub fn from_json(json: &str) -> Result<Self> {
        let vars: BTreeMap<u32, (String, String)> = serde_json::from_str(json)?;
        if vars.contains_key(&0) {
            return Err(Error::InvalidArgument(
                "custom variable indexes start at 1".to_string(),
            ));
        }
        Ok(Self { vars })
    }

    /// Store a pair at `index`, replacing whatever was there. Names and values
    /// are cut to 200 characters. Returns false for index 0.
    pub fn put(&mut self, index: u32, name: &str, value: &str) -> bool {
        if index < 1 {
            tracing::warn!(index, "Custom variable indexes start at 1");
            return false;
        }
        if name.chars().count() > MAX_CUSTOM_VARIABLE_LENGTH {
            tracing::warn!(index, "Custom variable name too long, truncating");
        }
        if value.chars().count() > MAX_CUSTOM_VARIABLE_LENGTH {
            tracing::warn!(index, "Custom variable value too long, truncating");
        }
        self.vars.insert(
            index,
            (
                truncate(name, MAX_CUSTOM_VARIABLE_LENGTH),
                truncate(value, MAX_CUSTOM_VARIABLE_LENGTH),
            ),
        );
        true
    }

    /// Chaining form of [`CustomVariables::put`]
    pub fn with(mut self, index: u32, name: &str, value: &str) -> Self {
        self.put(index, name, value);
        self
    }

    pub fn get(&self, index: u32) -> Option<(&str, &str)> {
        self.vars
            .get(&index)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `None` when empty
    pub fn to_json(&self) -> Option<String> {
        if self.vars.is_empty() {
            return None;
        }
        serde_json::to_string(&self.vars).ok()
    }

    /// Set `_cvar`; an empty set removes it
    pub fn inject_visit_variables(&self, track_me: &mut TrackMe) {
        track_me.set_opt(QueryParam::VisitScopeCustomVariables, self.to_json());
    }

    /// Set `cvar`; an empty set removes it
    pub fn inject_screen_variables(&self, track_me: &mut TrackMe) {
        track_me.set_opt(QueryParam::ScreenScopeCustomVariables, self.to_json());
    }
}

/// Reports the application's own download, once per version.
///
/// The "already reported" flag lives in the context's base preferences, so it
/// is shared by every tracker of the application and survives restarts.
pub struct DownloadTracker {
    application_id: String,
    version: String,
    installer: Option<String>,
    preferences: Arc<Preferences>,
}

impl DownloadTracker {
    pub fn new(context: &Trackline, version: impl Into<String>) -> Self {
        Self {
            application_id: context.application_id().to_string(),
            version: version.into(),
            installer: None,
            preferences: context.base_preferences(),
        }
    }

    /// Who installed the application, reported as the referrer
    pub fn installer(mut self, installer: impl Into<String>) -> Self {
        self.installer = Some(installer.into());
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn fired_key(&self) -> String {
        format!("downloaded:{}:{}", self.application_id, self.version)
    }

    /// Whether this version's download has been reported already
    pub fn is_tracked(&self) -> bool {
        self.preferences.get_bool(&self.fired_key()).unwrap_or(false)
    }

    /// Track unless already tracked for this version; true if it was sent
    pub fn track_once(&self, tracker: &Tracker, base: TrackMe, extra: Option<&str>) -> bool {
        {
            let _guard = self.preferences.lock();
            let key = self.fired_key();
            if self.preferences.get_bool(&key).unwrap_or(false) {
                tracing::debug!(version = %self.version, "Download already tracked");
                return false;
            }
            self.preferences.put_bool(&key, true);
        }
        self.track_new_download(tracker, base, extra);
        true
    }

    /// Track regardless of earlier reports. `extra` is appended to the
    /// download URL, e.g. a build checksum.
    pub fn track_new_download(&self, tracker: &Tracker, mut base: TrackMe, extra: Option<&str>) {
        let mut download = format!("http://{}:{}", self.application_id, self.version);
        if let Some(extra) = extra {
            download.push('/');
            download.push_str(extra);
        }
        let referrer = self
            .installer
            .as_deref()
            .map(|installer| format!("http://{}", truncate(installer, MAX_INSTALLER_LENGTH)));

        base.set(QueryParam::EventCategory, "Application")
            .set(QueryParam::EventAction, "downloaded")
            .set(QueryParam::ActionName, "application/downloaded")
            .set(QueryParam::UrlPath, "/application/downloaded")
            .set(QueryParam::Download, download)
            .set_opt(QueryParam::Referrer, referrer);
        tracing::debug!(version = %self.version, "Tracking application download");
        tracker.track(base);
    }
}

/// A complete tracking request
pub trait TrackRequest {
    fn build(&self) -> Result<TrackMe>;

    /// Build and hand the bag to `tracker`
    fn with(&self, tracker: &Tracker) -> Result<()> {
        tracker.track(self.build()?);
        Ok(())
    }
}

/// Entry point; every request starts from the helper's base bag
#[derive(Debug, Clone, Default)]
pub struct TrackHelper {
    base: TrackMe,
}

impl TrackHelper {
    pub fn track() -> Self {
        Self::default()
    }

    /// Start from `base` instead of an empty bag
    pub fn track_with(base: TrackMe) -> Self {
        Self { base }
    }

    /// Custom dimension carried by whatever request is built next
    pub fn dimension(mut self, id: u32, value: &str) -> Self {
        set_dimension(&mut self.base, id, Some(value));
        self
    }

    /// Visit-scope custom variables carried by whatever request is built next
    pub fn visit_variables(mut self, variables: &CustomVariables) -> Self {
        variables.inject_visit_variables(&mut self.base);
        self
    }

    /// Screen view for `path`, absolute or relative to the application base URL
    pub fn screen(self, path: impl Into<String>) -> Screen {
        Screen {
            base: self.base,
            path: path.into(),
            title: None,
            campaign: None,
            variables: CustomVariables::new(),
        }
    }

    /// Download of the application itself, once per version unless forced
    pub fn download(self, download_tracker: &DownloadTracker) -> Download<'_> {
        Download {
            base: self.base,
            download_tracker,
            extra: None,
            forced: false,
        }
    }

    /// Custom event, e.g. category `player` and action `play`
    pub fn event(self, category: impl Into<String>, action: impl Into<String>) -> EventBuilder {
        EventBuilder {
            base: self.base,
            category: category.into(),
            action: action.into(),
            path: None,
            name: None,
            value: None,
        }
    }

    /// Caught or uncaught error; `origin` names where it happened, e.g. `src/io.rs:42`
    pub fn exception(self, origin: impl Into<String>) -> ExceptionBuilder {
        ExceptionBuilder {
            base: self.base,
            origin: origin.into(),
            description: None,
            fatal: false,
        }
    }

    /// Manual conversion of the goal with id `goal_id`
    pub fn goal(self, goal_id: u32) -> Goal {
        Goal {
            base: self.base,
            goal_id,
            revenue: None,
        }
    }

    /// Click on an external link
    pub fn outlink(self, url: impl Into<String>) -> Outlink {
        Outlink {
            base: self.base,
            url: url.into(),
        }
    }

    /// Site search for `keyword`
    pub fn search(self, keyword: impl Into<String>) -> Search {
        Search {
            base: self.base,
            keyword: keyword.into(),
            category: None,
            count: None,
        }
    }

    /// Content block that was shown
    pub fn impression(self, content_name: impl Into<String>) -> ContentImpression {
        ContentImpression {
            base: self.base,
            name: content_name.into(),
            piece: None,
            target: None,
        }
    }

    /// Interaction with a content block, e.g. `click`
    pub fn interaction(
        self,
        content_name: impl Into<String>,
        interaction: impl Into<String>,
    ) -> ContentInteraction {
        ContentInteraction {
            impression: self.impression(content_name),
            interaction: interaction.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Screen {
    base: TrackMe,
    path: String,
    title: Option<String>,
    campaign: Option<(String, Option<String>)>,
    variables: CustomVariables,
}

impl Screen {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Campaign that brought the user here
    pub fn campaign(mut self, name: impl Into<String>, keyword: Option<String>) -> Self {
        self.campaign = Some((name.into(), keyword));
        self
    }

    /// Screen-scope custom variable
    pub fn variable(mut self, index: u32, name: &str, value: &str) -> Self {
        self.variables.put(index, name, value);
        self
    }
}

impl TrackRequest for Screen {
    fn build(&self) -> Result<TrackMe> {
        if self.path.is_empty() {
            return Err(Error::InvalidArgument(
                "screen tracking requires a non-empty path".to_string(),
            ));
        }
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::UrlPath, self.path.clone())
            .set_opt(QueryParam::ActionName, self.title.clone());
        if let Some((name, keyword)) = &self.campaign {
            track_me
                .set(QueryParam::CampaignName, name.clone())
                .set_opt(QueryParam::CampaignKeyword, keyword.clone());
        }
        if !self.variables.is_empty() {
            self.variables.inject_screen_variables(&mut track_me);
        }
        Ok(track_me)
    }
}

pub struct Download<'a> {
    base: TrackMe,
    download_tracker: &'a DownloadTracker,
    extra: Option<String>,
    forced: bool,
}

impl Download<'_> {
    /// Appended to the download URL, e.g. `com.example.app:1.2.0/<checksum>`
    pub fn identifier(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Track even if this version was reported before
    pub fn force(mut self) -> Self {
        self.forced = true;
        self
    }

    /// Returns false if the download was already tracked and not forced
    pub fn with(self, tracker: &Tracker) -> bool {
        let extra = self.extra.as_deref();
        if self.forced {
            self.download_tracker
                .track_new_download(tracker, self.base, extra);
            return true;
        }
        self.download_tracker.track_once(tracker, self.base, extra)
    }
}

#[derive(Debug, Clone)]
pub struct EventBuilder {
    base: TrackMe,
    category: String,
    action: String,
    path: Option<String>,
    name: Option<String>,
    value: Option<f32>,
}

impl EventBuilder {
    /// Where the event happened; defaults to the last tracked URL
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(mut self, value: f32) -> Self {
        self.value = Some(value);
        self
    }
}

impl TrackRequest for EventBuilder {
    fn build(&self) -> Result<TrackMe> {
        if self.category.is_empty() || self.action.is_empty() {
            return Err(Error::InvalidArgument(
                "events require a category and an action".to_string(),
            ));
        }
        let mut track_me = self.base.clone();
        track_me
            .set_opt(QueryParam::UrlPath, self.path.clone())
            .set(QueryParam::EventCategory, self.category.clone())
            .set(QueryParam::EventAction, self.action.clone())
            .set_opt(QueryParam::EventName, self.name.clone())
            .set_opt(QueryParam::EventValue, self.value.map(|v| v.to_string()));
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionBuilder {
    base: TrackMe,
    origin: String,
    description: Option<String>,
    fatal: bool,
}

impl ExceptionBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }
}

impl TrackRequest for ExceptionBuilder {
    fn build(&self) -> Result<TrackMe> {
        let description = self.description.clone().unwrap_or_default();
        let action_name = format!(
            "exception/{}{}/{}",
            if self.fatal { "fatal/" } else { "" },
            self.origin,
            description
        );
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::ActionName, action_name)
            .set(QueryParam::EventCategory, EXCEPTION_CATEGORY)
            .set(QueryParam::EventAction, self.origin.clone())
            .set(QueryParam::EventName, description)
            .set(QueryParam::EventValue, if self.fatal { "1" } else { "0" });
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct Goal {
    base: TrackMe,
    goal_id: u32,
    revenue: Option<f32>,
}

impl Goal {
    /// Monetary value generated by this conversion
    pub fn revenue(mut self, revenue: f32) -> Self {
        self.revenue = Some(revenue);
        self
    }
}

impl TrackRequest for Goal {
    fn build(&self) -> Result<TrackMe> {
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::GoalId, self.goal_id.to_string())
            .set_opt(QueryParam::Revenue, self.revenue.map(|r| r.to_string()));
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct Outlink {
    base: TrackMe,
    url: String,
}

impl TrackRequest for Outlink {
    fn build(&self) -> Result<TrackMe> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::InvalidArgument(format!("invalid outlink {:?}: {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https" | "ftp") {
            return Err(Error::InvalidArgument(format!(
                "only http, https and ftp outlinks are supported, got {:?}",
                parsed.scheme()
            )));
        }
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::Link, self.url.clone())
            .set(QueryParam::UrlPath, self.url.clone());
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct Search {
    base: TrackMe,
    keyword: String,
    category: Option<String>,
    count: Option<u32>,
}

impl Search {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Number of results shown
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

impl TrackRequest for Search {
    fn build(&self) -> Result<TrackMe> {
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::SearchKeyword, self.keyword.clone())
            .set_opt(QueryParam::SearchCategory, self.category.clone())
            .set_opt(
                QueryParam::SearchNumberOfHits,
                self.count.map(|c| c.to_string()),
            );
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct ContentImpression {
    base: TrackMe,
    name: String,
    piece: Option<String>,
    target: Option<String>,
}

impl ContentImpression {
    /// The shown piece, e.g. an image path
    pub fn piece(mut self, piece: impl Into<String>) -> Self {
        self.piece = Some(piece.into());
        self
    }

    /// Where the content leads, e.g. a URL
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl TrackRequest for ContentImpression {
    fn build(&self) -> Result<TrackMe> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument(
                "content tracking requires a non-empty content name".to_string(),
            ));
        }
        let mut track_me = self.base.clone();
        track_me
            .set(QueryParam::ContentName, self.name.clone())
            .set_opt(QueryParam::ContentPiece, self.piece.clone())
            .set_opt(QueryParam::ContentTarget, self.target.clone());
        Ok(track_me)
    }
}

#[derive(Debug, Clone)]
pub struct ContentInteraction {
    impression: ContentImpression,
    interaction: String,
}

impl ContentInteraction {
    pub fn piece(mut self, piece: impl Into<String>) -> Self {
        self.impression = self.impression.piece(piece);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.impression = self.impression.target(target);
        self
    }
}

impl TrackRequest for ContentInteraction {
    fn build(&self) -> Result<TrackMe> {
        if self.interaction.is_empty() {
            return Err(Error::InvalidArgument(
                "content interactions require a non-empty interaction".to_string(),
            ));
        }
        let mut track_me = self.impression.build()?;
        track_me.set(QueryParam::ContentInteraction, self.interaction.clone());
        Ok(track_me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Trackline;
    use crate::dispatch::{Packet, PacketSender, SendOptions};
    use crate::tracker::TrackerBuilder;
    use std::sync::Arc;

    struct NullSender;

    impl PacketSender for NullSender {
        fn send(&self, _packet: &Packet, _options: &SendOptions) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_screen() {
        let track_me = TrackHelper::track()
            .screen("/settings")
            .title("Settings")
            .campaign("newsletter", Some("spring".to_string()))
            .build()
            .unwrap();
        assert_eq!(track_me.get(&QueryParam::UrlPath), Some("/settings"));
        assert_eq!(track_me.get(&QueryParam::ActionName), Some("Settings"));
        assert_eq!(track_me.get(&QueryParam::CampaignName), Some("newsletter"));
        assert_eq!(track_me.get(&QueryParam::CampaignKeyword), Some("spring"));

        let empty = TrackHelper::track().screen("").build();
        assert!(matches!(empty, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_event() {
        let track_me = TrackHelper::track()
            .event("player", "play")
            .name("intro.mp4")
            .value(1.5)
            .build()
            .unwrap();
        assert_eq!(track_me.get(&QueryParam::EventCategory), Some("player"));
        assert_eq!(track_me.get(&QueryParam::EventAction), Some("play"));
        assert_eq!(track_me.get(&QueryParam::EventName), Some("intro.mp4"));
        assert_eq!(track_me.get(&QueryParam::EventValue), Some("1.5"));
        assert!(!track_me.has(&QueryParam::UrlPath));
    }

    #[test]
    fn test_exception() {
        let track_me = TrackHelper::track()
            .exception("src/io.rs:42")
            .description("disk full")
            .fatal(true)
            .build()
            .unwrap();
        assert_eq!(
            track_me.get(&QueryParam::ActionName),
            Some("exception/fatal/src/io.rs:42/disk full")
        );
        assert_eq!(track_me.get(&QueryParam::EventCategory), Some("Exception"));
        assert_eq!(track_me.get(&QueryParam::EventAction), Some("src/io.rs:42"));
        assert_eq!(track_me.get(&QueryParam::EventName), Some("disk full"));
        assert_eq!(track_me.get(&QueryParam::EventValue), Some("1"));

        let caught = TrackHelper::track()
            .exception("src/io.rs:7")
            .description("retrying")
            .build()
            .unwrap();
        assert_eq!(
            caught.get(&QueryParam::ActionName),
            Some("exception/src/io.rs:7/retrying")
        );
        assert_eq!(caught.get(&QueryParam::EventValue), Some("0"));
    }

    #[test]
    fn test_goal_and_search() {
        let goal = TrackHelper::track().goal(3).revenue(9.99).build().unwrap();
        assert_eq!(goal.get(&QueryParam::GoalId), Some("3"));
        assert_eq!(goal.get(&QueryParam::Revenue), Some("9.99"));

        let search = TrackHelper::track()
            .search("shoes")
            .category("catalog")
            .count(12)
            .build()
            .unwrap();
        assert_eq!(search.get(&QueryParam::SearchKeyword), Some("shoes"));
        assert_eq!(search.get(&QueryParam::SearchCategory), Some("catalog"));
        assert_eq!(search.get(&QueryParam::SearchNumberOfHits), Some("12"));
    }

    #[test]
    fn test_outlink() {
        let track_me = TrackHelper::track()
            .outlink("https://example.org/docs")
            .build()
            .unwrap();
        assert_eq!(track_me.get(&QueryParam::Link), Some("https://example.org/docs"));
        assert_eq!(track_me.get(&QueryParam::UrlPath), Some("https://example.org/docs"));

        assert!(TrackHelper::track().outlink("mailto:a@example.org").build().is_err());
        assert!(TrackHelper::track().outlink("not a url").build().is_err());
    }

    #[test]
    fn test_content() {
        let impression = TrackHelper::track()
            .impression("banner")
            .piece("/img/banner.png")
            .target("https://example.org/sale")
            .build()
            .unwrap();
        assert_eq!(impression.get(&QueryParam::ContentName), Some("banner"));
        assert_eq!(impression.get(&QueryParam::ContentPiece), Some("/img/banner.png"));
        assert!(!impression.has(&QueryParam::ContentInteraction));

        let interaction = TrackHelper::track()
            .interaction("banner", "click")
            .target("https://example.org/sale")
            .build()
            .unwrap();
        assert_eq!(interaction.get(&QueryParam::ContentInteraction), Some("click"));
        assert_eq!(
            interaction.get(&QueryParam::ContentTarget),
            Some("https://example.org/sale")
        );

        assert!(TrackHelper::track().impression("").build().is_err());
        assert!(TrackHelper::track().interaction("banner", "").build().is_err());
    }

    #[test]
    fn test_dimensions() {
        let track_me = TrackHelper::track()
            .dimension(1, "premium")
            .screen("/home")
            .build()
            .unwrap();
        assert_eq!(track_me.get(&QueryParam::dimension(1)), Some("premium"));

        let mut bag = TrackMe::new();
        assert!(!set_dimension(&mut bag, 0, Some("x")));
        assert!(bag.is_empty());

        let long = "x".repeat(300);
        assert!(set_dimension(&mut bag, 2, Some(&long)));
        assert_eq!(bag.get(&QueryParam::dimension(2)).unwrap().len(), 255);

        assert!(set_dimension(&mut bag, 2, None));
        assert!(!bag.has(&QueryParam::dimension(2)));
    }

    #[test]
    fn test_with_tracks_through_tracker() {
        let context = Trackline::in_memory("com.example.app");
        let tracker = TrackerBuilder::new("https://analytics.example.com/matomo.php", 1)
            .build_with_sender(&context, Arc::new(NullSender))
            .unwrap();
        tracker.set_dispatch_interval_ms(-1);

        TrackHelper::track()
            .screen("/about")
            .title("About")
            .with(&tracker)
            .unwrap();

        let event = tracker.last_event().unwrap();
        assert_eq!(event.get(&QueryParam::UrlPath), Some("https://com.example.app/about"));
        assert_eq!(event.get(&QueryParam::ActionName), Some("About"));
        assert_eq!(tracker.pending_events(), 1);
    }

    #[test]
    fn test_custom_variables_encoding() {
        let mut vars = CustomVariables::new();
        assert_eq!(vars.to_json(), None);
        assert!(vars.put(1, "OS", "linux"));
        assert!(vars.put(2, "Locale", "en::en"));
        assert!(!vars.put(0, "Level", "over9k"));
        assert_eq!(vars.len(), 2);
        assert_eq!(
            vars.to_json().unwrap(),
            r#"{"1":["OS","linux"],"2":["Locale","en::en"]}"#
        );

        vars.put(1, "OS", "macos");
        assert_eq!(vars.get(1), Some(("OS", "macos")));
        assert_eq!(vars.len(), 2);

        let parsed = CustomVariables::from_json(&vars.to_json().unwrap()).unwrap();
        assert_eq!(parsed, vars);
        assert!(CustomVariables::from_json(r#"{"0":["a","b"]}"#).is_err());
        assert!(CustomVariables::from_json(r#"{"1":["only-one"]}"#).is_err());
    }

    #[test]
    fn test_custom_variables_are_truncated() {
        let long = "é".repeat(250);
        let vars = CustomVariables::new().with(3, &long, &long);
        let (name, value) = vars.get(3).unwrap();
        assert_eq!(name.chars().count(), MAX_CUSTOM_VARIABLE_LENGTH);
        assert_eq!(value.chars().count(), MAX_CUSTOM_VARIABLE_LENGTH);
    }

    #[test]
    fn test_visit_and_screen_variables() {
        let visit = CustomVariables::new().with(1, "Plan", "premium");
        let track_me = TrackHelper::track()
            .visit_variables(&visit)
            .screen("/home")
            .variable(1, "Section", "dashboard")
            .build()
            .unwrap();
        assert_eq!(
            track_me.get(&QueryParam::VisitScopeCustomVariables),
            Some(r#"{"1":["Plan","premium"]}"#)
        );
        assert_eq!(
            track_me.get(&QueryParam::ScreenScopeCustomVariables),
            Some(r#"{"1":["Section","dashboard"]}"#)
        );

        let plain = TrackHelper::track().screen("/home").build().unwrap();
        assert!(!plain.has(&QueryParam::ScreenScopeCustomVariables));
        assert!(!plain.has(&QueryParam::VisitScopeCustomVariables));
    }

    #[test]
    fn test_download_is_tracked_once_per_version() {
        let context = Trackline::in_memory("com.example.app");
        let tracker = TrackerBuilder::new("https://analytics.example.com/matomo.php", 1)
            .build_with_sender(&context, Arc::new(NullSender))
            .unwrap();
        tracker.set_dispatch_interval_ms(-1);

        let downloads = DownloadTracker::new(&context, "1.2.0").installer("apt");
        assert!(!downloads.is_tracked());
        assert!(TrackHelper::track().download(&downloads).with(&tracker));
        assert!(downloads.is_tracked());

        let event = tracker.last_event().unwrap();
        assert_eq!(event.get(&QueryParam::EventCategory), Some("Application"));
        assert_eq!(event.get(&QueryParam::EventAction), Some("downloaded"));
        assert_eq!(event.get(&QueryParam::ActionName), Some("application/downloaded"));
        assert_eq!(
            event.get(&QueryParam::Download),
            Some("http://com.example.app:1.2.0")
        );
        assert_eq!(event.get(&QueryParam::Referrer), Some("http://apt"));
        assert_eq!(tracker.pending_events(), 1);

        // A fresh handle on the same context sees the persisted flag
        let again = DownloadTracker::new(&context, "1.2.0");
        assert!(!TrackHelper::track().download(&again).with(&tracker));
        assert_eq!(tracker.pending_events(), 1);

        assert!(TrackHelper::track()
            .download(&again)
            .identifier("abc123")
            .force()
            .with(&tracker));
        let forced = tracker.last_event().unwrap();
        assert_eq!(
            forced.get(&QueryParam::Download),
            Some("http://com.example.app:1.2.0/abc123")
        );
        assert!(!forced.has(&QueryParam::Referrer));

        let upgrade = DownloadTracker::new(&context, "1.3.0");
        assert!(TrackHelper::track().download(&upgrade).with(&tracker));
        assert_eq!(tracker.pending_events(), 3);
        assert_eq!(
            context.base_preferences().get_bool("downloaded:com.example.app:1.3.0"),
            Some(true)
        );
    }
}
