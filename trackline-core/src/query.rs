//! Parameter bags and the well-known collector API keys.
//!
//! A [`TrackMe`] is one trackable action before transmission. Keys are
//! [`QueryParam`]s; iteration follows the key order below, so an encoded bag
//! is deterministic.

use std::collections::BTreeMap;
use std::fmt;

/// Well-known tracking API parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryParam {
    /// The ID of the website we're tracking a visit/action for (required)
    SiteId,
    /// Required for tracking, must be set to one
    Record,
    /// The full URL for the current action (required)
    UrlPath,
    /// The title of the action being tracked
    ActionName,
    /// The unique visitor ID, 16 hex characters
    VisitorId,
    /// Random value generated before each request, prevents caching
    RandomNumber,
    /// API version, always 1
    ApiVersion,
    /// The full HTTP referrer URL
    Referrer,
    /// Visit scope custom variables (JSON encoded)
    VisitScopeCustomVariables,
    /// Current count of visits for this visitor
    TotalNumberOfVisits,
    /// UNIX timestamp (seconds) of this visitor's previous visit
    PreviousVisitTimestamp,
    /// UNIX timestamp (seconds) of this visitor's first visit
    FirstVisitTimestamp,
    CampaignName,
    CampaignKeyword,
    /// Resolution of the device, e.g. `1280x1024`
    ScreenResolution,
    Hours,
    Minutes,
    Seconds,
    UserAgent,
    /// Accept-Language override
    Language,
    UserId,
    /// Forces a new visit when set
    SessionStart,
    /// Screen scope custom variables (JSON encoded)
    ScreenScopeCustomVariables,
    /// An external URL the user clicked
    Link,
    /// URL of a file the user downloaded
    Download,
    SearchKeyword,
    SearchCategory,
    SearchNumberOfHits,
    GoalId,
    Revenue,
    /// Override for the datetime of the request
    DatetimeOfRequest,
    ContentName,
    ContentPiece,
    ContentTarget,
    ContentInteraction,
    EventCategory,
    EventAction,
    EventName,
    EventValue,
    EcommerceItems,
    Tax,
    OrderId,
    Shipping,
    Discount,
    Subtotal,
    /// `0` makes the collector answer 204 instead of a GIF
    SendImage,
    /// Any other parameter, e.g. `dimension3`
    Custom(String),
}

impl QueryParam {
    /// The key as it appears on the wire
    pub fn as_str(&self) -> &str {
        match self {
            QueryParam::SiteId => "idsite",
            QueryParam::Record => "rec",
            QueryParam::UrlPath => "url",
            QueryParam::ActionName => "action_name",
            QueryParam::VisitorId => "_id",
            QueryParam::RandomNumber => "rand",
            QueryParam::ApiVersion => "apiv",
            QueryParam::Referrer => "urlref",
            QueryParam::VisitScopeCustomVariables => "_cvar",
            QueryParam::TotalNumberOfVisits => "_idvc",
            QueryParam::PreviousVisitTimestamp => "_viewts",
            QueryParam::FirstVisitTimestamp => "_idts",
            QueryParam::CampaignName => "_rcn",
            QueryParam::CampaignKeyword => "_rck",
            QueryParam::ScreenResolution => "res",
            QueryParam::Hours => "h",
            QueryParam::Minutes => "m",
            QueryParam::Seconds => "s",
            QueryParam::UserAgent => "ua",
            QueryParam::Language => "lang",
            QueryParam::UserId => "uid",
            QueryParam::SessionStart => "new_visit",
            QueryParam::ScreenScopeCustomVariables => "cvar",
            QueryParam::Link => "link",
            QueryParam::Download => "download",
            QueryParam::SearchKeyword => "search",
            QueryParam::SearchCategory => "search_cat",
            QueryParam::SearchNumberOfHits => "search_count",
            QueryParam::GoalId => "idgoal",
            QueryParam::Revenue => "revenue",
            QueryParam::DatetimeOfRequest => "cdt",
            QueryParam::ContentName => "c_n",
            QueryParam::ContentPiece => "c_p",
            QueryParam::ContentTarget => "c_t",
            QueryParam::ContentInteraction => "c_i",
            QueryParam::EventCategory => "e_c",
            QueryParam::EventAction => "e_a",
            QueryParam::EventName => "e_n",
            QueryParam::EventValue => "e_v",
            QueryParam::EcommerceItems => "ec_items",
            QueryParam::Tax => "ec_tx",
            QueryParam::OrderId => "ec_id",
            QueryParam::Shipping => "ec_sh",
            QueryParam::Discount => "ec_dt",
            QueryParam::Subtotal => "ec_st",
            QueryParam::SendImage => "send_image",
            QueryParam::Custom(key) => key,
        }
    }

    /// Custom dimension key, `dimension<id>`
    pub fn dimension(id: u32) -> Self {
        QueryParam::Custom(format!("dimension{}", id))
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query to the collector: an ordered bag of parameters.
///
/// Empty values are never stored; setting one is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMe {
    params: BTreeMap<QueryParam, String>,
}

impl TrackMe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, overwriting any existing one
    pub fn set(&mut self, key: QueryParam, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.params.insert(key, value);
        }
        self
    }

    /// Set a value, or remove the key when `value` is `None`
    pub fn set_opt(&mut self, key: QueryParam, value: Option<String>) -> &mut Self {
        match value {
            Some(value) => self.set(key, value),
            None => self.remove(&key),
        }
    }

    /// Only sets the value if the key is absent
    pub fn try_set(&mut self, key: QueryParam, value: impl Into<String>) -> &mut Self {
        if !self.has(&key) {
            self.set(key, value);
        }
        self
    }

    /// `try_set` for optional values; `None` leaves the bag untouched
    pub fn try_set_opt(&mut self, key: QueryParam, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.try_set(key, value);
        }
        self
    }

    pub fn remove(&mut self, key: &QueryParam) -> &mut Self {
        self.params.remove(key);
        self
    }

    pub fn get(&self, key: &QueryParam) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &QueryParam) -> bool {
        self.params.contains_key(key)
    }

    /// Copies every parameter of `other` into this bag, overriding existing values
    pub fn put_all(&mut self, other: &TrackMe) -> &mut Self {
        for (key, value) in &other.params {
            self.params.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&QueryParam, &str)> {
        self.params.iter().map(|(k, v)| (k, v.as_str()))
    }
}

impl fmt::Display for TrackMe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}
