//! Event records: the encoded, immutable form of a parameter bag.

use crate::query::TrackMe;
use chrono::Utc;
use std::fmt;

/// One queued event.
///
/// `query` is the URL-encoded parameter bag including its leading `?`, so it
/// can be appended to the endpoint as-is or embedded in a bulk body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    timestamp: i64,
    query: String,
}

impl Event {
    /// Encode a bag, stamped with the current time
    pub fn from_track_me(track_me: &TrackMe) -> Self {
        Self::new(Utc::now().timestamp(), encode_query(track_me))
    }

    /// Restore a record, e.g. from the disk tier
    pub fn new(timestamp: i64, query: impl Into<String>) -> Self {
        Self {
            timestamp,
            query: query.into(),
        }
    }

    /// Submission time in seconds since the UNIX epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn encoded_query(&self) -> &str {
        &self.query
    }

    /// Bytes this record occupies in the disk tier (`"<ts> <query>\n"`)
    pub fn disk_size(&self) -> i64 {
        (self.timestamp.to_string().len() + 1 + self.query.len() + 1) as i64
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// `?k1=v1&k2=v2`, keys and values percent-encoded (spaces as `%20`)
fn encode_query(track_me: &TrackMe) -> String {
    let mut query = String::with_capacity(128);
    for (key, value) in track_me.iter() {
        query.push(if query.is_empty() { '?' } else { '&' });
        query.push_str(&urlencoding::encode(key.as_str()));
        query.push('=');
        query.push_str(&urlencoding::encode(value));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParam;

    #[test]
    fn test_encodes_in_key_order() {
        let mut track_me = TrackMe::new();
        track_me
            .set(QueryParam::ActionName, "Hello World")
            .set(QueryParam::SiteId, "1")
            .set(QueryParam::UrlPath, "https://example.com/a?b=c");

        let event = Event::from_track_me(&track_me);
        assert_eq!(
            event.encoded_query(),
            "?idsite=1&url=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc&action_name=Hello%20World"
        );
        assert!(event.timestamp() > 0);
    }

    #[test]
    fn test_empty_bag_encodes_to_empty_query() {
        let event = Event::from_track_me(&TrackMe::new());
        assert_eq!(event.encoded_query(), "");
    }

    #[test]
    fn test_disk_size_matches_line_format() {
        let event = Event::new(1_700_000_000, "?a=b");
        assert_eq!(event.disk_size(), "1700000000 ?a=b\n".len() as i64);
    }
}
