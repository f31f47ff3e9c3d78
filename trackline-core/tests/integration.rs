//! Integration tests for the tracking pipeline
//!
//! Trackers run against in-memory or temporary SQLite stores. Packets are
//! captured with a dry-run sink or a scripted sender, never sent over the
//! network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use trackline_core::dispatch::{Packet, PacketSender, SendOptions};
use trackline_core::store::tracker_namespace;
use trackline_core::tracker::{PREF_KEY_FIRST_VISIT, PREF_KEY_VISIT_COUNT};
use trackline_core::{
    DispatchMode, DryRunSink, Error, KeyValueStore, LinkType, ManualConnectivity, QueryParam,
    SqliteStore, TrackMe, Tracker, TrackerBuilder, Trackline,
};

const API_URL: &str = "https://analytics.example.com/matomo.php";

/// Records delivered packets and fails the calls listed in `fail_on` (0-based)
#[derive(Default)]
struct ScriptedSender {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    delivered: Mutex<Vec<Packet>>,
}

impl PacketSender for ScriptedSender {
    fn send(&self, packet: &Packet, _options: &SendOptions) -> trackline_core::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(Error::Transmission(format!("HTTP 503 on call {}", call)));
        }
        self.delivered.lock().unwrap().push(packet.clone());
        Ok(())
    }
}

fn build_tracker(context: &Trackline, sender: Arc<ScriptedSender>) -> Tracker {
    trackline_core::logging::init_test();
    let tracker = TrackerBuilder::new(API_URL, 1)
        .application_base_url("https://app.example.com")
        .build_with_sender(context, sender)
        .expect("tracker should build");
    tracker.set_dispatch_interval_ms(-1);
    tracker
}

fn dry_run(tracker: &Tracker) -> DryRunSink {
    let sink: DryRunSink = Arc::new(Mutex::new(Vec::new()));
    tracker.set_dry_run_target(Some(sink.clone()));
    sink
}

fn action(name: impl Into<String>) -> TrackMe {
    let mut track_me = TrackMe::new();
    track_me.set(QueryParam::ActionName, name);
    track_me
}

/// Every encoded event in the packets, in transmission order
fn queries(packets: &[Packet]) -> Vec<String> {
    packets
        .iter()
        .flat_map(|packet| match packet.post_body() {
            Some(body) => body.requests.clone(),
            None => vec![packet.target_url()[API_URL.len()..].to_string()],
        })
        .collect()
}

/// Value of `key` in an encoded query
fn param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// ============================================
// Session handling
// ============================================

#[test]
fn test_concurrent_tracks_carry_one_session_start() {
    let context = Trackline::in_memory("com.example.app");
    let tracker = Arc::new(build_tracker(&context, Arc::new(ScriptedSender::default())));
    let sink = dry_run(&tracker);

    let handles: Vec<_> = (0..20)
        .map(|t| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    tracker.track(action(format!("t{}-{}", t, i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    tracker.dispatch_blocking();

    let sent = queries(&sink.lock().unwrap());
    assert_eq!(sent.len(), 200);
    let session_starts = sent
        .iter()
        .filter(|q| param(q, "new_visit") == Some("1"))
        .count();
    assert_eq!(session_starts, 1);
    assert_eq!(
        context
            .tracker_preferences(tracker.name())
            .get_i64(PREF_KEY_VISIT_COUNT),
        Some(1)
    );
}

#[test]
fn test_reset_starts_a_new_visitor() {
    let context = Trackline::in_memory("com.example.app");
    context
        .store()
        .put(
            &tracker_namespace("Default Tracker"),
            PREF_KEY_FIRST_VISIT,
            "1000",
        )
        .unwrap();
    let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));

    tracker.track(action("first"));
    tracker.start_new_session();
    tracker.track(action("second"));
    let before = tracker.last_event().unwrap();
    assert_eq!(before.get(&QueryParam::FirstVisitTimestamp), Some("1000"));
    assert_eq!(before.get(&QueryParam::TotalNumberOfVisits), Some("2"));

    tracker.track(action("mid-session"));
    assert!(!tracker.last_event().unwrap().has(&QueryParam::SessionStart));

    let old_visitor = tracker.visitor_id();
    tracker.reset();
    tracker.track(action("after reset"));

    let after = tracker.last_event().unwrap();
    assert_eq!(after.get(&QueryParam::SessionStart), Some("1"));
    assert_ne!(after.get(&QueryParam::VisitorId), Some(old_visitor.as_str()));
    assert_eq!(after.get(&QueryParam::VisitorId), Some(tracker.visitor_id().as_str()));
    assert_ne!(after.get(&QueryParam::FirstVisitTimestamp), Some("1000"));
    assert_eq!(after.get(&QueryParam::TotalNumberOfVisits), Some("1"));
    assert!(!after.has(&QueryParam::PreviousVisitTimestamp));
}

// ============================================
// Identity and settings
// ============================================

#[test]
fn test_visitor_id_survives_restart_and_rejects_bad_input() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store_path = temp_dir.path().join("preferences.db");

    let visitor_id = {
        let context = Trackline::new(
            "com.example.app",
            Arc::new(SqliteStore::open(&store_path).unwrap()),
        );
        build_tracker(&context, Arc::new(ScriptedSender::default())).visitor_id()
    };

    let context = Trackline::new(
        "com.example.app",
        Arc::new(SqliteStore::open(&store_path).unwrap()),
    );
    let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));
    assert_eq!(tracker.visitor_id(), visitor_id);

    for bad in ["", "0123456789ABCDEF", "0123456789abcde", "0123456789abcdef0", "z123456789abcdef"] {
        let result = tracker.set_visitor_id(bad);
        assert!(matches!(result, Err(Error::InvalidVisitorId(_))), "{:?} accepted", bad);
        assert_eq!(tracker.visitor_id(), visitor_id);
    }

    tracker.set_visitor_id(&visitor_id).unwrap();
    assert_eq!(tracker.visitor_id(), visitor_id);
}

#[test]
fn test_offline_cache_limits_default_and_echo() {
    let context = Trackline::in_memory("com.example.app");
    let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));

    assert_eq!(tracker.offline_cache_age_ms(), 86_400_000);
    assert_eq!(tracker.offline_cache_size(), 4_194_304);

    tracker.set_offline_cache_age_ms(0);
    tracker.set_offline_cache_size(1024);
    assert_eq!(tracker.offline_cache_age_ms(), 0);
    assert_eq!(tracker.offline_cache_size(), 1024);

    tracker.set_offline_cache_age_ms(-1);
    assert_eq!(tracker.offline_cache_age_ms(), -1);
}

// ============================================
// Dispatching
// ============================================

#[test]
fn test_manual_interval_sends_only_when_forced() {
    let context = Trackline::in_memory("com.example.app");
    let sender = Arc::new(ScriptedSender::default());
    let tracker = build_tracker(&context, sender.clone());

    for i in 0..5 {
        tracker.track(action(format!("e{}", i)));
    }
    thread::sleep(Duration::from_millis(200));
    assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.pending_events(), 5);

    tracker.dispatch();
    assert!(wait_for(|| tracker.pending_events() == 0));
    assert_eq!(queries(&sender.delivered.lock().unwrap()).len(), 5);
}

#[test]
fn test_packets_are_pages_in_submission_order() {
    let context = Trackline::in_memory("com.example.app");
    let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));
    let sink = dry_run(&tracker);

    for i in 0..45 {
        tracker.track(action(format!("e{}", i)));
    }
    tracker.dispatch_blocking();

    let packets = sink.lock().unwrap().clone();
    // ceil(45 / 20)
    assert_eq!(packets.len(), 3);
    let sizes: Vec<usize> = packets.iter().map(|p| p.event_count()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    assert!(packets.iter().all(|p| p.post_body().is_some()));

    let names: Vec<String> = queries(&packets)
        .iter()
        .map(|q| param(q, "action_name").unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..45).map(|i| format!("e{}", i)).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_failed_packet_requeues_the_rest_in_order() {
    let context = Trackline::in_memory("com.example.app");
    let sender = Arc::new(ScriptedSender {
        fail_on: vec![1],
        ..Default::default()
    });
    let tracker = build_tracker(&context, sender.clone());
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    tracker.set_failure_callback(Some(Arc::new(move |_: &Error| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    for i in 0..45 {
        tracker.track(action(format!("e{}", i)));
    }
    tracker.dispatch_blocking();

    assert_eq!(sender.calls.load(Ordering::SeqCst), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.pending_events(), 25);
    assert_eq!(tracker.dispatch_stats().events_dispatched, 20);

    tracker.dispatch_blocking();
    assert_eq!(tracker.pending_events(), 0);

    let names: Vec<String> = queries(&sender.delivered.lock().unwrap())
        .iter()
        .map(|q| param(q, "action_name").unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..45).map(|i| format!("e{}", i)).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_concurrent_submitters_reach_dry_run_exactly_once() {
    let context = Trackline::in_memory("com.example.app");
    let tracker = Arc::new(build_tracker(&context, Arc::new(ScriptedSender::default())));
    let sink = dry_run(&tracker);
    tracker.set_dispatch_interval_ms(20);

    let handles: Vec<_> = (0..20)
        .map(|t| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    tracker.track(action(format!("t{}-{}", t, i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(wait_for(|| queries(&sink.lock().unwrap()).len() >= 100));
    thread::sleep(Duration::from_millis(100));

    let sent = queries(&sink.lock().unwrap());
    assert_eq!(sent.len(), 100);
    let names: HashSet<&str> = sent.iter().filter_map(|q| param(q, "action_name")).collect();
    assert_eq!(names.len(), 100);
    assert_eq!(tracker.pending_events(), 0);
}

#[test]
fn test_wifi_only_waits_for_wifi() {
    let connectivity = Arc::new(ManualConnectivity::new(true, LinkType::Mobile));
    let context = Trackline::in_memory("com.example.app").with_connectivity(connectivity.clone());
    let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));
    let sink = dry_run(&tracker);
    tracker.set_dispatch_mode(DispatchMode::WifiOnly);

    tracker.track(action("queued-1"));
    tracker.track(action("queued-2"));
    tracker.dispatch_blocking();
    assert!(sink.lock().unwrap().is_empty());
    assert_eq!(tracker.pending_events(), 2);

    connectivity.set_link_type(LinkType::Wifi);
    tracker.dispatch_blocking();
    assert_eq!(queries(&sink.lock().unwrap()).len(), 2);
    assert_eq!(tracker.pending_events(), 0);
}

#[test]
fn test_offline_events_survive_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let connectivity = Arc::new(ManualConnectivity::new(false, LinkType::None));
    let store: Arc<dyn KeyValueStore> =
        Arc::new(SqliteStore::open(&temp_dir.path().join("preferences.db")).unwrap());

    {
        let context = Trackline::new("com.example.app", store.clone())
            .with_cache_dir(temp_dir.path().join("cache"))
            .with_connectivity(connectivity.clone());
        let tracker = build_tracker(&context, Arc::new(ScriptedSender::default()));
        tracker.track(action("offline-1"));
        tracker.track(action("offline-2"));
        tracker.dispatch_blocking();
        assert_eq!(tracker.pending_events(), 2);
    }

    connectivity.set(true, LinkType::Wifi);
    let context = Trackline::new("com.example.app", store)
        .with_cache_dir(temp_dir.path().join("cache"))
        .with_connectivity(connectivity);
    let sender = Arc::new(ScriptedSender::default());
    let tracker = build_tracker(&context, sender.clone());
    assert_eq!(tracker.pending_events(), 2);

    tracker.dispatch_blocking();
    let names: Vec<String> = queries(&sender.delivered.lock().unwrap())
        .iter()
        .map(|q| param(q, "action_name").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["offline-1", "offline-2"]);
}

#[test]
fn test_opted_out_tracker_sends_nothing() {
    let context = Trackline::in_memory("com.example.app");
    let sender = Arc::new(ScriptedSender::default());
    let tracker = build_tracker(&context, sender.clone());

    tracker.set_opt_out(true);
    tracker.track(action("ignored"));
    tracker.dispatch_blocking();

    assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.pending_events(), 0);
}
