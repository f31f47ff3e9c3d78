//! Crash capture
//!
//! [`install_panic_hook`] records every panic as a fatal exception before
//! the previously installed hook runs. The tracker is switched to
//! [`DispatchMode::Exception`] for the duration, so the event lands in the
//! offline cache instead of racing the dying process over the network; it
//! is sent on the next regular dispatch.

use std::any::Any;
use std::panic;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::dispatch::DispatchMode;
use crate::helper::{TrackHelper, TrackRequest};
use crate::tracker::Tracker;

const RECORDER_THREAD_NAME: &str = "trackline-panic";

/// Upper bound on how long a panicking thread waits for the recording
const RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// Record panics through `tracker`, then delegate to the previous hook
pub fn install_panic_hook(tracker: Arc<Tracker>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let origin = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let description = panic_message(info.payload());

        record_panic(&tracker, origin, description);
        previous(info);
    }));
}

/// The panic payload as text, for the common `&str` and `String` payloads
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Track and persist the panic from a helper thread.
///
/// The panicking thread may hold one of the tracker's locks, so it only
/// waits a bounded time for the helper.
fn record_panic(tracker: &Arc<Tracker>, origin: String, description: String) {
    let tracker = Arc::clone(tracker);
    let (done_tx, done_rx) = bounded(1);

    let spawned = thread::Builder::new()
        .name(RECORDER_THREAD_NAME.to_string())
        .spawn(move || {
            let previous_mode = tracker.dispatch_mode();
            tracker.set_dispatch_mode(DispatchMode::Exception);

            let result = TrackHelper::track()
                .exception(origin)
                .description(description)
                .fatal(true)
                .with(&tracker);
            if let Err(e) = result {
                tracing::error!(error = %e, "Couldn't track panic");
            }
            tracker.dispatch_blocking();

            tracker.set_dispatch_mode(previous_mode);
            let _ = done_tx.send(());
        });

    match spawned {
        Ok(_) => {
            if done_rx.recv_timeout(RECORD_TIMEOUT).is_err() {
                tracing::error!("Timed out recording panic");
            }
        }
        Err(e) => tracing::error!(error = %e, "Couldn't spawn panic recorder"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_str.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("bad state: 3"));
        assert_eq!(panic_message(owned.as_ref()), "bad state: 3");

        let other: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(other.as_ref()), "Box<dyn Any>");
    }
}
