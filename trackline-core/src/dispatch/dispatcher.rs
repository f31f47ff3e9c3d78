//! The dispatcher owns the background worker that drains the event cache.
//!
//! ## Worker lifecycle
//!
//! ```text
//!            submit() (interval >= 0) / force_dispatch()
//!   STOPPED ─────────────────────────────────────────────► RUNNING
//!      ▲                                                      │
//!      └──── cache empty / interval < 0 / blocking pass done ─┘
//! ```
//!
//! While running, each pass sleeps `interval + backoff` (or until woken by a
//! forced dispatch), switches the cache online/offline, drains a batch,
//! builds packets and sends them in order. The first failed packet stops the
//! pass; everything from that packet on goes back to the front of the cache.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::{DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_DISPATCH_INTERVAL_MS, DEFAULT_MAX_DRAIN};
use crate::connectivity::Connectivity;
use crate::error::Error;
use crate::query::TrackMe;

use super::cache::EventCache;
use super::event::Event;
use super::mode::DispatchMode;
use super::packet::{Packet, PacketFactory};
use super::sender::{PacketSender, SendOptions};

/// Receives packets instead of the network when set
pub type DryRunSink = Arc<Mutex<Vec<Packet>>>;

/// Called on the worker thread for every failed transmission
pub type FailureCallback = Arc<dyn Fn(&Error) + Send + Sync>;

const WORKER_THREAD_NAME: &str = "trackline-dispatcher";

/// Dispatch statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events acknowledged by the collector (or the dry-run sink)
    pub events_dispatched: usize,
    /// Packets acknowledged
    pub packets_sent: usize,
    /// Failed transmissions
    pub packet_failures: usize,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    cache: EventCache,
    connectivity: Arc<dyn Connectivity>,
    packet_factory: PacketFactory,
    packet_sender: Arc<dyn PacketSender>,

    dispatch_interval_ms: AtomicI64,
    connection_timeout_ms: AtomicU64,
    gzip: AtomicBool,
    max_drain: AtomicUsize,
    mode: Mutex<DispatchMode>,
    retry_counter: AtomicU32,

    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    control: Mutex<Control>,
    /// Notified whenever a worker stops
    worker_stopped: Condvar,

    dry_run_target: Mutex<Option<DryRunSink>>,
    on_failure: Mutex<Option<FailureCallback>>,
    stats: Mutex<DispatchStats>,
}

#[derive(Default)]
struct Control {
    running: bool,
    /// Callers inside `force_dispatch_blocking`; while non-zero the worker
    /// exits after its next complete pass
    blocking_waiters: usize,
    /// Set when the owning dispatcher is dropped
    shutdown: bool,
    worker: Option<JoinHandle<()>>,
}

impl Control {
    fn worker_thread(&self) -> Option<ThreadId> {
        self.worker.as_ref().map(|worker| worker.thread().id())
    }
}

/// Marks the worker stopped if it unwinds, so blocking callers are released
struct StopOnUnwind<'a>(&'a Shared);

impl Drop for StopOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut control = self.0.control.lock().unwrap_or_else(PoisonError::into_inner);
            control.running = false;
            self.0.worker_stopped.notify_all();
        }
    }
}

/// Sleep before the next pass: `interval`, plus `min(retries * interval, 5 * interval)`
/// once more than one retry is pending. Negative intervals do not sleep.
pub fn backoff_sleep(interval_ms: i64, retry_counter: u32) -> Duration {
    if interval_ms <= 0 {
        return Duration::ZERO;
    }
    let mut sleep_ms = interval_ms;
    if retry_counter > 1 {
        let growth = i64::from(retry_counter).saturating_mul(interval_ms);
        sleep_ms = sleep_ms.saturating_add(growth.min(interval_ms.saturating_mul(5)));
    }
    Duration::from_millis(sleep_ms as u64)
}

impl Dispatcher {
    pub fn new(
        cache: EventCache,
        connectivity: Arc<dyn Connectivity>,
        packet_factory: PacketFactory,
        packet_sender: Arc<dyn PacketSender>,
    ) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                cache,
                connectivity,
                packet_factory,
                packet_sender,
                dispatch_interval_ms: AtomicI64::new(DEFAULT_DISPATCH_INTERVAL_MS),
                connection_timeout_ms: AtomicU64::new(DEFAULT_CONNECTION_TIMEOUT_MS),
                gzip: AtomicBool::new(false),
                max_drain: AtomicUsize::new(DEFAULT_MAX_DRAIN),
                mode: Mutex::new(DispatchMode::default()),
                retry_counter: AtomicU32::new(0),
                wake_tx,
                wake_rx,
                control: Mutex::new(Control::default()),
                worker_stopped: Condvar::new(),
                dry_run_target: Mutex::new(None),
                on_failure: Mutex::new(None),
                stats: Mutex::new(DispatchStats::default()),
            }),
        }
    }

    /// Queue a bag for transmission
    pub fn submit(&self, track_me: &TrackMe) {
        if track_me.is_empty() {
            tracing::warn!("Ignoring empty parameter bag");
            return;
        }
        self.shared.cache.add(Event::from_track_me(track_me));
        if self.dispatch_interval_ms() >= 0 {
            Shared::launch(&self.shared);
        }
    }

    /// Start the worker for one cycle, or skip its remaining sleep once.
    ///
    /// Returns true if a new worker was started.
    pub fn force_dispatch(&self) -> bool {
        let launched = Shared::launch(&self.shared);
        self.shared.wake();
        launched
    }

    /// Dispatch everything queued and return once the worker has exited.
    ///
    /// Concurrent callers all wait for the same worker to stop.
    pub fn force_dispatch_blocking(&self) {
        {
            let control = self.shared.control.lock().unwrap();
            if control.running && control.worker_thread() == Some(thread::current().id()) {
                tracing::warn!("Blocking dispatch requested from the dispatcher thread");
                return;
            }
        }

        self.shared.control.lock().unwrap().blocking_waiters += 1;

        self.force_dispatch();

        let mut control = self.shared.control.lock().unwrap();
        while control.running {
            control = self.shared.worker_stopped.wait(control).unwrap();
        }
        control.blocking_waiters -= 1;
    }

    /// Drop every queued event
    pub fn clear(&self) {
        self.shared.cache.clear();
        // Let a running worker notice the empty queue and exit
        if self.is_running() {
            self.force_dispatch();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.control.lock().unwrap().running
    }

    /// Pause between passes in ms; 0 dispatches immediately, negative is manual-only
    pub fn set_dispatch_interval(&self, interval_ms: i64) {
        self.shared
            .dispatch_interval_ms
            .store(interval_ms, Ordering::SeqCst);
        if interval_ms >= 0 {
            Shared::launch(&self.shared);
        }
    }

    pub fn dispatch_interval_ms(&self) -> i64 {
        self.shared.dispatch_interval_ms.load(Ordering::SeqCst)
    }

    /// Connect + read timeout; takes effect on the next transmission
    pub fn set_connection_timeout_ms(&self, timeout_ms: u64) {
        self.shared
            .connection_timeout_ms
            .store(timeout_ms, Ordering::SeqCst);
    }

    pub fn connection_timeout_ms(&self) -> u64 {
        self.shared.connection_timeout_ms.load(Ordering::SeqCst)
    }

    /// Gzip bulk bodies; the collector must accept `Content-Encoding: gzip`
    pub fn set_dispatch_gzipped(&self, gzip: bool) {
        self.shared.gzip.store(gzip, Ordering::SeqCst);
    }

    pub fn dispatch_gzipped(&self) -> bool {
        self.shared.gzip.load(Ordering::SeqCst)
    }

    pub fn set_dispatch_mode(&self, mode: DispatchMode) {
        *self.shared.mode.lock().unwrap() = mode;
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        *self.shared.mode.lock().unwrap()
    }

    /// Upper bound of records drained per pass
    pub fn set_max_drain(&self, max_drain: usize) {
        self.shared.max_drain.store(max_drain.max(1), Ordering::SeqCst);
    }

    pub fn max_drain(&self) -> usize {
        self.shared.max_drain.load(Ordering::SeqCst)
    }

    /// Route packets into `target` instead of the network; `None` restores sending
    pub fn set_dry_run_target(&self, target: Option<DryRunSink>) {
        *self.shared.dry_run_target.lock().unwrap() = target;
    }

    pub fn dry_run_target(&self) -> Option<DryRunSink> {
        self.shared.dry_run_target.lock().unwrap().clone()
    }

    pub fn set_failure_callback(&self, callback: Option<FailureCallback>) {
        *self.shared.on_failure.lock().unwrap() = callback;
    }

    /// Consecutive failed passes, drives the backoff
    pub fn retry_counter(&self) -> u32 {
        self.shared.retry_counter.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.stats.lock().unwrap().clone()
    }

    pub fn cache(&self) -> &EventCache {
        &self.shared.cache
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let worker = {
            let mut control = self.shared.control.lock().unwrap();
            control.shutdown = true;
            control.worker.take()
        };
        self.shared.wake();

        if let Some(worker) = worker {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }

        // Whatever is still in memory survives on disk until the next start
        if !self.shared.cache.is_empty() {
            self.shared.cache.update_state(false);
        }
    }
}

impl Shared {
    fn launch(shared: &Arc<Shared>) -> bool {
        let mut control = shared.control.lock().unwrap();
        if control.running || control.shutdown {
            return false;
        }

        let worker_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_shared.run());

        match spawned {
            Ok(handle) => {
                control.running = true;
                control.worker = Some(handle);
                tracing::debug!("Dispatcher thread started");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn dispatcher thread");
                false
            }
        }
    }

    /// Release one wake token; a pending token is not doubled
    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    fn is_online(&self) -> bool {
        let mode = *self.mode.lock().unwrap();
        mode.is_online(self.connectivity.as_ref())
    }

    fn send_options(&self) -> SendOptions {
        SendOptions {
            timeout: Duration::from_millis(self.connection_timeout_ms.load(Ordering::SeqCst)),
            gzip: self.gzip.load(Ordering::SeqCst),
        }
    }

    fn run(self: Arc<Self>) {
        let _stop_on_unwind = StopOnUnwind(&*self);
        self.retry_counter.store(0, Ordering::SeqCst);

        loop {
            let interval_ms = self.dispatch_interval_ms.load(Ordering::SeqCst);
            let sleep = backoff_sleep(interval_ms, self.retry_counter.load(Ordering::SeqCst));

            // Either the interval passes or a forced dispatch grants a free pass
            let _ = self.wake_rx.recv_timeout(sleep);

            let forced = self.control.lock().unwrap().blocking_waiters > 0;

            if self.cache.update_state(self.is_online()) {
                self.dispatch_pass();
            }

            let mut control = self.control.lock().unwrap();
            if forced
                || control.shutdown
                || self.cache.is_empty()
                || self.dispatch_interval_ms.load(Ordering::SeqCst) < 0
            {
                control.running = false;
                while self.wake_rx.try_recv().is_ok() {}
                self.worker_stopped.notify_all();
                tracing::debug!("Dispatcher thread stopping");
                break;
            }
        }
    }

    /// Drain one batch and send it. Returns the number of events acknowledged.
    fn dispatch_pass(&self) -> usize {
        let mut drained = Vec::new();
        self.cache
            .drain_to(&mut drained, self.max_drain.load(Ordering::SeqCst));
        tracing::debug!(drained = drained.len(), "Drained events");

        let packets = self.packet_factory.build_packets(&drained);
        let options = self.send_options();
        let dry_run = self.dry_run_target.lock().unwrap().clone();

        let mut dispatched = 0;
        for packet in &packets {
            let result = match &dry_run {
                Some(sink) => {
                    let mut sink = sink.lock().unwrap();
                    sink.push(packet.clone());
                    tracing::debug!(stored = sink.len(), "Dry run, stored packet");
                    Ok(())
                }
                None => self.send(packet, &options),
            };

            match result {
                Ok(()) => {
                    dispatched += packet.event_count();
                    self.retry_counter.store(0, Ordering::SeqCst);
                    let mut stats = self.stats.lock().unwrap();
                    stats.events_dispatched += packet.event_count();
                    stats.packets_sent += 1;
                }
                Err(e) => {
                    let retries = self.retry_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    self.stats.lock().unwrap().packet_failures += 1;
                    tracing::warn!(error = %e, retries, "Failed to send packet");
                    self.report_failure(&e);
                    break;
                }
            }

            // Bail out early when connectivity drops mid-batch
            if !self.is_online() {
                tracing::debug!("Disconnected during dispatch pass");
                break;
            }
        }

        tracing::debug!(dispatched, "Dispatched events");
        if dispatched < drained.len() {
            let unsent = drained.split_off(dispatched);
            tracing::debug!(requeued = unsent.len(), "Unable to send all events, requeueing");
            self.cache.requeue(unsent);
            self.cache.update_state(self.is_online());
        }
        dispatched
    }

    fn send(&self, packet: &Packet, options: &SendOptions) -> crate::error::Result<()> {
        panic::catch_unwind(AssertUnwindSafe(|| self.packet_sender.send(packet, options)))
            .unwrap_or_else(|_| Err(Error::Transmission("packet sender panicked".to_string())))
    }

    fn report_failure(&self, error: &Error) {
        let callback = self.on_failure.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }
}
