//! Options monitor: cached, change-driven resolution of typed options.
//!
//! The monitor owns the published value for one pipeline. It resolves once
//! at construction, then re-resolves whenever the configuration source fires
//! a change token:
//!
//! - Resolution cycles serialize through a single mutex; two rapid change
//!   events run two cycles back to back, never interleaved.
//! - The watch token is re-armed *before* a cycle runs, so a change landing
//!   mid-cycle gets its own token and its own cycle; no change is silently
//!   dropped.
//! - A cycle that fails validation leaves the previously published value in
//!   place and notifies nobody; the failure is recorded in the cycle
//!   statistics and surfaced only to callers of [`OptionsMonitor::reload`]
//!   (or construction, for the first cycle).
//! - [`OptionsMonitor::current`] never blocks and never runs the pipeline:
//!   it loads an atomically swapped `Arc`, observing either the old or the
//!   new value, never a half-configured one.
//!
//! Change callbacks, both the internal token callback and registered
//! subscribers, run on whichever thread triggered the change (a file
//! watcher thread, or the caller of [`MemorySource::set`]). Subscriber
//! callbacks must not synchronously trigger another cycle on the same
//! monitor (by mutating the source or calling `reload`); the cycle lock is
//! still held.
//!
//! [`MemorySource::set`]: crate::source::MemorySource::set

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;
use crate::options::pipeline::OptionsPipeline;
use crate::source::ConfigurationSource;

type ChangeCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Resolution cycle statistics.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Total number of resolution cycles run after construction
    pub total_cycles: u64,
    /// Number of cycles that published a new value
    pub successful_cycles: u64,
    /// Number of cycles rejected by validation (or a failed source read)
    pub failed_cycles: u64,
    /// Timestamp of the last successful cycle
    pub last_success: Option<Instant>,
    /// Timestamp of the last failed cycle
    pub last_failure: Option<Instant>,
    /// Failure reason of the last failed cycle
    pub last_failure_reason: Option<String>,
}

/// Monitors a configuration source and keeps a validated, typed options
/// value current.
///
/// Construction fails if the initial resolution fails: a monitor never
/// starts without a valid value to serve, so [`current`](Self::current) is
/// infallible afterwards. Cloning is cheap and clones observe the same
/// published value. Dropping the last clone releases the source
/// subscription: a still-pending change token fires into nothing.
pub struct OptionsMonitor<T> {
    inner: Arc<MonitorInner<T>>,
}

struct MonitorInner<T> {
    source: Arc<dyn ConfigurationSource>,
    pipeline: OptionsPipeline<T>,
    current: ArcSwap<T>,
    /// Serializes resolution cycles; readers never take this.
    cycle: Mutex<()>,
    stats: RwLock<CycleStats>,
    subscribers: Mutex<Vec<(u64, ChangeCallback<T>)>>,
    next_subscriber: AtomicU64,
}

impl<T> OptionsMonitor<T>
where
    T: Default + Send + Sync + 'static,
{
    /// Construct a monitor and run the first resolution cycle synchronously.
    ///
    /// Returns the cycle's error if the initial configuration fails
    /// validation (fail-fast startup policy).
    pub fn new(source: Arc<dyn ConfigurationSource>, pipeline: OptionsPipeline<T>) -> Result<Self> {
        let initial = pipeline.resolve()?;
        debug!("Initial options resolution succeeded");

        let inner = Arc::new(MonitorInner {
            source,
            pipeline,
            current: ArcSwap::from_pointee(initial),
            cycle: Mutex::new(()),
            stats: RwLock::new(CycleStats::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
        });

        MonitorInner::arm(&inner);
        // A mutation between the initial resolve and arming had no token to
        // fire; one armed cycle picks it up. Its failure is tolerable since
        // the initial value above is already published.
        if let Err(e) = MonitorInner::run_cycle(&inner) {
            warn!("Options re-resolution failed after startup, serving initial value: {e}");
        }

        Ok(Self { inner })
    }

    /// The latest published value.
    ///
    /// Never blocks and never runs the pipeline; repeated calls with no
    /// intervening change return the identical `Arc`.
    pub fn current(&self) -> Arc<T> {
        self.inner.current.load_full()
    }

    /// Manually run one resolution cycle and surface its result.
    ///
    /// On failure the previously published value stays in place and is
    /// still served by [`current`](Self::current).
    pub fn reload(&self) -> Result<Arc<T>> {
        debug!("Manual options reload triggered");
        MonitorInner::run_cycle(&self.inner)
    }

    /// Register a callback invoked with every newly published value.
    ///
    /// Subscribers are notified in registration order, once per successful
    /// cycle; failed cycles notify nobody. Dropping the returned handle
    /// unsubscribes. Unsubscribing concurrently with an in-flight
    /// notification is safe, but that one in-flight notification may still
    /// be observed; later ones never are.
    pub fn on_change<F>(&self, callback: F) -> ChangeSubscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));

        let weak = Arc::downgrade(&self.inner);
        ChangeSubscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .subscribers
                        .lock()
                        .retain(|(existing, _)| *existing != id);
                }
            })),
        }
    }

    /// Snapshot of the cycle statistics.
    pub fn stats(&self) -> CycleStats {
        self.inner.stats.read().clone()
    }
}

impl<T> Clone for OptionsMonitor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> MonitorInner<T>
where
    T: Default + Send + Sync + 'static,
{
    /// Register for the source's next change. Holding only a weak reference
    /// keeps a dropped monitor from being revived by its own token.
    fn arm(inner: &Arc<Self>) {
        let token = inner.source.watch();
        let weak = Arc::downgrade(inner);
        token.on_fire(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Re-arm before resolving so a change arriving during the cycle
            // gets its own token and cycle.
            Self::arm(&inner);
            if let Err(e) = Self::run_cycle(&inner) {
                warn!("Options resolution cycle failed, keeping previous value: {e}");
            }
        });
    }

    fn run_cycle(inner: &Arc<Self>) -> Result<Arc<T>> {
        let _cycle = inner.cycle.lock();

        let outcome = inner.pipeline.resolve();
        let mut stats = inner.stats.write();
        stats.total_cycles += 1;

        match outcome {
            Ok(options) => {
                let published = Arc::new(options);
                inner.current.store(Arc::clone(&published));
                stats.successful_cycles += 1;
                stats.last_success = Some(Instant::now());
                drop(stats);
                debug!("Published new options value");

                // Snapshot so unsubscribe never contends with a running
                // callback; see on_change for the visibility contract.
                let callbacks: Vec<ChangeCallback<T>> = inner
                    .subscribers
                    .lock()
                    .iter()
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect();
                for callback in callbacks {
                    callback(&published);
                }
                Ok(published)
            }
            Err(e) => {
                stats.failed_cycles += 1;
                stats.last_failure = Some(Instant::now());
                stats.last_failure_reason = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Handle for one [`OptionsMonitor::on_change`] registration.
///
/// Unsubscribes when dropped or when [`unsubscribe`](Self::unsubscribe) is
/// called explicitly.
pub struct ChangeSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ChangeSubscription {
    /// Remove the registration now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
