//! # Depot Core Progress Monitoring
//!
//! A [`ProgressMonitor`] receives progress from long operations and doubles as
//! their cancellation token: every step checks [`ProgressMonitor::is_canceled`]
//! before continuing.
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress sink and cooperative cancellation flag.
///
/// Shared between the operation and whoever may cancel it, so every method takes `&self`.
pub trait ProgressMonitor: Send + Sync {
    /// Start the operation with `total_work` units.
    fn begin_task(&self, name: &str, total_work: u64);

    /// Report `work` more units done.
    fn worked(&self, work: u64);

    /// Describe the current step.
    fn sub_task(&self, _name: &str) {}

    fn is_canceled(&self) -> bool;

    fn set_canceled(&self, canceled: bool);

    /// The operation finished, successfully or not.
    fn done(&self) {}
}

/// Monitor that only tracks cancellation.
#[derive(Debug, Default)]
pub struct NullProgressMonitor {
    canceled: AtomicBool,
}

impl NullProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressMonitor for NullProgressMonitor {
    fn begin_task(&self, _name: &str, _total_work: u64) {}

    fn worked(&self, _work: u64) {}

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::SeqCst);
    }
}

/// Monitor that records totals and logs each step at debug level.
///
/// Optionally cancels itself once a given amount of work has been reported,
/// which lets callers bound an operation by progress.
#[derive(Debug, Default)]
pub struct TrackingProgressMonitor {
    task: Mutex<String>,
    total: AtomicU64,
    worked: AtomicU64,
    canceled: AtomicBool,
    finished: AtomicBool,
    cancel_after: Option<u64>,
}

impl TrackingProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel once `work` units have been reported.
    pub fn cancel_after(work: u64) -> Self {
        Self { cancel_after: Some(work), ..Self::default() }
    }

    pub fn total_work(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn work_done(&self) -> u64 {
        self.worked.load(Ordering::SeqCst)
    }

    pub fn task_name(&self) -> String {
        self.task.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn is_done(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressMonitor for TrackingProgressMonitor {
    fn begin_task(&self, name: &str, total_work: u64) {
        log::debug!("{}: {} units of work", name, total_work);
        if let Ok(mut task) = self.task.lock() {
            *task = name.to_string();
        }
        self.total.store(total_work, Ordering::SeqCst);
        self.worked.store(0, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
    }

    fn worked(&self, work: u64) {
        let done = self.worked.fetch_add(work, Ordering::SeqCst) + work;
        log::debug!("progress {}/{}", done, self.total_work());
        if self.cancel_after.is_some_and(|limit| done >= limit) {
            self.set_canceled(true);
        }
    }

    fn sub_task(&self, name: &str) {
        log::debug!("  {}", name);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::SeqCst);
    }

    fn done(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}
