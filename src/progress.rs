//! Observer trait for per-file pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::BioCraftConfigBuilder::observer`] to receive events as
//! each tracked file moves through its state machine. The CLI uses it to
//! drive a progress bar; a UI could forward the events to a render loop.
//!
//! Events for different files arrive from different tasks and in no
//! particular order. Events for one file always arrive in pipeline order.
//!
//! # Example
//!
//! ```rust
//! use biocraft::{BioCraftConfig, FileId, PipelineObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_file_completed(&self, _id: FileId, name: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("done: {name}");
//!     }
//! }
//!
//! let config = BioCraftConfig::builder()
//!     .observer(Arc::new(CountingObserver { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::registry::{FileId, ProcessingStatus};
use std::sync::Arc;

/// Called by the pipeline controller as files are accepted and processed.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls are made after the registry lock is released.
pub trait PipelineObserver: Send + Sync {
    /// Called once per batch, after the accepted entries are inserted.
    fn on_batch_submitted(&self, accepted: usize, rejected: usize) {
        let _ = (accepted, rejected);
    }

    /// Called for every upload refused at intake.
    fn on_file_rejected(&self, file_name: &str, reason: &str) {
        let _ = (file_name, reason);
    }

    /// Called after each applied status transition.
    fn on_status_change(&self, id: FileId, status: ProcessingStatus) {
        let _ = (id, status);
    }

    /// Called when a file reaches COMPLETED. `name` is the classified name.
    fn on_file_completed(&self, id: FileId, name: &str) {
        let _ = (id, name);
    }

    /// Called when a file reaches ERROR.
    fn on_file_failed(&self, id: FileId, error: &str) {
        let _ = (id, error);
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::BioCraftConfig`].
pub type Observer = Arc<dyn PipelineObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingObserver {
        submitted: AtomicUsize,
        rejected: AtomicUsize,
        completes: AtomicUsize,
        failures: AtomicUsize,
        statuses: Mutex<Vec<ProcessingStatus>>,
    }

    impl PipelineObserver for TrackingObserver {
        fn on_batch_submitted(&self, accepted: usize, _rejected: usize) {
            self.submitted.store(accepted, Ordering::SeqCst);
        }

        fn on_file_rejected(&self, _file_name: &str, _reason: &str) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_status_change(&self, _id: FileId, status: ProcessingStatus) {
            self.statuses.lock().unwrap().push(status);
        }

        fn on_file_completed(&self, _id: FileId, _name: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_failed(&self, _id: FileId, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        let id = FileId::new();
        obs.on_batch_submitted(2, 1);
        obs.on_file_rejected("a.pdf", "wrong type");
        obs.on_status_change(id, ProcessingStatus::Reading);
        obs.on_file_completed(id, "张三");
        obs.on_file_failed(id, "No response from AI");
    }

    #[test]
    fn tracking_observer_receives_events() {
        let tracker = TrackingObserver::default();
        let id = FileId::new();

        tracker.on_batch_submitted(2, 1);
        tracker.on_file_rejected("b.pdf", "wrong type");
        tracker.on_status_change(id, ProcessingStatus::Reading);
        tracker.on_status_change(id, ProcessingStatus::Processing);
        tracker.on_status_change(id, ProcessingStatus::Completed);
        tracker.on_file_completed(id, "张三");
        tracker.on_file_failed(FileId::new(), "corrupt");

        assert_eq!(tracker.submitted.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.rejected.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.statuses.lock().unwrap(),
            vec![
                ProcessingStatus::Reading,
                ProcessingStatus::Processing,
                ProcessingStatus::Completed
            ]
        );
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_batch_submitted(10, 0);
        obs.on_status_change(FileId::new(), ProcessingStatus::Idle);
    }
}
