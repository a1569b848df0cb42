use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

/// Shared build progress. Index builders report how much of the current
/// stage is done so a caller on another thread can poll it.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

struct ProgressInner {
    stage: Mutex<&'static str>,
    complete: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self(Arc::new(ProgressInner {
            stage: Mutex::new("idle"),
            complete: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }))
    }

    /// Starts a new named stage, resetting the counters.
    pub fn start_stage(&self, stage: &'static str, total: u64) {
        *self.0.stage.lock() = stage;
        self.0.complete.store(0, Ordering::Relaxed);
        self.0.total.store(total, Ordering::Relaxed);
    }

    pub fn stage(&self) -> &'static str {
        *self.0.stage.lock()
    }

    pub fn progress(&self) -> f32 {
        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }

        self.0.complete.load(Ordering::Relaxed) as f32 / total as f32
    }

    pub fn complete(&self) -> bool {
        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return false;
        }

        self.0.complete.load(Ordering::Relaxed) >= total
    }

    pub fn completed(&self) -> u64 {
        self.0.complete.load(Ordering::Relaxed)
    }

    pub fn add_complete(&self, count: u64) {
        self.0.complete.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_finished(&self) {
        let total = self.0.total.load(Ordering::Relaxed);
        self.0.complete.store(total, Ordering::Relaxed);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Progress;

    #[test]
    fn stages_reset_counters() {
        let progress = Progress::new();
        assert!(!progress.complete());

        progress.start_stage("insert", 4);
        progress.add_complete(2);
        assert_eq!(progress.stage(), "insert");
        assert_eq!(progress.progress(), 0.5);

        progress.start_stage("fill", 10);
        assert_eq!(progress.completed(), 0);
        progress.set_finished();
        assert!(progress.complete());
    }

    #[test]
    fn shared_between_clones() {
        let progress = Progress::new();
        let worker = progress.clone();
        progress.start_stage("build", 3);
        std::thread::spawn(move || worker.add_complete(3))
            .join()
            .unwrap();
        assert!(progress.complete());
    }
}
