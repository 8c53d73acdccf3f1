use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the gateway, the replay controller and the UI.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    frames_applied: AtomicU64,
    frames_rejected: AtomicU64,
    busy_rejections: AtomicU64,
    implicit_acks: AtomicU64,
    navigation_renders: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_applied: u64,
    pub frames_rejected: u64,
    pub busy_rejections: u64,
    pub implicit_acks: u64,
    pub navigation_renders: u64,
}

impl SessionMetrics {
    pub fn record_applied(&self) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_implicit_ack(&self) {
        self.implicit_acks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation(&self) {
        self.navigation_renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_applied: self.frames_applied.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            implicit_acks: self.implicit_acks.load(Ordering::Relaxed),
            navigation_renders: self.navigation_renders.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = SessionMetrics::default();
        metrics.record_applied();
        metrics.record_applied();
        metrics.record_busy();
        metrics.record_implicit_ack();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_applied, 2);
        assert_eq!(snapshot.busy_rejections, 1);
        assert_eq!(snapshot.implicit_acks, 1);
        assert_eq!(snapshot.frames_rejected, 0);
    }
}
