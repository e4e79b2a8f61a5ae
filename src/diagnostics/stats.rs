use serde::Serialize;
use std::time::{Duration, Instant};

/// Collects statistics for one capture session.
pub struct DiagnosticStats {
    source: Option<String>,
    frame_count: u64,
    read_failures: u64,
    rewinds: u64,
    total_bytes: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
    last_latency: Duration,
    total_latency: Duration,
}

/// Snapshot of session stats, serialisable for a host UI or logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub source: Option<String>,
    pub fps: f64,
    pub frame_count: u64,
    pub read_failures: u64,
    pub rewinds: u64,
    /// Processing time of the most recent frame.
    pub latency_ms: f64,
    pub average_latency_ms: f64,
    pub bandwidth_bps: u64,
    pub uptime_secs: f64,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            source: None,
            frame_count: 0,
            read_failures: 0,
            rewinds: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            last_frame_time: None,
            last_latency: Duration::ZERO,
            total_latency: Duration::ZERO,
        }
    }

    /// Name of the source these stats belong to.
    pub fn set_source(&mut self, source: Option<String>) {
        self.source = source;
    }

    /// Record a frame that went through the pipeline, with the size of the
    /// output and the time spent processing it.
    pub fn record_frame(&mut self, bytes: usize, latency: Duration) {
        self.frame_count += 1;
        self.total_bytes += bytes as u64;
        self.last_frame_time = Some(Instant::now());
        self.last_latency = latency;
        self.total_latency += latency;
    }

    /// Record a read that produced no frame.
    pub fn record_read_failure(&mut self) {
        self.read_failures += 1;
    }

    /// Record a looping source rewinding to its first frame.
    pub fn record_rewind(&mut self) {
        self.rewinds += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Calculate current FPS based on elapsed time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Processing time of the latest frame in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.last_latency.as_secs_f64() * 1000.0
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.total_latency.as_secs_f64() * 1000.0 / self.frame_count as f64
    }

    /// Output bandwidth in bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Time since the last processed frame, if any.
    pub fn since_last_frame(&self) -> Option<Duration> {
        self.last_frame_time.map(|t| t.elapsed())
    }

    /// Reset all counters and restart the clock.
    pub fn reset(&mut self) {
        *self = Self {
            source: self.source.take(),
            ..Self::new()
        };
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            source: self.source.clone(),
            fps: self.fps(),
            frame_count: self.frame_count,
            read_failures: self.read_failures,
            rewinds: self.rewinds,
            latency_ms: self.latency_ms(),
            average_latency_ms: self.average_latency_ms(),
            bandwidth_bps: self.bandwidth_bps(),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn initialises_with_zero_values() {
        let stats = DiagnosticStats::new();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.read_failures, 0);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.average_latency_ms(), 0.0);
        assert!(stats.since_last_frame().is_none());
    }

    #[test]
    fn record_frame_increments_frame_count() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(1000, Duration::from_millis(2));
        assert_eq!(stats.frame_count(), 1);
        stats.record_frame(1000, Duration::from_millis(4));
        assert_eq!(stats.frame_count(), 2);
        assert!(stats.since_last_frame().is_some());
    }

    #[test]
    fn latency_tracks_latest_and_average() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(10, Duration::from_millis(2));
        stats.record_frame(10, Duration::from_millis(6));
        assert!((stats.latency_ms() - 6.0).abs() < 1e-9);
        assert!((stats.average_latency_ms() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn fps_returns_positive_rate() {
        let mut stats = DiagnosticStats::new();
        for _ in 0..30 {
            stats.record_frame(1000, Duration::ZERO);
        }
        thread::sleep(Duration::from_millis(100));
        let fps = stats.fps();
        assert!(fps > 0.0, "fps should be positive, got {fps}");
    }

    #[test]
    fn bandwidth_bps_tracks_bytes() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(10_000, Duration::ZERO);
        thread::sleep(Duration::from_millis(50));
        let bps = stats.bandwidth_bps();
        assert!(bps > 0, "bandwidth should be positive, got {bps}");
    }

    #[test]
    fn reset_clears_counters_but_keeps_source() {
        let mut stats = DiagnosticStats::new();
        stats.set_source(Some("webcam 0".to_string()));
        stats.record_frame(1000, Duration::from_millis(1));
        stats.record_read_failure();
        stats.record_rewind();
        stats.reset();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.read_failures, 0);
        assert_eq!(stats.rewinds, 0);
        assert_eq!(stats.snapshot().source.as_deref(), Some("webcam 0"));
    }

    #[test]
    fn snapshot_serialises_to_camelcase() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(5000, Duration::from_millis(3));
        stats.record_read_failure();
        stats.record_rewind();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["frameCount"], 1);
        assert_eq!(json["readFailures"], 1);
        assert_eq!(json["rewinds"], 1);
        assert!(json["averageLatencyMs"].is_number());
        assert!(json["source"].is_null());
    }
}
