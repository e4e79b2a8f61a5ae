use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::pipeline::compress::encode_jpeg;
use crate::pipeline::frame::Frame;
use crate::source::types::Geometry;

/// Where processed frames go.
///
/// A sink is created per capture session and driven from the capture loop
/// thread. `close` is called exactly once when the session ends.
pub trait PreviewSink: Send {
    /// Display or store one processed frame.
    fn show(&mut self, frame: &Frame);

    /// Whether the user asked the session to end.
    fn poll_cancel(&mut self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// Creates the sink for a new session from the source geometry.
pub type SinkFactory = Arc<dyn Fn(&Geometry) -> Box<dyn PreviewSink> + Send + Sync>;

/// Shared cancellation request, set from outside the capture loop
/// (e.g. a Ctrl-C handler) and surfaced through [`PreviewSink::poll_cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the flag can serve the next session.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Thread-safe ring buffer for processed frames.
///
/// Stores up to `capacity` frames, overwriting the oldest when full.
/// Frames are wrapped in `Arc` so consumers get a cheap reference-counted
/// pointer instead of cloning the pixel buffer.
pub struct FrameBuffer {
    frames: Mutex<Vec<Option<Arc<Frame>>>>,
    capacity: usize,
    write_idx: Mutex<usize>,
    /// Monotonic counter incremented on each push, so readers can tell
    /// whether anything new arrived since they last looked.
    sequence: AtomicU64,
}

impl FrameBuffer {
    /// Create a new ring buffer holding at least one frame.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let frames = (0..capacity).map(|_| None).collect();
        Self {
            frames: Mutex::new(frames),
            capacity,
            write_idx: Mutex::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    /// Push a new frame into the buffer, overwriting the oldest if full.
    pub fn push(&self, frame: Frame) {
        let mut frames = self.frames.lock();
        let mut idx = self.write_idx.lock();
        frames[*idx] = Some(Arc::new(frame));
        *idx = (*idx + 1) % self.capacity;
        self.sequence.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of frames pushed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Get the most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let frames = self.frames.lock();
        let idx = self.write_idx.lock();
        let latest_idx = if *idx == 0 {
            self.capacity - 1
        } else {
            *idx - 1
        };
        frames[latest_idx].clone()
    }
}

/// Publishes processed frames into a [`FrameBuffer`] for a host UI to pull.
pub struct BufferSink {
    buffer: Arc<FrameBuffer>,
    cancel: CancelFlag,
}

impl BufferSink {
    pub fn new(buffer: Arc<FrameBuffer>, cancel: CancelFlag) -> Self {
        Self { buffer, cancel }
    }
}

impl PreviewSink for BufferSink {
    fn show(&mut self, frame: &Frame) {
        self.buffer.push(frame.clone());
    }

    fn poll_cancel(&mut self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Writes every Nth frame as a numbered JPEG into a directory and asks for
/// cancellation once `limit` frames have been shown.
pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    limit: Option<u64>,
    quality: u8,
    cancel: CancelFlag,
    shown: u64,
    written: u64,
    dir_ready: bool,
}

impl SnapshotSink {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancelFlag) -> Self {
        Self {
            dir: dir.into(),
            every: 1,
            limit: None,
            quality: 95,
            cancel,
            shown: 0,
            written: 0,
            dir_ready: false,
        }
    }

    /// Keep one frame out of every `every`. Zero is treated as one.
    pub fn every(mut self, every: u64) -> Self {
        self.every = every.max(1);
        self
    }

    /// Stop the session after this many frames.
    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written to disk so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write(&mut self, frame: &Frame) {
        if !self.dir_ready {
            if let Err(e) = std::fs::create_dir_all(&self.dir) {
                tracing::warn!("cannot create {}: {e}", self.dir.display());
                return;
            }
            self.dir_ready = true;
        }
        let path = self.dir.join(format!("frame_{:06}.jpg", self.shown));
        let result = encode_jpeg(frame, self.quality)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&path, bytes).map_err(|e| e.to_string()));
        match result {
            Ok(()) => self.written += 1,
            Err(e) => tracing::warn!("failed to write {}: {e}", path.display()),
        }
    }
}

impl PreviewSink for SnapshotSink {
    fn show(&mut self, frame: &Frame) {
        if self.shown % self.every == 0 {
            self.write(frame);
        }
        self.shown += 1;
    }

    fn poll_cancel(&mut self) -> bool {
        self.cancel.is_cancelled() || self.limit.is_some_and(|limit| self.shown >= limit)
    }

    fn close(&mut self) {
        tracing::info!(
            "wrote {} of {} frames to {}",
            self.written,
            self.shown,
            self.dir.display()
        );
    }
}
