use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};
use crate::pipeline::config::SharedConfig;
use crate::pipeline::FrameProcessor;
use crate::preview::sink::{PreviewSink, SinkFactory};
use crate::source::backend::{SourceOpener, VideoSource};
use crate::source::error::SourceError;
use crate::source::types::SourceSpec;

/// Capture lifecycle errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("a session cannot be started from its own capture thread")]
    CalledFromLoop,
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Running,
}

/// State shared between the controller and the capture loop. The running
/// flag and the source handle only change together under this lock.
#[derive(Default)]
struct SessionSlot {
    running: bool,
    source: Option<Box<dyn VideoSource>>,
    loop_thread: Option<ThreadId>,
}

/// Owns at most one capture session: a source, a sink and the loop thread
/// that reads, processes and shows frames.
///
/// Starting a new source always stops (and joins) the previous session
/// first. Dropping the manager stops the running session.
pub struct CaptureManager {
    opener: Arc<dyn SourceOpener>,
    config: SharedConfig,
    sink_factory: SinkFactory,
    processor: FrameProcessor,
    slot: Arc<Mutex<SessionSlot>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Serialises start/stop/wait between controller threads.
    control: Mutex<()>,
    stats: Arc<Mutex<DiagnosticStats>>,
}

/// Everything the loop thread owns for one session.
struct LoopContext {
    slot: Arc<Mutex<SessionSlot>>,
    config: SharedConfig,
    processor: FrameProcessor,
    sink: Box<dyn PreviewSink>,
    stats: Arc<Mutex<DiagnosticStats>>,
    frame_interval: Option<Duration>,
    name: String,
}

impl CaptureManager {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        config: SharedConfig,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            opener,
            config,
            sink_factory,
            processor: FrameProcessor::new(),
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            worker: Mutex::new(None),
            control: Mutex::new(()),
            stats: Arc::new(Mutex::new(DiagnosticStats::new())),
        }
    }

    /// The configuration the loop snapshots once per frame.
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn start_webcam(&self, index: u32) -> Result<()> {
        self.start(&SourceSpec::webcam(index))
    }

    /// Start a looping file session.
    pub fn start_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.start(&SourceSpec::file(path))
    }

    /// Stop any running session, open `spec` and start a new capture loop.
    ///
    /// If the source cannot be opened the error is returned and the manager
    /// stays idle.
    pub fn start(&self, spec: &SourceSpec) -> Result<()> {
        if self.is_loop_thread() {
            return Err(CaptureError::CalledFromLoop);
        }
        self.slot.lock().running = false;
        let _control = self.control.lock();
        self.shutdown_session();

        let source = match self.opener.open(spec) {
            Ok(source) => source,
            Err(e) => {
                warn!("failed to open {spec}: {e}");
                return Err(e.into());
            }
        };
        let geometry = source.geometry();
        let name = source.describe();
        info!(
            "starting capture from {name} ({}x{})",
            geometry.width, geometry.height
        );

        {
            let mut stats = self.stats.lock();
            stats.reset();
            stats.set_source(Some(name.clone()));
        }

        let sink = (self.sink_factory)(&geometry);
        {
            let mut slot = self.slot.lock();
            slot.source = Some(source);
            slot.running = true;
            slot.loop_thread = None;
        }

        let ctx = LoopContext {
            slot: Arc::clone(&self.slot),
            config: self.config.clone(),
            processor: self.processor,
            sink,
            stats: Arc::clone(&self.stats),
            frame_interval: geometry.frame_interval(),
            name,
        };

        let spawned = std::thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || run_loop(ctx));
        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!("failed to spawn capture thread: {e}");
                self.release_leftover_source();
                Err(e.into())
            }
        }
    }

    /// Stop the running session and wait for the loop to exit. Idempotent.
    ///
    /// Called from the capture thread itself (e.g. from a sink) this only
    /// asks the loop to exit; cleanup then happens on that thread.
    pub fn stop(&self) {
        self.slot.lock().running = false;
        if self.is_loop_thread() {
            return;
        }
        let _control = self.control.lock();
        self.shutdown_session();
    }

    /// Block until the running session ends on its own (end of stream,
    /// sink cancellation or a concurrent `stop`).
    pub fn wait(&self) {
        if self.is_loop_thread() {
            return;
        }
        let _control = self.control.lock();
        self.join_worker();
        self.release_leftover_source();
    }

    pub fn state(&self) -> SessionState {
        if self.slot.lock().running {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Take a snapshot of diagnostic stats for the current or last session.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    fn is_loop_thread(&self) -> bool {
        self.slot.lock().loop_thread == Some(std::thread::current().id())
    }

    /// Requires `control` to be held and the running flag to be cleared.
    fn shutdown_session(&self) {
        self.slot.lock().running = false;
        self.join_worker();
        self.release_leftover_source();
    }

    fn join_worker(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }

    /// Clear the slot once no loop thread is left to do it.
    fn release_leftover_source(&self) {
        let leftover = {
            let mut slot = self.slot.lock();
            slot.running = false;
            slot.loop_thread = None;
            slot.source.take()
        };
        if let Some(mut source) = leftover {
            debug!("releasing {}", source.describe());
            source.release();
        }
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.stop();
    }
}

enum ReadOutcome {
    Frame(crate::pipeline::frame::Frame),
    Rewound,
    Exit,
}

/// The loop context cleans up when dropped, so the source is released and
/// the sink closed exactly once even if processing panics.
impl Drop for LoopContext {
    fn drop(&mut self) {
        cleanup(self);
    }
}

/// A source checked out of the slot for one read. It goes back into the
/// slot when dropped, also on unwind.
struct Checkout<'a> {
    slot: &'a Mutex<SessionSlot>,
    source: Option<Box<dyn VideoSource>>,
}

impl Checkout<'_> {
    /// Take the source if the session is still running.
    fn take(slot: &Mutex<SessionSlot>) -> Option<Checkout<'_>> {
        let mut guard = slot.lock();
        if !guard.running {
            return None;
        }
        let source = guard.source.take()?;
        Some(Checkout {
            slot,
            source: Some(source),
        })
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            self.slot.lock().source = Some(source);
        }
    }
}

fn run_loop(mut ctx: LoopContext) {
    ctx.slot.lock().loop_thread = Some(std::thread::current().id());
    debug!("capture loop running for {}", ctx.name);

    // A looping source that fails straight after a rewind has nothing left
    // to play.
    let mut rewound_without_frame = false;

    loop {
        let read_started = Instant::now();
        // The slot lock is only held to check the flag and take the source,
        // never across the read itself.
        let outcome = match Checkout::take(&ctx.slot) {
            Some(mut checkout) => match checkout.source.as_mut() {
                Some(source) => read_next(source.as_mut(), &ctx, &mut rewound_without_frame),
                None => ReadOutcome::Exit,
            },
            None => ReadOutcome::Exit,
        };

        let frame = match outcome {
            ReadOutcome::Frame(frame) => frame,
            ReadOutcome::Rewound => continue,
            ReadOutcome::Exit => break,
        };

        let config = ctx.config.snapshot();
        let started = Instant::now();
        let output = ctx.processor.process(&frame, &config);
        ctx.stats
            .lock()
            .record_frame(output.data().len(), started.elapsed());

        ctx.sink.show(&output);
        if ctx.sink.poll_cancel() {
            info!("capture of {} cancelled", ctx.name);
            break;
        }

        if let Some(interval) = ctx.frame_interval {
            let elapsed = read_started.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }
}

fn read_next(
    source: &mut dyn VideoSource,
    ctx: &LoopContext,
    rewound_without_frame: &mut bool,
) -> ReadOutcome {
    match source.read_frame() {
        Ok(Some(frame)) => {
            *rewound_without_frame = false;
            return ReadOutcome::Frame(frame);
        }
        Ok(None) => debug!("{} reached the end of its frames", ctx.name),
        Err(e) => {
            warn!("read from {} failed: {e}", ctx.name);
            ctx.stats.lock().record_read_failure();
        }
    }

    if !source.is_looping() {
        return ReadOutcome::Exit;
    }
    if *rewound_without_frame {
        warn!("{} produced no frame after rewinding, stopping", ctx.name);
        return ReadOutcome::Exit;
    }
    match source.seek(0) {
        Ok(()) => {
            *rewound_without_frame = true;
            ctx.stats.lock().record_rewind();
            ReadOutcome::Rewound
        }
        Err(e) => {
            warn!("cannot rewind {}: {e}", ctx.name);
            ReadOutcome::Exit
        }
    }
}

fn cleanup(ctx: &mut LoopContext) {
    let source = {
        let mut slot = ctx.slot.lock();
        slot.running = false;
        slot.source.take()
    };
    if let Some(mut source) = source {
        source.release();
    }
    ctx.sink.close();

    let snapshot = ctx.stats.lock().snapshot();
    info!(
        "capture of {} stopped: {} frames, {} read failures, {} rewinds, {:.1} fps, {:.2} ms avg",
        ctx.name,
        snapshot.frame_count,
        snapshot.read_failures,
        snapshot.rewinds,
        snapshot.fps,
        snapshot.average_latency_ms
    );
}
