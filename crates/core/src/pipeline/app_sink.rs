use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::pipeline::pipeline_description::SinkStage;
use crate::video::domain::raw_sample::RawFrameSample;
use crate::video::domain::stream_source::FlowReturn;

/// Callback run on the streaming thread for every sample that reaches
/// the sink.
pub type NewSampleCallback = Box<dyn for<'a> FnMut(&RawFrameSample<'a>) -> FlowReturn + Send>;

/// Longest single wait when pacing by timestamp.
const MAX_SYNC_WAIT: Duration = Duration::from_secs(1);

/// Terminal element that hands decoded samples to application code.
///
/// Handles are cheap to clone and all refer to the same element; the
/// pipeline keeps one for its streaming thread and callers resolve
/// another through `Pipeline::by_name`.
#[derive(Clone)]
pub struct AppSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    name: String,
    emit_signals: bool,
    sync: bool,
    drop: bool,
    max_buffers: u32,
    callback: Mutex<Option<NewSampleCallback>>,
    samples_received: AtomicU64,
    clock: Mutex<Option<(Instant, Duration)>>,
}

impl AppSink {
    pub fn from_stage(stage: &SinkStage) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                name: stage.name.clone(),
                emit_signals: stage.emit_signals,
                sync: stage.sync,
                drop: stage.drop,
                max_buffers: stage.max_buffers,
                callback: Mutex::new(None),
                samples_received: AtomicU64::new(0),
                clock: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn emit_signals(&self) -> bool {
        self.inner.emit_signals
    }

    pub fn sync(&self) -> bool {
        self.inner.sync
    }

    pub fn drop_when_full(&self) -> bool {
        self.inner.drop
    }

    pub fn max_buffers(&self) -> u32 {
        self.inner.max_buffers
    }

    /// Registers the `new-sample` callback, replacing any previous one.
    pub fn connect_new_sample<F>(&self, callback: F)
    where
        F: for<'a> FnMut(&RawFrameSample<'a>) -> FlowReturn + Send + 'static,
    {
        *self.lock_callback() = Some(Box::new(callback));
    }

    /// Removes the callback. Blocks while a delivery is in progress, so no
    /// invocation can start or still be running once this returns.
    pub fn disconnect(&self) {
        *self.lock_callback() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.lock_callback().is_some()
    }

    /// Samples that reached the sink, whether or not a callback ran.
    pub fn samples_received(&self) -> u64 {
        self.inner.samples_received.load(Ordering::Relaxed)
    }

    /// Delivers one sample. Called from the streaming thread.
    pub(crate) fn push_sample(&self, sample: &RawFrameSample<'_>) -> FlowReturn {
        self.inner.samples_received.fetch_add(1, Ordering::Relaxed);

        if self.inner.sync {
            self.wait_for_presentation(sample.pts());
        }
        if !self.inner.emit_signals {
            return FlowReturn::Ok;
        }

        match self.lock_callback().as_mut() {
            Some(callback) => callback(sample),
            None => FlowReturn::Ok,
        }
    }

    /// Forgets the pacing reference; the next sample plays immediately.
    pub(crate) fn reset_clock(&self) {
        *self.lock_clock() = None;
    }

    fn wait_for_presentation(&self, pts: Option<Duration>) {
        let Some(pts) = pts else {
            return;
        };
        let deadline = {
            let mut clock = self.lock_clock();
            let (base_instant, base_pts) = *clock.get_or_insert((Instant::now(), pts));
            base_instant + pts.saturating_sub(base_pts)
        };
        let wait = deadline.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait.min(MAX_SYNC_WAIT));
        }
    }

    fn lock_callback(&self) -> std::sync::MutexGuard<'_, Option<NewSampleCallback>> {
        self.inner
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, Option<(Instant, Duration)>> {
        self.inner
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AppSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSink")
            .field("name", &self.inner.name)
            .field("emit_signals", &self.inner.emit_signals)
            .field("sync", &self.inner.sync)
            .field("drop", &self.inner.drop)
            .field("max_buffers", &self.inner.max_buffers)
            .field("samples_received", &self.samples_received())
            .finish()
    }
}
