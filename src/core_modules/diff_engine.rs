// THEORY:
// The `DiffEngine` turns a pair of frames into a single "difference image". It
// runs as its own tokio task so the sampling loop never waits on it: the loop
// submits a request, gets a `PendingDiff` back immediately, and checks on it
// at later ticks.
//
// Key architectural principles:
// 1.  **Validate Before Dispatch**: Every request is checked on the caller's side
//     of the channel. Mismatched or malformed buffers never reach the worker.
// 2.  **Depth-One Mailbox**: The engine's inbox holds a single task. Together with
//     the pair store's one-outstanding-request rule this keeps the whole pipeline
//     at depth one; a second submission while the first is still queued is
//     refused rather than buffered.
// 3.  **Ownership Transfer**: Requests carry `Arc<PixelBuffer>` handles to
//     immutable frames and the reply carries a freshly allocated buffer the
//     engine no longer references.
// 4.  **Stateless Kernel**: `compute_difference` is a pure function. The worker
//     only moves it onto the blocking pool, since it is CPU-bound.
//
// Differencing rule: for each pixel, the mean absolute R/G/B delta is compared
// against a noise threshold that shrinks as sensitivity grows. Deltas above it
// are amplified by a sensitivity-dependent gain and written as an opaque gray
// level. Everything else stays at the baseline, opaque black.

use crate::core_modules::pixel::pixel::{Channel, Pixel};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delta threshold at zero sensitivity. Full sensitivity lowers it to zero.
const MAX_NOISE_THRESHOLD: f32 = 64.0;
/// Extra amplification applied at full sensitivity.
const MAX_EXTRA_GAIN: f32 = 2.0;
const ENGINE_MAILBOX_DEPTH: usize = 1;

/// The pixel every output position takes when its inputs agree.
pub const BASELINE: Pixel = Pixel {
    red: 0,
    green: 0,
    blue: 0,
    alpha: Channel::MAX,
};

/// A validated pair of frames plus the sensitivity to compare them with.
#[derive(Debug, Clone)]
pub struct DiffRequest {
    previous: Arc<PixelBuffer>,
    current: Arc<PixelBuffer>,
    sensitivity: f32,
}

impl DiffRequest {
    pub fn new(
        previous: Arc<PixelBuffer>,
        current: Arc<PixelBuffer>,
        sensitivity: f32,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(MotionError::Configuration(format!(
                "sensitivity must lie in [0, 1], got {sensitivity}"
            )));
        }
        // Buffer lengths were checked when each PixelBuffer was built.
        previous.ensure_same_dimensions(&current)?;
        Ok(Self {
            previous,
            current,
            sensitivity,
        })
    }

    pub fn previous(&self) -> &PixelBuffer {
        &self.previous
    }

    pub fn current(&self) -> &PixelBuffer {
        &self.current
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.current.dimensions()
    }
}

/// The difference image for one request. Same geometry as its inputs.
pub type DiffResult = PixelBuffer;

/// Maps a per-pixel mean channel delta to an output intensity.
#[derive(Debug, Clone, Copy)]
struct DeltaMapping {
    threshold: f32,
    gain: f32,
}

impl DeltaMapping {
    fn for_sensitivity(sensitivity: f32) -> Self {
        Self {
            threshold: (1.0 - sensitivity) * MAX_NOISE_THRESHOLD,
            gain: 1.0 + MAX_EXTRA_GAIN * sensitivity,
        }
    }

    fn intensity(&self, delta: f32) -> Channel {
        if delta > self.threshold {
            (delta * self.gain).round().min(Channel::MAX as f32) as Channel
        } else {
            0
        }
    }
}

/// Computes the difference image of a request. Pure and synchronous.
pub fn compute_difference(request: &DiffRequest) -> Result<DiffResult> {
    let mapping = DeltaMapping::for_sensitivity(request.sensitivity);
    request.previous.zip_map(&request.current, |before, after| {
        let intensity = mapping.intensity(before.abs_delta_mean(&after));
        Pixel::new(intensity, intensity, intensity, BASELINE.alpha)
    })
}

struct DiffTask {
    request: DiffRequest,
    reply: oneshot::Sender<Result<DiffResult>>,
}

/// A result that has been requested but may not have arrived yet.
pub struct PendingDiff {
    receiver: oneshot::Receiver<Result<DiffResult>>,
}

impl From<oneshot::Receiver<Result<DiffResult>>> for PendingDiff {
    fn from(receiver: oneshot::Receiver<Result<DiffResult>>) -> Self {
        Self { receiver }
    }
}

impl PendingDiff {
    /// Returns the result if the engine has replied, without waiting.
    pub fn try_take(&mut self) -> Option<Result<DiffResult>> {
        (&mut self.receiver)
            .now_or_never()
            .map(|reply| reply.unwrap_or(Err(MotionError::EngineUnavailable)))
    }

    /// Waits for the engine's reply.
    pub async fn wait(self) -> Result<DiffResult> {
        self.receiver
            .await
            .unwrap_or(Err(MotionError::EngineUnavailable))
    }
}

/// Handle to the differencing worker task.
pub struct DiffEngine {
    task_sender: mpsc::Sender<DiffTask>,
    worker: JoinHandle<()>,
}

impl DiffEngine {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn() -> Self {
        let (task_sender, mut task_receiver) = mpsc::channel::<DiffTask>(ENGINE_MAILBOX_DEPTH);

        let worker = tokio::spawn(async move {
            while let Some(task) = task_receiver.recv().await {
                let DiffTask { request, reply } = task;
                let (width, height) = request.dimensions();

                let outcome = tokio::task::spawn_blocking(move || compute_difference(&request))
                    .await
                    .map_err(|e| MotionError::Engine(e.to_string()))
                    .and_then(|result| result);

                if let Err(e) = &outcome {
                    warn!(error = %e, width, height, "difference computation failed");
                }
                if reply.send(outcome).is_err() {
                    debug!("diff result dropped, requester went away");
                }
            }
            debug!("diff engine mailbox closed, worker exiting");
        });

        Self {
            task_sender,
            worker,
        }
    }

    /// Queues `request` and returns immediately.
    pub fn submit(&self, request: DiffRequest) -> Result<PendingDiff> {
        let (reply, receiver) = oneshot::channel();
        self.task_sender
            .try_send(DiffTask { request, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => MotionError::EngineBusy,
                mpsc::error::TrySendError::Closed(_) => MotionError::EngineUnavailable,
            })?;
        Ok(PendingDiff::from(receiver))
    }

    /// Convenience for callers that want to wait: submit and await the reply.
    pub async fn diff(&self, request: DiffRequest) -> Result<DiffResult> {
        self.submit(request)?.wait().await
    }

    /// Closes the mailbox and waits for the worker to finish its current task.
    pub async fn shutdown(self) {
        let Self {
            task_sender,
            worker,
        } = self;
        drop(task_sender);
        if let Err(e) = worker.await {
            warn!(error = %e, "diff engine worker ended abnormally");
        }
    }
}
