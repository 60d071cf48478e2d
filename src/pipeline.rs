// THEORY:
// The `MotionPipeline` is the orchestrator of the motion engine. It owns the
// frame pair store, the diff engine handle and the grid aggregator, and runs the
// per-tick protocol that connects them:
//
//   sample -> observe -> collect reply -> dispatch if idle -> aggregate -> render
//
// Key architectural principles:
// 1.  **Never Block the Tick**: The pipeline only ever *polls* the outstanding
//     diff. A slow engine means the tick renders the last known diff and newer
//     frames supersede each other in the store; the loop itself keeps its
//     cadence.
// 2.  **Single Outstanding Request**: The store hands out a pair only when no
//     request is in flight, so there is at most one `PendingDiff` at any time and
//     replies arrive in dispatch order.
// 3.  **Localized Failure**: A failing tick yields no `MotionFrame` at all and is
//     counted. Only errors for which `MotionError::is_fatal` holds end `run`.
// 4.  **Drain on Exit**: When the frame source ends, the outstanding reply is
//     awaited so its pair is committed and its diff rendered before returning.

use crate::config::MotionConfig;
use crate::core_modules::diff_engine::{DiffEngine, DiffRequest, PendingDiff};
use crate::core_modules::frame_pair::FramePairStore;
use crate::core_modules::grid_aggregator::GridAggregator;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};
use crate::renderer::{MotionFrame, MotionRenderer};
use crate::sampler::FrameSampler;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Counters describing one pipeline session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames handed to `tick`.
    pub ticks: u64,
    /// Diff requests sent to the engine.
    pub dispatched: u64,
    /// Diff replies received successfully.
    pub completed: u64,
    /// Frames overwritten before they could be compared.
    pub superseded: u64,
    /// Ticks that ended in a non-fatal error.
    pub failed: u64,
}

pub struct MotionPipeline {
    config: MotionConfig,
    store: FramePairStore,
    engine: DiffEngine,
    aggregator: GridAggregator,
    pending: Option<PendingDiff>,
    latest_diff: Option<Arc<PixelBuffer>>,
    stats: PipelineStats,
}

impl MotionPipeline {
    /// Validates `config` and spawns the diff engine. Must be called from
    /// within a tokio runtime.
    pub fn new(config: MotionConfig) -> Result<Self> {
        config.validate()?;
        let aggregator = GridAggregator::new(
            config.frame.width,
            config.frame.height,
            config.grid.resolution_x,
            config.grid.resolution_y,
        )?;

        Ok(Self {
            config,
            store: FramePairStore::new(),
            engine: DiffEngine::spawn(),
            aggregator,
            pending: None,
            latest_diff: None,
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn store(&self) -> &FramePairStore {
        &self.store
    }

    /// The most recent difference image, if any reply has arrived yet.
    pub fn latest_diff(&self) -> Option<&Arc<PixelBuffer>> {
        self.latest_diff.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            superseded: self.store.superseded(),
            ..self.stats
        }
    }

    /// Runs one tick for `frame`. Returns `None` until the first diff arrives.
    pub fn tick(&mut self, frame: PixelBuffer) -> Result<Option<MotionFrame>> {
        self.stats.ticks += 1;

        let expected = (self.config.frame.width, self.config.frame.height);
        if frame.dimensions() != expected {
            return Err(MotionError::DimensionMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }
        self.store.observe(frame)?;

        self.collect()?;
        self.dispatch()?;
        self.motion_frame()
    }

    /// Waits for the outstanding diff, if any, and applies it. Returns the frame
    /// it produced.
    pub async fn settle(&mut self) -> Result<Option<MotionFrame>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let reply = pending.wait().await;
        self.apply(reply)?;
        self.motion_frame()
    }

    /// Drives `sampler` at the configured tick rate until it runs dry, a fatal
    /// error occurs or `max_ticks` frames have been sampled.
    pub async fn run<S, R>(
        &mut self,
        sampler: &mut S,
        renderer: &mut R,
        max_ticks: Option<u64>,
    ) -> Result<PipelineStats>
    where
        S: FrameSampler + ?Sized,
        R: MotionRenderer + ?Sized,
    {
        sampler.start()?;

        let (width, height) = sampler.dimensions();
        if (width, height) != (self.config.frame.width, self.config.frame.height) {
            return Err(MotionError::Configuration(format!(
                "sampler yields {width}x{height} frames, pipeline expects {}x{}",
                self.config.frame.width, self.config.frame.height
            )));
        }

        let period = self.config.tick_period()?;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            width,
            height,
            grid_x = self.config.grid.resolution_x,
            grid_y = self.config.grid.resolution_y,
            sensitivity = self.config.diff.sensitivity,
            tick_rate_hz = self.config.schedule.tick_rate_hz,
            "motion pipeline started"
        );

        let mut sampled = 0u64;
        loop {
            if max_ticks.is_some_and(|max| sampled >= max) {
                debug!(sampled, "tick limit reached");
                break;
            }
            interval.tick().await;
            sampled += 1;

            let frame = match sampler.sample() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!(sampled, "frame source exhausted");
                    break;
                }
                Err(e) => {
                    self.record_failure(e)?;
                    continue;
                }
            };

            match self.tick(frame) {
                Ok(Some(motion)) => self.render(renderer, &motion)?,
                Ok(None) => {}
                Err(e) => self.record_failure(e)?,
            }
        }

        match self.settle().await {
            Ok(Some(motion)) => self.render(renderer, &motion)?,
            Ok(None) => {}
            Err(e) => self.record_failure(e)?,
        }

        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            dispatched = stats.dispatched,
            completed = stats.completed,
            superseded = stats.superseded,
            failed = stats.failed,
            "motion pipeline stopped"
        );
        Ok(stats)
    }

    /// Stops the diff engine, waiting for any computation still running.
    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }

    fn collect(&mut self) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };
        let Some(reply) = pending.try_take() else {
            return Ok(());
        };
        self.pending = None;
        self.apply(reply)
    }

    fn apply(&mut self, reply: Result<PixelBuffer>) -> Result<()> {
        match reply {
            Ok(diff) => {
                self.store.commit_previous()?;
                self.stats.completed += 1;
                debug!(completed = self.stats.completed, "diff committed");
                self.latest_diff = Some(Arc::new(diff));
                Ok(())
            }
            Err(e) => {
                self.store.abandon_request()?;
                Err(e)
            }
        }
    }

    fn dispatch(&mut self) -> Result<()> {
        let Some(pair) = self.store.begin_request() else {
            return Ok(());
        };
        let submitted = DiffRequest::new(pair.previous, pair.current, self.config.diff.sensitivity)
            .and_then(|request| self.engine.submit(request));

        match submitted {
            Ok(pending) => {
                self.pending = Some(pending);
                self.stats.dispatched += 1;
                debug!(dispatched = self.stats.dispatched, "diff dispatched");
                Ok(())
            }
            Err(e) => {
                self.store.abandon_request()?;
                Err(e)
            }
        }
    }

    fn motion_frame(&self) -> Result<Option<MotionFrame>> {
        let Some(diff) = self.latest_diff.as_ref() else {
            return Ok(None);
        };
        let matrix = self.aggregator.aggregate(diff)?;
        Ok(Some(MotionFrame {
            tick: self.stats.ticks,
            matrix,
            diff: Arc::clone(diff),
        }))
    }

    fn render<R: MotionRenderer + ?Sized>(&mut self, renderer: &mut R, motion: &MotionFrame) -> Result<()> {
        match renderer.render(motion) {
            Ok(()) => Ok(()),
            Err(e) => self.record_failure(e),
        }
    }

    /// Counts a non-fatal error and swallows it. Fatal errors are passed back.
    fn record_failure(&mut self, error: MotionError) -> Result<()> {
        if error.is_fatal() {
            return Err(error);
        }
        self.stats.failed += 1;
        warn!(error = %error, failed = self.stats.failed, "tick failed");
        Ok(())
    }
}
