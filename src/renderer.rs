// THEORY:
// Renderers are the consumers of the motion engine. Each tick that produces a
// `MotionMatrix` hands a `MotionFrame` to the active renderer, which decides
// how scores become something visible. The engine itself never draws.
//
// `LogRenderer` reports each frame through `tracing`. `PngDumpRenderer` writes
// the raw difference image to disk, one PNG per tick, for offline inspection.
// `RendererChain` fans one frame out to several renderers.

use crate::core_modules::motion_matrix::MotionMatrix;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{MotionError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the engine produced on one tick.
#[derive(Debug, Clone)]
pub struct MotionFrame {
    pub tick: u64,
    pub matrix: MotionMatrix,
    /// The difference image the matrix was aggregated from.
    pub diff: Arc<PixelBuffer>,
}

pub trait MotionRenderer {
    fn render(&mut self, frame: &MotionFrame) -> Result<()>;
}

impl<R: MotionRenderer + ?Sized> MotionRenderer for Box<R> {
    fn render(&mut self, frame: &MotionFrame) -> Result<()> {
        (**self).render(frame)
    }
}

/// Logs the hottest cell and the number of cells above the draw threshold.
#[derive(Debug, Clone, Copy)]
pub struct LogRenderer {
    draw_threshold: u8,
}

impl LogRenderer {
    pub fn new(draw_threshold: u8) -> Self {
        Self { draw_threshold }
    }
}

impl MotionRenderer for LogRenderer {
    fn render(&mut self, frame: &MotionFrame) -> Result<()> {
        let active = frame.matrix.active_cells(self.draw_threshold).count();
        match frame.matrix.max() {
            Some((column, row, score)) if score > self.draw_threshold => info!(
                tick = frame.tick,
                active_cells = active,
                hottest_column = column,
                hottest_row = row,
                hottest_score = score,
                "motion detected"
            ),
            _ => debug!(tick = frame.tick, "no motion"),
        }
        Ok(())
    }
}

/// Writes each tick's difference image to `<dir>/tick_NNNNNN.png`.
#[derive(Debug, Clone)]
pub struct PngDumpRenderer {
    dir: PathBuf,
}

impl PngDumpRenderer {
    /// Creates `dir` if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            MotionError::Configuration(format!("cannot create dump dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, tick: u64) -> PathBuf {
        self.dir.join(format!("tick_{tick:06}.png"))
    }
}

impl MotionRenderer for PngDumpRenderer {
    fn render(&mut self, frame: &MotionFrame) -> Result<()> {
        let path = self.path_for(frame.tick);
        image_helper::save(&path, &frame.diff)
            .map_err(|e| MotionError::Render(format!("{}: {e}", path.display())))
    }
}

/// Renders every frame with each renderer in turn. Stops at the first failure.
#[derive(Default)]
pub struct RendererChain {
    renderers: Vec<Box<dyn MotionRenderer + Send>>,
}

impl RendererChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, renderer: impl MotionRenderer + Send + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl MotionRenderer for RendererChain {
    fn render(&mut self, frame: &MotionFrame) -> Result<()> {
        self.renderers
            .iter_mut()
            .try_for_each(|renderer| renderer.render(frame))
    }
}
