// THEORY:
// This file is the entry point for the `motion_grid` library crate. It exposes
// the motion engine as a handful of building blocks plus the pipeline that
// wires them together:
//
// - `core_modules` holds the pixel types, the frame pair store, the diff engine
//   and the grid aggregator. These know nothing about where frames come from or
//   how results are shown.
// - `sampler` and `renderer` are the boundaries to the outside world, expressed
//   as traits so callers can plug in their own sources and sinks.
// - `pipeline` runs the tick loop between them.
// - `config` and `error` are shared by everything above.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod sampler;

pub use config::{ConfigError, MotionConfig};
pub use core_modules::motion_matrix::MotionMatrix;
pub use core_modules::pixel_buffer::PixelBuffer;
pub use error::{MotionError, Result};
pub use pipeline::{MotionPipeline, PipelineStats};
pub use renderer::{LogRenderer, MotionFrame, MotionRenderer, PngDumpRenderer, RendererChain};
pub use sampler::{FrameSampler, ImageSequenceSampler, MemorySampler};
