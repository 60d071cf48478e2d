use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::MotionError;

/// Configuration for a motion detection session, allowing for tunable behavior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MotionConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Frame geometry, fixed for the whole session.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameConfig {
    #[serde(default = "default_frame_width")]
    pub width: u32,
    #[serde(default = "default_frame_height")]
    pub height: u32,
    /// Flip sampled frames horizontally, the way a webcam preview is shown.
    #[serde(default)]
    pub mirror: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_resolution")]
    pub resolution_x: u32,
    #[serde(default = "default_resolution")]
    pub resolution_y: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    /// How small a per-channel delta may be and still count as motion (0.0-1.0).
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Tokio worker threads. `None` means one per logical CPU.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Cells scoring above this are reported as active.
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: default_frame_width(),
            height: default_frame_height(),
            mirror: false,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution_x: default_resolution(),
            resolution_y: default_resolution(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            draw_threshold: default_draw_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MotionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks everything that would make the pipeline impossible to start.
    pub fn validate(&self) -> Result<(), MotionError> {
        let FrameConfig { width, height, .. } = self.frame;
        let GridConfig {
            resolution_x,
            resolution_y,
        } = self.grid;

        if width == 0 || height == 0 {
            return Err(MotionError::Configuration(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if resolution_x == 0 || resolution_y == 0 {
            return Err(MotionError::Configuration(format!(
                "grid resolution must be non-zero, got {resolution_x}x{resolution_y}"
            )));
        }
        if width % resolution_x != 0 || height % resolution_y != 0 {
            return Err(MotionError::Configuration(format!(
                "grid {resolution_x}x{resolution_y} does not evenly divide frame {width}x{height}"
            )));
        }
        if !(0.0..=1.0).contains(&self.diff.sensitivity) {
            return Err(MotionError::Configuration(format!(
                "sensitivity must lie in [0, 1], got {}",
                self.diff.sensitivity
            )));
        }
        self.tick_period()?;
        if self.runtime.worker_threads == Some(0) {
            return Err(MotionError::Configuration(
                "worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Time between two ticks. The rate must be positive and slow enough
    /// that one period still fits in a `Duration`.
    pub fn tick_period(&self) -> Result<Duration, MotionError> {
        let rate = self.schedule.tick_rate_hz;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(MotionError::Configuration(format!(
                "tick rate must be a positive number of hertz, got {rate}"
            )));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate).map_err(|e| {
            MotionError::Configuration(format!("tick rate {rate} Hz has no usable period: {e}"))
        })?;
        Ok(period.max(Duration::from_micros(1)))
    }

    pub fn worker_threads(&self) -> usize {
        self.runtime.worker_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_resolution() -> u32 {
    8
}
fn default_sensitivity() -> f32 {
    0.5
}
fn default_tick_rate_hz() -> f64 {
    60.0
}
fn default_draw_threshold() -> u8 {
    5
}
fn default_log_level() -> String {
    "info".into()
}
