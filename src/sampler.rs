// THEORY:
// A `FrameSampler` is the motion engine's window onto the outside world: it
// hands the pipeline one RGBA frame per tick. The engine does not care where
// frames come from, only that they arrive with the session's fixed geometry.
//
// Two samplers ship with the crate:
// - `ImageSequenceSampler` plays back a directory of still images, decoding,
//   resizing and optionally mirroring each one with the `image` crate.
// - `MemorySampler` replays frames that are already in memory.
//
// Opening the source happens in `start`. A source that cannot be opened is
// reported as `AcquisitionUnavailable` and never retried here. Once open, a
// single bad frame is a `FrameDecode` error that only costs its own tick.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};
use image::imageops::{self, FilterType};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

pub trait FrameSampler: Send {
    /// Opens the underlying source.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// The fixed geometry of every frame this sampler yields.
    fn dimensions(&self) -> (u32, u32);

    /// The frame for this tick, or `None` once the source is exhausted.
    fn sample(&mut self) -> Result<Option<PixelBuffer>>;
}

/// Flips a frame horizontally, the way a webcam preview is usually shown.
pub fn mirror(frame: PixelBuffer) -> Result<PixelBuffer> {
    let image = frame.into_rgba_image()?;
    Ok(PixelBuffer::from(imageops::flip_horizontal(&image)))
}

/// Plays back the images of a directory, in file-name order, as a video.
pub struct ImageSequenceSampler {
    directory: PathBuf,
    width: u32,
    height: u32,
    mirror: bool,
    repeat: bool,
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSampler {
    pub fn new(directory: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            directory: directory.into(),
            width,
            height,
            mirror: false,
            repeat: false,
            paths: Vec::new(),
            cursor: 0,
        }
    }

    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Start over at the first image instead of ending the stream.
    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }

    fn load(&self, path: &Path) -> Result<PixelBuffer> {
        let decoded = image::open(path)
            .map_err(|e| MotionError::FrameDecode(format!("{}: {e}", path.display())))?
            .to_rgba8();

        let resized = if decoded.dimensions() == (self.width, self.height) {
            decoded
        } else {
            imageops::resize(&decoded, self.width, self.height, FilterType::Triangle)
        };

        let frame = PixelBuffer::from(resized);
        if self.mirror { mirror(frame) } else { Ok(frame) }
    }
}

impl FrameSampler for ImageSequenceSampler {
    fn start(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.directory).map_err(|e| {
            MotionError::AcquisitionUnavailable(format!(
                "cannot read frame directory {}: {e}",
                self.directory.display()
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && Self::is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(MotionError::AcquisitionUnavailable(format!(
                "no images found in {}",
                self.directory.display()
            )));
        }

        info!(
            directory = %self.directory.display(),
            frames = paths.len(),
            width = self.width,
            height = self.height,
            mirror = self.mirror,
            "image sequence opened"
        );
        self.paths = paths;
        self.cursor = 0;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn sample(&mut self) -> Result<Option<PixelBuffer>> {
        if self.cursor >= self.paths.len() {
            if !self.repeat || self.paths.is_empty() {
                return Ok(None);
            }
            debug!("image sequence exhausted, starting over");
            self.cursor = 0;
        }
        let path = self.paths[self.cursor].clone();
        self.cursor += 1;
        self.load(&path).map(Some)
    }
}

/// Yields frames from memory, in order, then ends.
#[derive(Debug, Clone)]
pub struct MemorySampler {
    width: u32,
    height: u32,
    frames: VecDeque<PixelBuffer>,
}

impl MemorySampler {
    pub fn new(width: u32, height: u32, frames: impl IntoIterator<Item = PixelBuffer>) -> Self {
        Self {
            width,
            height,
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSampler for MemorySampler {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn sample(&mut self) -> Result<Option<PixelBuffer>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use image::{Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("motion_grid_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn mirror_flips_columns() {
        let frame = PixelBuffer::new(2, 1, vec![1, 1, 1, 255, 9, 9, 9, 255]).unwrap();
        let flipped = mirror(frame).unwrap();
        assert_eq!(flipped.pixel(0, 0), Some(Pixel::gray(9)));
        assert_eq!(flipped.pixel(1, 0), Some(Pixel::gray(1)));
    }

    #[test]
    fn memory_sampler_yields_in_order_then_ends() {
        let mut sampler = MemorySampler::new(
            1,
            1,
            [Pixel::gray(1), Pixel::gray(2)].map(|p| PixelBuffer::filled(1, 1, p)),
        );
        assert_eq!(sampler.sample().unwrap().unwrap().pixel(0, 0), Some(Pixel::gray(1)));
        assert_eq!(sampler.sample().unwrap().unwrap().pixel(0, 0), Some(Pixel::gray(2)));
        assert!(sampler.sample().unwrap().is_none());
    }

    #[test]
    fn missing_directory_is_acquisition_unavailable() {
        let mut sampler = ImageSequenceSampler::new("/nonexistent/motion_grid_frames", 4, 4);
        let err = sampler.start().unwrap_err();
        assert!(matches!(err, MotionError::AcquisitionUnavailable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn directory_without_images_is_acquisition_unavailable() {
        let dir = scratch_dir("empty_frames");
        std::fs::write(dir.join("notes.txt"), b"not a frame").unwrap();
        let mut sampler = ImageSequenceSampler::new(&dir, 4, 4);
        assert!(matches!(
            sampler.start(),
            Err(MotionError::AcquisitionUnavailable(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn image_sequence_plays_sorted_resized_and_repeats() {
        let dir = scratch_dir("sequence_frames");
        RgbaImage::from_pixel(8, 8, Rgba([200, 200, 200, 255]))
            .save(dir.join("frame_001.png"))
            .unwrap();
        RgbaImage::from_pixel(8, 8, Rgba([10, 10, 10, 255]))
            .save(dir.join("frame_000.png"))
            .unwrap();

        let mut sampler = ImageSequenceSampler::new(&dir, 4, 4).repeating(true);
        sampler.start().unwrap();

        let first = sampler.sample().unwrap().unwrap();
        assert_eq!(first.dimensions(), (4, 4));
        assert_eq!(first.pixel(0, 0), Some(Pixel::gray(10)));
        let second = sampler.sample().unwrap().unwrap();
        assert_eq!(second.pixel(3, 3), Some(Pixel::gray(200)));
        let third = sampler.sample().unwrap().unwrap();
        assert_eq!(third.pixel(0, 0), Some(Pixel::gray(10)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_frame_fails_alone() {
        let dir = scratch_dir("corrupt_frames");
        RgbaImage::from_pixel(4, 4, Rgba([10, 10, 10, 255]))
            .save(dir.join("f0.png"))
            .unwrap();
        std::fs::write(dir.join("f1.png"), b"garbage").unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([90, 90, 90, 255]))
            .save(dir.join("f2.png"))
            .unwrap();

        let mut sampler = ImageSequenceSampler::new(&dir, 4, 4);
        sampler.start().unwrap();
        assert!(sampler.sample().unwrap().is_some());

        let err = sampler.sample().unwrap_err();
        assert!(matches!(err, MotionError::FrameDecode(_)));
        assert!(!err.is_fatal());

        let last = sampler.sample().unwrap().unwrap();
        assert_eq!(last.pixel(0, 0), Some(Pixel::gray(90)));
        assert!(sampler.sample().unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn image_sequence_ends_without_repeat() {
        let dir = scratch_dir("single_frame");
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))
            .save(dir.join("only.png"))
            .unwrap();

        let mut sampler = ImageSequenceSampler::new(&dir, 4, 4);
        sampler.start().unwrap();
        assert!(sampler.sample().unwrap().is_some());
        assert!(sampler.sample().unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
