// THEORY:
// The `GridAggregator` reduces a full-resolution difference image to a coarse
// grid of motion scores. It is the spatial pooling step of the engine: tens of
// thousands of per-pixel deltas become a handful of cells, which both shrinks
// the data a renderer must look at and averages away isolated sensor noise.
//
// Key architectural principles:
// 1.  **Fixed Geometry**: The grid is laid out once per session. Construction
//     fails unless the grid evenly divides the frame, so every cell has exactly
//     the same size and no pixel is dropped or counted twice.
// 2.  **Two-Stage Average**: A cell's score is the mean, over its pixels, of each
//     pixel's own R/G/B mean. Alpha never participates. The result is rounded
//     half up.
// 3.  **Exact Arithmetic**: Both averages share the divisor `3 * n`, so the score
//     is computed from the cell's raw channel sum with integer division. The
//     rounding law holds exactly, with no floating-point drift at `x.5`.
// 4.  **Column-Major Output**: Cells are visited column by column, top to bottom,
//     and the `MotionMatrix` is built in that same order.

use crate::core_modules::motion_matrix::MotionMatrix;
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};

/// Sum of the R, G, B channels over one rectangular cell of a buffer.
struct Cell {
    channel_sum: u64,
    pixel_count: u64,
}

impl Cell {
    fn sample(buffer: &PixelBuffer, x0: u32, y0: u32, width: u32, height: u32) -> Self {
        let mut channel_sum = 0u64;
        let start = x0 as usize * CHANNELS;
        let end = start + width as usize * CHANNELS;
        for y in y0..y0 + height {
            let Some(row) = buffer.row(y) else { break };
            for bytes in row[start..end].chunks_exact(CHANNELS) {
                channel_sum += Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]).channel_sum() as u64;
            }
        }
        Self {
            channel_sum,
            pixel_count: width as u64 * height as u64,
        }
    }

    /// `floor(channel_sum / (3 * pixel_count) + 0.5)` in integers.
    fn score(&self) -> u8 {
        if self.pixel_count == 0 {
            return 0;
        }
        let divisor = 6 * self.pixel_count;
        let rounded = (2 * self.channel_sum + 3 * self.pixel_count) / divisor;
        // The per-pixel mean never exceeds 255, so neither does the cell mean.
        rounded.min(u8::MAX as u64) as u8
    }
}

/// Partitions buffers of one fixed size into a fixed grid of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridAggregator {
    /// The width of the frames this aggregator accepts, in pixels.
    image_width: u32,
    /// The height of the frames this aggregator accepts, in pixels.
    image_height: u32,
    /// Number of cell columns.
    resolution_x: u32,
    /// Number of cell rows.
    resolution_y: u32,
    /// The width of a single cell in pixels.
    cell_width: u32,
    /// The height of a single cell in pixels.
    cell_height: u32,
}

impl GridAggregator {
    /// Lays out a `resolution_x` x `resolution_y` grid over `image_width` x `image_height` frames.
    pub fn new(
        image_width: u32,
        image_height: u32,
        resolution_x: u32,
        resolution_y: u32,
    ) -> Result<Self> {
        if resolution_x == 0 || resolution_y == 0 {
            return Err(MotionError::Configuration(format!(
                "grid resolution must be non-zero, got {resolution_x}x{resolution_y}"
            )));
        }
        if image_width % resolution_x != 0 || image_height % resolution_y != 0 {
            return Err(MotionError::Configuration(format!(
                "grid {resolution_x}x{resolution_y} does not evenly divide frame {image_width}x{image_height}"
            )));
        }
        Ok(Self {
            image_width,
            image_height,
            resolution_x,
            resolution_y,
            cell_width: image_width / resolution_x,
            cell_height: image_height / resolution_y,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.resolution_x, self.resolution_y)
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    /// Scores every cell of `buffer`, which must match this grid's frame size.
    pub fn aggregate(&self, buffer: &PixelBuffer) -> Result<MotionMatrix> {
        if buffer.dimensions() != (self.image_width, self.image_height) {
            return Err(MotionError::DimensionMismatch {
                expected: (self.image_width, self.image_height),
                actual: buffer.dimensions(),
            });
        }

        let mut columns = Vec::with_capacity(self.resolution_x as usize);
        for column in 0..self.resolution_x {
            let x0 = column * self.cell_width;
            let scores = (0..self.resolution_y)
                .map(|row| {
                    let y0 = row * self.cell_height;
                    Cell::sample(buffer, x0, y0, self.cell_width, self.cell_height).score()
                })
                .collect();
            columns.push(scores);
        }

        MotionMatrix::from_columns(columns).ok_or_else(|| {
            MotionError::Configuration("aggregated grid produced ragged columns".into())
        })
    }
}

/// One-shot aggregation of `buffer` into a `resolution_x` x `resolution_y` grid.
pub fn aggregate(buffer: &PixelBuffer, resolution_x: u32, resolution_y: u32) -> Result<MotionMatrix> {
    GridAggregator::new(buffer.width(), buffer.height(), resolution_x, resolution_y)?
        .aggregate(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A buffer where the pixel at `(x, y)` is `f(x, y)`.
    fn buffer_from(width: u32, height: u32, f: impl Fn(u32, u32) -> Pixel) -> PixelBuffer {
        let mut data = Vec::with_capacity(PixelBuffer::byte_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y).to_bytes());
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn non_dividing_grid_is_a_configuration_error() {
        let err = GridAggregator::new(10, 8, 3, 2).unwrap_err();
        assert!(matches!(err, MotionError::Configuration(_)));
        assert!(GridAggregator::new(10, 8, 0, 2).is_err());
    }

    #[test]
    fn cell_geometry_follows_resolution() {
        let grid = GridAggregator::new(640, 480, 8, 8).unwrap();
        assert_eq!(grid.cell_size(), (80, 60));
        assert_eq!(grid.resolution(), (8, 8));
    }

    #[test]
    fn rejects_buffer_of_other_size() {
        let grid = GridAggregator::new(16, 16, 2, 2).unwrap();
        let buffer = PixelBuffer::filled(8, 8, Pixel::default());
        assert!(matches!(
            grid.aggregate(&buffer),
            Err(MotionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn output_is_column_major() {
        // 4x2 frame, 2x2 grid of 2x1 cells, each cell a distinct gray level.
        let buffer = buffer_from(4, 2, |x, y| Pixel::gray(match (x / 2, y) {
            (0, 0) => 10,
            (0, 1) => 20,
            (1, 0) => 30,
            _ => 40,
        }));
        let matrix = aggregate(&buffer, 2, 2).unwrap();
        assert_eq!(matrix.columns(), &[vec![10, 20], vec![30, 40]]);
    }

    #[test]
    fn alpha_is_excluded_from_scores() {
        let buffer = PixelBuffer::filled(4, 4, Pixel::new(0, 0, 0, 255));
        let matrix = aggregate(&buffer, 1, 1).unwrap();
        assert_eq!(matrix.get(0, 0), Some(0));
    }

    #[test]
    fn averages_per_pixel_means_then_space() {
        // Pixel means 10 and 40 -> cell mean 25.
        let buffer = buffer_from(2, 1, |x, _| {
            if x == 0 {
                Pixel::new(0, 0, 30, 0)
            } else {
                Pixel::new(120, 0, 0, 99)
            }
        });
        assert_eq!(aggregate(&buffer, 1, 1).unwrap().get(0, 0), Some(25));
    }

    #[test]
    fn half_rounds_up() {
        // Pixel means 127 and 128 -> 127.5 -> 128.
        let buffer = buffer_from(2, 1, |x, _| Pixel::gray(127 + x as u8));
        assert_eq!(aggregate(&buffer, 1, 1).unwrap().get(0, 0), Some(128));
    }

    #[test]
    fn below_half_rounds_down() {
        // Pixel means 1/3 and 0 -> 1/6 -> 0.
        let buffer = buffer_from(2, 1, |x, _| {
            if x == 0 {
                Pixel::new(1, 0, 0, 255)
            } else {
                Pixel::default()
            }
        });
        assert_eq!(aggregate(&buffer, 1, 1).unwrap().get(0, 0), Some(0));
    }

    #[test]
    fn white_frame_scores_maximum_everywhere() {
        let buffer = PixelBuffer::filled(16, 16, Pixel::gray(255));
        let matrix = aggregate(&buffer, 4, 2).unwrap();
        assert_eq!(matrix.resolution_x(), 4);
        assert_eq!(matrix.resolution_y(), 2);
        assert!(matrix.cells().all(|(_, _, score)| score == 255));
    }
}
