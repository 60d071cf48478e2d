// THEORY:
// `PixelBuffer` is the unit of exchange between every stage of the motion
// engine: the sampler produces them, the pair store holds them, the diff engine
// consumes two and produces one, and the aggregator reduces one to a grid.
//
// Key architectural principles:
// 1.  **Validated Geometry**: A buffer can only be built when its byte length is
//     exactly `width * height * 4`. Every later stage relies on that and never
//     re-derives it.
// 2.  **Immutable Once Shared**: Stages pass buffers around as `Arc<PixelBuffer>`.
//     The type offers no in-place mutation, so a buffer handed to the diff engine
//     cannot change underneath it.
// 3.  **Row-Major RGBA**: Byte `(y * width + x) * 4` is the red channel of the
//     pixel at column `x`, row `y`. This is the layout of `image::RgbaImage`, so
//     conversion in both directions is a move of the underlying vector.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{MotionError, Result};
use image::RgbaImage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes, rejecting any length that does not match the geometry.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected || data.len() % CHANNELS != 0 {
            return Err(MotionError::MalformedBuffer {
                length: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer in which every pixel equals `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&pixel.to_bytes());
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Number of bytes a `width` x `height` RGBA buffer occupies.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * CHANNELS
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pixel at column `x`, row `y`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let bytes = &self.data[index..index + CHANNELS];
        Some(Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    }

    /// All pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|bytes| Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    }

    /// The `width` pixels of row `y`, or `None` below the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        Some(&self.data[start..start + stride])
    }

    /// Fails unless `other` has exactly this buffer's geometry.
    pub fn ensure_same_dimensions(&self, other: &PixelBuffer) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(MotionError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        Ok(())
    }

    /// Builds a new buffer from corresponding pixels of `self` and `other`.
    pub fn zip_map(
        &self,
        other: &PixelBuffer,
        mut f: impl FnMut(Pixel, Pixel) -> Pixel,
    ) -> Result<PixelBuffer> {
        self.ensure_same_dimensions(other)?;
        let mut data = Vec::with_capacity(self.data.len());
        for (left, right) in self.pixels().zip(other.pixels()) {
            data.extend_from_slice(&f(left, right).to_bytes());
        }
        Ok(PixelBuffer {
            width: self.width,
            height: self.height,
            data,
        })
    }

    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        let (width, height, length) = (self.width, self.height, self.data.len());
        RgbaImage::from_raw(width, height, self.data).ok_or(MotionError::MalformedBuffer {
            length,
            width,
            height,
        })
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_not_matching_geometry() {
        let err = PixelBuffer::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            MotionError::MalformedBuffer {
                length: 15,
                width: 2,
                height: 2
            }
        ));
        assert!(PixelBuffer::new(2, 2, vec![0; 12]).is_err());
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn pixel_lookup_is_row_major() {
        let mut data = vec![0u8; PixelBuffer::byte_len(3, 2)];
        // column 2, row 1 of a 3-wide buffer
        let index = (3 + 2) * 4;
        data[index..index + 4].copy_from_slice(&[9, 8, 7, 6]);
        let buffer = PixelBuffer::new(3, 2, data).unwrap();
        assert_eq!(buffer.pixel(2, 1), Some(Pixel::new(9, 8, 7, 6)));
        assert_eq!(buffer.pixel(1, 2), None);
        assert_eq!(buffer.pixel(3, 0), None);
    }

    #[test]
    fn filled_buffer_repeats_pixel() {
        let buffer = PixelBuffer::filled(4, 3, Pixel::new(1, 2, 3, 4));
        assert_eq!(buffer.len(), 48);
        assert!(buffer.pixels().all(|p| p == Pixel::new(1, 2, 3, 4)));
    }

    #[test]
    fn mismatched_dimensions_are_reported_with_both_sides() {
        let a = PixelBuffer::filled(4, 4, Pixel::default());
        let b = PixelBuffer::filled(4, 2, Pixel::default());
        let err = a.ensure_same_dimensions(&b).unwrap_err();
        assert!(matches!(
            err,
            MotionError::DimensionMismatch {
                expected: (4, 4),
                actual: (4, 2)
            }
        ));
    }

    #[test]
    fn rgba_image_conversion_preserves_layout() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 40]));
        let buffer = PixelBuffer::from(img.clone());
        assert_eq!(buffer.pixel(1, 0), Some(Pixel::new(10, 20, 30, 40)));
        assert_eq!(buffer.into_rgba_image().unwrap(), img);
    }

    #[test]
    fn zip_map_pairs_pixels_in_order() {
        let a = PixelBuffer::new(2, 1, vec![1, 1, 1, 1, 2, 2, 2, 2]).unwrap();
        let b = PixelBuffer::new(2, 1, vec![10, 10, 10, 10, 20, 20, 20, 20]).unwrap();
        let sum = a
            .zip_map(&b, |l, r| Pixel::gray(l.red + r.red))
            .unwrap();
        assert_eq!(sum.pixel(0, 0), Some(Pixel::gray(11)));
        assert_eq!(sum.pixel(1, 0), Some(Pixel::gray(22)));

        let c = PixelBuffer::filled(1, 2, Pixel::default());
        assert!(a.zip_map(&c, |l, _| l).is_err());
    }

    #[test]
    fn row_slices_one_stride() {
        let buffer = PixelBuffer::filled(5, 2, Pixel::gray(3));
        assert_eq!(buffer.row(1).map(<[u8]>::len), Some(20));
        assert!(buffer.row(2).is_none());
    }
}
