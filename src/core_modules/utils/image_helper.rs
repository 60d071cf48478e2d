pub mod image_helper {
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use image::ImageEncoder;
    use std::path::Path;

    /// Writes `buffer` to `path` as an RGBA PNG.
    pub fn save(path: &Path, buffer: &PixelBuffer) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )?;

        Ok(())
    }
}
