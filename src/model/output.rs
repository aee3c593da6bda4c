//! Images produced by a pipeline

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};

/// One generated image
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    image: DynamicImage,
}

impl GeneratedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// PIL-style mode string ("RGB", "RGBA", "L", ...)
    pub fn mode(&self) -> &'static str {
        match self.image.color() {
            ColorType::L8 => "L",
            ColorType::La8 => "LA",
            ColorType::Rgb8 => "RGB",
            ColorType::Rgba8 => "RGBA",
            ColorType::L16 => "I;16",
            ColorType::La16 => "LA;16",
            ColorType::Rgb16 => "RGB;16",
            ColorType::Rgba16 => "RGBA;16",
            ColorType::Rgb32F => "RGBF",
            ColorType::Rgba32F => "RGBAF",
            _ => "unknown",
        }
    }

    /// Save the image, picking the format from the file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)
            .with_context(|| format!("cannot infer image format from {}", path.display()))?;

        // JPEG cannot store alpha or 16-bit samples
        let saved = match format {
            ImageFormat::Jpeg => self.image.to_rgb8().save_with_format(path, format),
            _ => self.image.save_with_format(path, format),
        };
        saved.with_context(|| format!("failed to save image to {}", path.display()))?;

        tracing::debug!("Saved {} to {}", self, path.display());
        Ok(())
    }
}

impl From<DynamicImage> for GeneratedImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl fmt::Display for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<GeneratedImage mode={} size={}x{}>",
            self.mode(),
            self.width(),
            self.height()
        )
    }
}
