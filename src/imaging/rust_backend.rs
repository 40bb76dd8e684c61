//! Pure Rust image processing backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect format | `image::guess_format` (magic bytes) |
//! | Decode (PNG, JPEG, BMP, WebP, GIF) | `image::load_from_memory_with_format` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality-aware) |
//! | Encode → PNG / WebP | `DynamicImage::write_to` (lossless) |
//!
//! GIF input is decoded as a single frame (the first). Any other format that
//! `guess_format` recognizes (TIFF, PNM, QOI, ...) is rejected as
//! [`BackendError::UnsupportedFormat`] before a decoder is looked for.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{CropRect, OutputFormat, Quality, SourceFormat};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions the batch harness picks up, paired with the decoder behind them.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("bmp", ImageFormat::Bmp),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

impl From<ImageFormat> for SourceFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => SourceFormat::Png,
            ImageFormat::Jpeg => SourceFormat::Jpeg,
            ImageFormat::Bmp => SourceFormat::Bmp,
            ImageFormat::WebP => SourceFormat::WebP,
            ImageFormat::Gif => SourceFormat::Gif,
            other => SourceFormat::Other(other.extensions_str().first().copied().unwrap_or("unknown")),
        }
    }
}

/// Working state of one decoded image.
pub struct DecodedImage {
    pixels: DynamicImage,
    source_format: SourceFormat,
    quality: Quality,
    output_format: Option<OutputFormat>,
}

impl DecodedImage {
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode as baseline JPEG. JPEG has no alpha channel, so pixels go through RGB8.
fn encode_jpeg(pixels: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = pixels.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

fn encode_lossless(pixels: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    // The WebP encoder only takes 8-bit channels.
    let pixels = match format {
        ImageFormat::WebP => DynamicImage::ImageRgba8(pixels.to_rgba8()),
        _ => pixels.clone(),
    };
    pixels
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| BackendError::Encode(format!("{:?} encode failed: {}", format, e)))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    type Image = DecodedImage;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError> {
        let format = image::guess_format(bytes)
            .map_err(|e| BackendError::Decode(format!("Unrecognized image data: {}", e)))?;
        let source_format = SourceFormat::from(format);
        if let SourceFormat::Other(_) = source_format {
            return Err(BackendError::UnsupportedFormat(source_format));
        }
        let pixels = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            BackendError::Decode(format!("Failed to decode {:?} image: {}", format, e))
        })?;
        Ok(DecodedImage {
            pixels,
            source_format,
            quality: Quality::default(),
            output_format: None,
        })
    }

    fn dimensions(&self, image: &DecodedImage) -> Dimensions {
        Dimensions::new(image.pixels.width(), image.pixels.height())
    }

    fn format(&self, image: &DecodedImage) -> SourceFormat {
        image.source_format
    }

    fn resize(&self, image: &mut DecodedImage, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Transform(format!(
                "Cannot resize to {}x{}",
                width, height
            )));
        }
        image.pixels = image.pixels.resize_exact(width, height, FilterType::Lanczos3);
        Ok(())
    }

    fn set_quality(&self, image: &mut DecodedImage, quality: Quality) -> Result<(), BackendError> {
        image.quality = quality;
        Ok(())
    }

    fn set_format(
        &self,
        image: &mut DecodedImage,
        format: OutputFormat,
    ) -> Result<(), BackendError> {
        image.output_format = Some(format);
        Ok(())
    }

    fn crop(&self, image: &mut DecodedImage, rect: CropRect) -> Result<(), BackendError> {
        let (width, height) = (image.pixels.width(), image.pixels.height());
        let fits_x = rect.x.checked_add(rect.width).is_some_and(|r| r <= width);
        let fits_y = rect.y.checked_add(rect.height).is_some_and(|b| b <= height);
        if !fits_x || !fits_y || rect.width == 0 || rect.height == 0 {
            return Err(BackendError::Transform(format!(
                "Crop {}x{}+{}+{} is outside the {}x{} image",
                rect.width, rect.height, rect.x, rect.y, width, height
            )));
        }
        image.pixels = image.pixels.crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok(())
    }

    fn encode(&self, image: &DecodedImage) -> Result<Vec<u8>, BackendError> {
        let format = image
            .output_format
            .or_else(|| OutputFormat::matching(image.source_format))
            .ok_or_else(|| {
                BackendError::Encode(format!(
                    "No output format set and {} cannot be re-encoded",
                    image.source_format
                ))
            })?;

        match format {
            OutputFormat::Jpeg => encode_jpeg(&image.pixels, image.quality),
            OutputFormat::Png => encode_lossless(&image.pixels, ImageFormat::Png),
            OutputFormat::WebP => encode_lossless(&image.pixels, ImageFormat::WebP),
        }
    }
}
