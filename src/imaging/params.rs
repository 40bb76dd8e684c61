//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! vocabulary shared by the [`calculations`](super::calculations) planners,
//! the [`pipeline`](crate::pipeline) (which decides what to produce) and the
//! [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`SourceFormat`]: Container format detected when decoding an input blob.
//! - [`OutputFormat`]: Encoding used when writing a transformed image.
//! - [`TargetSpec`]: A resize constraint: longest side cap or exact box.
//! - [`CropRect`]: Region kept by a crop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
///
/// Only built through [`Quality::new`], so the value always fits the
/// encoders' `u8` range:
///
/// ```compile_fail
/// let q = thumbkit::imaging::Quality(300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Format of a decoded input image.
///
/// Only the five named formats are accepted by the pipeline. Anything else the
/// decoder recognizes is reported as [`SourceFormat::Other`] with the codec's
/// short name, so the caller can say *what* was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Png,
    Jpeg,
    Bmp,
    WebP,
    Gif,
    Other(&'static str),
}

impl SourceFormat {
    /// Lowercase name, used for file extensions and `image/<name>` media types.
    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::Png => "png",
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Bmp => "bmp",
            SourceFormat::WebP => "webp",
            SourceFormat::Gif => "gif",
            SourceFormat::Other(name) => name,
        }
    }

    pub fn media_type(self) -> String {
        format!("image/{}", self.name())
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpg",
            other => other.name(),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// Serialized as the lowercase name, `"tiff"` included.
impl Serialize for SourceFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Encoding applied to transformed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// The output format that re-encodes `source` in kind, if there is one.
    pub fn matching(source: SourceFormat) -> Option<Self> {
        match source {
            SourceFormat::Jpeg => Some(OutputFormat::Jpeg),
            SourceFormat::Png => Some(OutputFormat::Png),
            SourceFormat::WebP => Some(OutputFormat::WebP),
            _ => None,
        }
    }
}

/// A resize constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSpec {
    /// Keep the aspect ratio; the longer side is capped at `n` (never upscaled).
    MaxSide(u32),
    /// Exact `width x height` output, reached by scale-to-cover then center crop.
    FixedBox(u32, u32),
}

/// Region of an image kept by a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
