//! Output file naming.
//!
//! Both variants are named after the input's file stem:
//! - `photo.jpeg` → `photo.jpg` (display) + `photo-thumb.jpg` (thumbnail)
//! - `anim.gif` → `anim.gif` (passed through) + `anim-thumb.jpg`
//!
//! The display variant's extension follows what was actually written: the
//! configured output format when re-encoded, the source format when the input
//! was passed through.

use crate::imaging::OutputFormat;
use crate::pipeline::MainOutput;
use std::path::Path;

/// File names for the two variants of one input.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNames {
    pub main: String,
    pub thumbnail: String,
}

/// Stem of `path`, or `"image"` when it has none (e.g. `..` or an empty path).
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

pub fn output_names(input: &Path, main: &MainOutput, thumbnail: OutputFormat) -> OutputNames {
    let stem = file_stem(input);
    OutputNames {
        main: format!("{}.{}", stem, main.extension()),
        thumbnail: format!("{}-thumb.{}", stem, thumbnail.extension()),
    }
}

/// Case-insensitive extension check against a list like `["jpg", "png"]`.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}
