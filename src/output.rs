//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! beach.jpg
//!     Decoded: JPEG 4000x3000
//!     Main: 4000x3000 → 1280x960 (212.4 KB)
//!     Thumbnail: cover 666x500, crop 500x400 at (83, 50) (38.1 KB)
//!     Wrote out/beach.jpg
//!     Wrote out/beach-thumb.jpg
//! Done in 0.84s
//! ```
//!
//! ## Plan
//!
//! ```text
//! Original: 3000x1999
//! Main: 1280x852
//! Thumbnail cover: 751x500
//! Thumbnail crop: 500x400 at (125, 50)
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 beach.jpg → out/beach.jpg, out/beach-thumb.jpg
//! 002 party.gif → out/party.gif (passed through), out/party-thumb.jpg
//! 003 notes.png FAILED: Failed to decode image: ...
//! Processed 2 of 3 images, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::batch::{BatchError, FileReport};
use crate::imaging::Dimensions;
use crate::pipeline::{ProcessEvent, VariantPlan};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count: `512 B`, `38.1 KB`, `2.4 MB`.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// `data:<media type>;base64,<payload>`
pub fn to_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

// ============================================================================
// Process
// ============================================================================

/// Format one progress event as indented context lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Decoded { format, dimensions } => {
            vec![format!("    Decoded: {} {}", format, dimensions)]
        }
        ProcessEvent::MainEncoded { from, to, bytes } => {
            vec![format!(
                "    Main: {} \u{2192} {} ({})",
                from,
                to,
                format_size(*bytes)
            )]
        }
        ProcessEvent::MainPassedThrough { bytes } => {
            vec![format!("    Main: passed through ({})", format_size(*bytes))]
        }
        ProcessEvent::ThumbnailEncoded { cover, crop, bytes } => {
            vec![format!(
                "    Thumbnail: cover {}, crop {}x{} at ({}, {}) ({})",
                cover,
                crop.width,
                crop.height,
                crop.x,
                crop.y,
                format_size(*bytes)
            )]
        }
    }
}

pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

/// Lines listing the files written for one input.
pub fn format_written(report: &FileReport) -> Vec<String> {
    vec![
        format!("    Wrote {}", report.main_path.display()),
        format!("    Wrote {}", report.thumbnail_path.display()),
    ]
}

pub fn print_written(report: &FileReport) {
    for line in format_written(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan(original: Dimensions, plan: &VariantPlan) -> Vec<String> {
    let crop = &plan.thumbnail_crop;
    vec![
        format!("Original: {}", original),
        match plan.main {
            Some(dims) => format!("Main: {}", dims),
            None => "Main: passed through".to_string(),
        },
        format!("Thumbnail cover: {}", plan.thumbnail_cover),
        format!(
            "Thumbnail crop: {}x{} at ({}, {})",
            crop.width, crop.height, crop.x, crop.y
        ),
    ]
}

pub fn print_plan(original: Dimensions, plan: &VariantPlan) {
    for line in format_plan(original, plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One line per input in order, then a totals line.
pub fn format_batch_summary(results: &[Result<FileReport, BatchError>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut failed = 0;

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(report) => {
                let passed = if report.main_passed_through {
                    " (passed through)"
                } else {
                    ""
                };
                lines.push(format!(
                    "{} {} \u{2192} {}{}, {}",
                    format_index(i + 1),
                    file_name(&report.input),
                    report.main_path.display(),
                    passed,
                    report.thumbnail_path.display()
                ));
            }
            Err(e) => {
                failed += 1;
                let detail = match e {
                    BatchError::Io { source, .. } => source.to_string(),
                    BatchError::Process { source, .. } => source.to_string(),
                    BatchError::WouldOverwriteInput { output, .. } => {
                        format!("would overwrite the input with {}", output.display())
                    }
                    BatchError::DuplicateOutput { first, .. } => {
                        format!("output names already used by {}", file_name(first))
                    }
                };
                lines.push(format!(
                    "{} {} FAILED: {}",
                    format_index(i + 1),
                    file_name(e.path()),
                    detail
                ));
            }
        }
    }

    let summary = format!(
        "Processed {} of {} images",
        results.len() - failed,
        results.len()
    );
    lines.push(if failed > 0 {
        format!("{}, {} failed", summary, failed)
    } else {
        summary
    });
    lines
}

pub fn print_batch_summary(results: &[Result<FileReport, BatchError>]) {
    for line in format_batch_summary(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
