//! # Thumbkit
//!
//! Turns one uploaded image into two web-ready variants: a display image whose
//! longer side is bounded, and a thumbnail cropped to an exact box.
//!
//! # Architecture: One Decode, Two Variants
//!
//! ```text
//! bytes ─ decode ─┬─ main:      resize to max side 1280 → JPEG q85
//!                 │             (GIF: original bytes, untouched)
//!                 └─ thumbnail: resize so the shorter side is 500
//!                               → center crop 500x400 → JPEG q85
//! ```
//!
//! The thumbnail is derived from the already-resized main image by default,
//! so the whole pipeline decodes once and resizes twice. Everything that
//! touches pixels sits behind the [`imaging::ImageBackend`] trait; the
//! dimension math is plain functions, so almost every rule is unit tested
//! without encoding a single image.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension planners, operation parameters, the backend trait and the `image`-crate backend |
//! | [`pipeline`] | The per-image pipeline: format gate, main variant, thumbnail, stage-tagged errors |
//! | [`config`] | `thumbkit.toml` loading, merging over stock defaults, validation |
//! | [`naming`] | Output file names derived from the input stem |
//! | [`batch`] | Reading inputs from disk, writing variants, parallel directory runs |
//! | [`output`] | CLI output formatting for progress, plans and batch summaries |
//!
//! # Design Decisions
//!
//! ## Truncating Dimension Math
//!
//! Scaled sides are computed in `f32` and truncated toward zero, never rounded.
//! A 3000x1999 photo becomes 1280x852, not 1280x853. A side that truncates to
//! zero is an error rather than a silent 1px image.
//!
//! ## GIF Pass-Through
//!
//! Re-encoding an animated GIF as a still JPEG would throw the animation away,
//! so the display variant of a GIF is the original blob. Its thumbnail is still
//! a JPEG built from the first frame.
//!
//! ## Format Rules as Data
//!
//! Which formats are accepted, and what happens to each, lives in one table
//! ([`pipeline::FORMAT_RULES`]). Adding a format is one row, not a new branch
//! in three places.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
