//! The image transform pipeline.
//!
//! Takes one encoded image blob and produces two variants:
//!
//! - **Main**: the display image, longer side capped at `main_max_side`
//!   (never upscaled), re-encoded at the configured quality and format.
//! - **Thumbnail**: scaled so the shorter side is `thumbnail_max_side`, then
//!   center-cropped to `thumbnail_box`.
//!
//! ## Stages
//!
//! ```text
//! Decode → FormatCheck → Main (per format rule) → Thumbnail → Encode
//! ```
//!
//! Every failure is terminal and names the [`Stage`] it happened in. There is
//! no partial result: either both variants come back, or an error does.
//!
//! ## Format rules
//!
//! What happens to the main image depends on the detected format, looked up
//! in [`FORMAT_RULES`]. Formats without a rule are rejected.
//!
//! | Format | Main image |
//! |---|---|
//! | PNG, JPEG, BMP, WebP | resize + compress + re-encode |
//! | GIF | input bytes passed through unchanged |
//!
//! The thumbnail is made the same way for every format. For GIF it is always
//! planned from the original dimensions; otherwise [`ThumbnailSource`] picks
//! between the resized display image and a fresh decode of the input.

use crate::config::{Config, ThumbnailSource};
use crate::imaging::{
    BackendError, CropRect, Dimensions, ImageBackend, OutputFormat, PlanError, Quality,
    SourceFormat, TargetSpec, plan_center_crop, plan_resize, plan_thumbnail_box,
};
use std::fmt;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Pipeline step, reported with every transform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MainResize,
    /// Quality and output format applied to the handle.
    MainCompress,
    MainEncode,
    ThumbnailResize,
    ThumbnailCompress,
    ThumbnailCrop,
    ThumbnailEncode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::MainResize => "main image resize",
            Stage::MainCompress => "main image compress",
            Stage::MainEncode => "main image encode",
            Stage::ThumbnailResize => "thumbnail resize",
            Stage::ThumbnailCompress => "thumbnail compress",
            Stage::ThumbnailCrop => "thumbnail crop",
            Stage::ThumbnailEncode => "thumbnail encode",
        })
    }
}

#[derive(Error, Debug)]
pub enum TransformCause {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] BackendError),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(SourceFormat),
    #[error("{stage} failed: {cause}")]
    Transform {
        stage: Stage,
        #[source]
        cause: TransformCause,
    },
}

/// Attach the failing [`Stage`] to a backend or planner error.
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, ProcessError>;
}

impl<T, E: Into<TransformCause>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, ProcessError> {
        self.map_err(|e| ProcessError::Transform {
            stage,
            cause: e.into(),
        })
    }
}

/// What the pipeline does with the main image for a given format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainStep {
    ResizeAndCompress,
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRule {
    pub format: SourceFormat,
    pub main: MainStep,
}

/// Accepted input formats. Anything not listed is rejected.
pub const FORMAT_RULES: &[FormatRule] = &[
    FormatRule {
        format: SourceFormat::Png,
        main: MainStep::ResizeAndCompress,
    },
    FormatRule {
        format: SourceFormat::Jpeg,
        main: MainStep::ResizeAndCompress,
    },
    FormatRule {
        format: SourceFormat::Bmp,
        main: MainStep::ResizeAndCompress,
    },
    FormatRule {
        format: SourceFormat::WebP,
        main: MainStep::ResizeAndCompress,
    },
    FormatRule {
        format: SourceFormat::Gif,
        main: MainStep::PassThrough,
    },
];

pub fn rule_for(format: SourceFormat) -> Option<&'static FormatRule> {
    FORMAT_RULES.iter().find(|rule| rule.format == format)
}

/// Thresholds for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub main_max_side: u32,
    pub thumbnail_max_side: u32,
    pub thumbnail_box: (u32, u32),
    pub quality: Quality,
    pub output_format: OutputFormat,
    pub thumbnail_source: ThumbnailSource,
}

impl PipelineConfig {
    /// Build a PipelineConfig from the loaded file config.
    pub fn from_config(config: &Config) -> Self {
        let [box_w, box_h] = config.thumbnail.box_size;
        Self {
            main_max_side: config.main.max_side,
            thumbnail_max_side: config.thumbnail.max_side,
            thumbnail_box: (box_w, box_h),
            quality: Quality::new(config.encoding.quality),
            output_format: config.encoding.format,
            thumbnail_source: config.thumbnail.source,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// An image produced by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
}

/// The display variant.
#[derive(Debug, Clone, PartialEq)]
pub enum MainOutput {
    /// Resized and re-encoded.
    Encoded(EncodedImage),
    /// The input blob, untouched.
    PassThrough {
        bytes: Vec<u8>,
        dimensions: Dimensions,
        format: SourceFormat,
    },
}

impl MainOutput {
    pub fn bytes(&self) -> &[u8] {
        match self {
            MainOutput::Encoded(image) => &image.bytes,
            MainOutput::PassThrough { bytes, .. } => bytes,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match self {
            MainOutput::Encoded(image) => image.dimensions,
            MainOutput::PassThrough { dimensions, .. } => *dimensions,
        }
    }

    pub fn media_type(&self) -> String {
        match self {
            MainOutput::Encoded(image) => image.format.media_type().to_string(),
            MainOutput::PassThrough { format, .. } => format.media_type(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MainOutput::Encoded(image) => image.format.extension(),
            MainOutput::PassThrough { format, .. } => format.extension(),
        }
    }
}

/// Both variants of one input.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub source_format: SourceFormat,
    pub original: Dimensions,
    pub main: MainOutput,
    pub thumbnail: EncodedImage,
}

/// Progress notifications, sent while a single image moves through the stages.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Decoded {
        format: SourceFormat,
        dimensions: Dimensions,
    },
    MainEncoded {
        from: Dimensions,
        to: Dimensions,
        bytes: usize,
    },
    MainPassedThrough {
        bytes: usize,
    },
    ThumbnailEncoded {
        cover: Dimensions,
        crop: CropRect,
        bytes: usize,
    },
}

fn emit(events: Option<&Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // A gone receiver only means nobody is watching.
        tx.send(event).ok();
    }
}

/// Dimensions the pipeline will produce, computed without touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantPlan {
    /// `None` when the main image is passed through.
    pub main: Option<Dimensions>,
    /// Size after the thumbnail cover resize, before cropping.
    pub thumbnail_cover: Dimensions,
    pub thumbnail_crop: CropRect,
}

fn plan_crop(cover: Dimensions, (box_w, box_h): (u32, u32)) -> Result<CropRect, PlanError> {
    let (x, y) = plan_center_crop(cover.width, cover.height, box_w, box_h)?;
    Ok(CropRect {
        x,
        y,
        width: box_w,
        height: box_h,
    })
}

/// Plan both variants for an image of `original` size.
///
/// Mirrors [`process_image`] step for step; the pipeline itself re-reads the
/// real dimensions from the backend after every resize.
pub fn plan_variants(
    original: Dimensions,
    main: MainStep,
    config: &PipelineConfig,
) -> Result<VariantPlan, PlanError> {
    let main_dims = match main {
        MainStep::ResizeAndCompress => Some(Dimensions::from(plan_resize(
            original.as_tuple(),
            TargetSpec::MaxSide(config.main_max_side),
        )?)),
        MainStep::PassThrough => None,
    };

    let thumb_from = match (main_dims, config.thumbnail_source) {
        (Some(dims), ThumbnailSource::Intermediate) => dims,
        _ => original,
    };
    let cover = Dimensions::from(plan_thumbnail_box(
        thumb_from.width,
        thumb_from.height,
        config.thumbnail_max_side,
    )?);

    Ok(VariantPlan {
        main: main_dims,
        thumbnail_cover: cover,
        thumbnail_crop: plan_crop(cover, config.thumbnail_box)?,
    })
}

/// Resize, compress and encode the display variant in place.
fn make_main<B: ImageBackend>(
    backend: &B,
    image: &mut B::Image,
    config: &PipelineConfig,
) -> Result<EncodedImage, ProcessError> {
    let current = backend.dimensions(image);
    let (width, height) =
        plan_resize(current.as_tuple(), TargetSpec::MaxSide(config.main_max_side))
            .at(Stage::MainResize)?;

    backend.resize(image, width, height).at(Stage::MainResize)?;
    backend
        .set_quality(image, config.quality)
        .at(Stage::MainCompress)?;
    backend
        .set_format(image, config.output_format)
        .at(Stage::MainCompress)?;
    let bytes = backend.encode(image).at(Stage::MainEncode)?;

    Ok(EncodedImage {
        bytes,
        dimensions: backend.dimensions(image),
        format: config.output_format,
    })
}

/// Cover-resize, compress, center-crop and encode the thumbnail in place.
fn make_thumbnail<B: ImageBackend>(
    backend: &B,
    image: &mut B::Image,
    config: &PipelineConfig,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<EncodedImage, ProcessError> {
    let current = backend.dimensions(image);
    let (box_w, box_h) = config.thumbnail_box;
    let (width, height) = plan_thumbnail_box(
        current.width,
        current.height,
        config.thumbnail_max_side,
    )
    .at(Stage::ThumbnailResize)?;

    backend
        .resize(image, width, height)
        .at(Stage::ThumbnailResize)?;
    backend
        .set_quality(image, config.quality)
        .at(Stage::ThumbnailCompress)?;
    backend
        .set_format(image, config.output_format)
        .at(Stage::ThumbnailCompress)?;

    let cover = backend.dimensions(image);
    let crop = plan_crop(cover, (box_w, box_h)).at(Stage::ThumbnailCrop)?;
    backend.crop(image, crop).at(Stage::ThumbnailCrop)?;

    let bytes = backend.encode(image).at(Stage::ThumbnailEncode)?;
    emit(
        events,
        ProcessEvent::ThumbnailEncoded {
            cover,
            crop,
            bytes: bytes.len(),
        },
    );

    Ok(EncodedImage {
        bytes,
        dimensions: backend.dimensions(image),
        format: config.output_format,
    })
}

/// A backend that recognizes the format but will not decode it is rejected
/// through the same error as the post-decode format gate.
fn decode_failed(err: BackendError) -> ProcessError {
    match err {
        BackendError::UnsupportedFormat(format) => ProcessError::UnsupportedFormat(format),
        other => ProcessError::Decode(other),
    }
}

/// Run the whole pipeline on one encoded image.
///
/// The decoded handle is owned by this call and dropped on every return path.
pub fn process_image<B: ImageBackend>(
    backend: &B,
    blob: &[u8],
    config: &PipelineConfig,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<ProcessedImage, ProcessError> {
    let mut image = backend.decode(blob).map_err(decode_failed)?;
    let format = backend.format(&image);
    let original = backend.dimensions(&image);
    log::debug!("decoded {} image {}", format, original);
    emit(
        events,
        ProcessEvent::Decoded {
            format,
            dimensions: original,
        },
    );

    let rule = rule_for(format).ok_or(ProcessError::UnsupportedFormat(format))?;

    let main = match rule.main {
        MainStep::ResizeAndCompress => {
            let encoded = make_main(backend, &mut image, config)?;
            log::debug!("main image {} → {}", original, encoded.dimensions);
            emit(
                events,
                ProcessEvent::MainEncoded {
                    from: original,
                    to: encoded.dimensions,
                    bytes: encoded.bytes.len(),
                },
            );
            MainOutput::Encoded(encoded)
        }
        MainStep::PassThrough => {
            log::debug!("{} main image passed through", format);
            emit(
                events,
                ProcessEvent::MainPassedThrough { bytes: blob.len() },
            );
            MainOutput::PassThrough {
                bytes: blob.to_vec(),
                dimensions: original,
                format,
            }
        }
    };

    let thumbnail = match (rule.main, config.thumbnail_source) {
        (MainStep::ResizeAndCompress, ThumbnailSource::Original) => {
            drop(image);
            let mut fresh = backend.decode(blob).map_err(decode_failed)?;
            make_thumbnail(backend, &mut fresh, config, events)?
        }
        _ => make_thumbnail(backend, &mut image, config, events)?,
    };
    log::debug!("thumbnail {}", thumbnail.dimensions);

    Ok(ProcessedImage {
        source_format: format,
        original,
        main,
        thumbnail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{FailOn, MockBackend, RecordedOp};
    use std::sync::mpsc;

    fn releases(ops: &[RecordedOp]) -> usize {
        ops.iter().filter(|op| **op == RecordedOp::Release).count()
    }

    fn decodes(ops: &[RecordedOp]) -> usize {
        ops.iter()
            .filter(|op| matches!(op, RecordedOp::Decode { .. }))
            .count()
    }

    // =========================================================================
    // Format rules
    // =========================================================================

    #[test]
    fn rules_cover_the_five_accepted_formats() {
        for format in [
            SourceFormat::Png,
            SourceFormat::Jpeg,
            SourceFormat::Bmp,
            SourceFormat::WebP,
        ] {
            assert_eq!(rule_for(format).unwrap().main, MainStep::ResizeAndCompress);
        }
        assert_eq!(
            rule_for(SourceFormat::Gif).unwrap().main,
            MainStep::PassThrough
        );
        assert!(rule_for(SourceFormat::Other("tiff")).is_none());
    }

    #[test]
    fn pipeline_config_default_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.main_max_side, 1280);
        assert_eq!(config.thumbnail_max_side, 500);
        assert_eq!(config.thumbnail_box, (500, 400));
        assert_eq!(config.quality, Quality::new(85));
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.thumbnail_source, ThumbnailSource::Intermediate);
    }

    // =========================================================================
    // Non-GIF path
    // =========================================================================

    #[test]
    fn landscape_jpeg_scenario() {
        let backend = MockBackend::with_image(2000, 1000, SourceFormat::Jpeg);
        let result =
            process_image(&backend, b"jpeg", &PipelineConfig::default(), None).unwrap();

        assert_eq!(result.original, Dimensions::new(2000, 1000));
        assert_eq!(result.main.dimensions(), Dimensions::new(1280, 640));
        assert_eq!(result.main.bytes(), b"jpg 1280x640");
        assert_eq!(result.thumbnail.dimensions, Dimensions::new(500, 400));

        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Decode { len: 4 },
                RecordedOp::Resize {
                    width: 1280,
                    height: 640
                },
                RecordedOp::SetQuality(85),
                RecordedOp::SetFormat(OutputFormat::Jpeg),
                RecordedOp::Encode {
                    width: 1280,
                    height: 640
                },
                RecordedOp::Resize {
                    width: 1000,
                    height: 500
                },
                RecordedOp::SetQuality(85),
                RecordedOp::SetFormat(OutputFormat::Jpeg),
                RecordedOp::Crop(CropRect {
                    x: 250,
                    y: 50,
                    width: 500,
                    height: 400
                }),
                RecordedOp::Encode {
                    width: 500,
                    height: 400
                },
                RecordedOp::Release,
            ]
        );
    }

    #[test]
    fn small_portrait_png_is_not_upscaled() {
        let backend = MockBackend::with_image(400, 600, SourceFormat::Png);
        let result = process_image(&backend, b"png", &PipelineConfig::default(), None).unwrap();

        assert_eq!(result.main.dimensions(), Dimensions::new(400, 600));
        assert_eq!(result.thumbnail.dimensions, Dimensions::new(500, 400));

        let ops = backend.get_operations();
        // Main resize is a no-op size, thumbnail covers to 500x750
        assert!(ops.contains(&RecordedOp::Resize {
            width: 400,
            height: 600
        }));
        assert!(ops.contains(&RecordedOp::Resize {
            width: 500,
            height: 750
        }));
        assert!(ops.contains(&RecordedOp::Crop(CropRect {
            x: 0,
            y: 175,
            width: 500,
            height: 400
        })));
    }

    #[test]
    fn square_box_configuration() {
        let backend = MockBackend::with_image(2000, 1000, SourceFormat::WebP);
        let config = PipelineConfig {
            thumbnail_box: (500, 500),
            ..Default::default()
        };
        let result = process_image(&backend, b"webp", &config, None).unwrap();
        assert_eq!(result.thumbnail.dimensions, Dimensions::new(500, 500));
    }

    #[test]
    fn thumbnail_from_original_redecodes() {
        let backend = MockBackend::new();
        // Popped from the back: first decode, then the fresh one
        *backend.decode_results.lock().unwrap() = vec![
            (Dimensions::new(3000, 1999), SourceFormat::Jpeg),
            (Dimensions::new(3000, 1999), SourceFormat::Jpeg),
        ];
        let config = PipelineConfig {
            thumbnail_source: ThumbnailSource::Original,
            ..Default::default()
        };

        let result = process_image(&backend, b"jpeg", &config, None).unwrap();
        assert_eq!(result.main.dimensions(), Dimensions::new(1280, 852));

        let ops = backend.get_operations();
        assert_eq!(decodes(&ops), 2);
        assert_eq!(releases(&ops), 2);
        // 500 * 3000/1999 = 750.375 → 750, planned from the original
        assert!(ops.contains(&RecordedOp::Resize {
            width: 750,
            height: 500
        }));
    }

    #[test]
    fn thumbnail_from_intermediate_uses_resized_size() {
        let backend = MockBackend::with_image(3000, 1999, SourceFormat::Jpeg);
        process_image(&backend, b"jpeg", &PipelineConfig::default(), None).unwrap();

        // 500 * 1280/852 = 751.17 → 751
        assert!(backend.get_operations().contains(&RecordedOp::Resize {
            width: 751,
            height: 500
        }));
    }

    // =========================================================================
    // GIF path
    // =========================================================================

    #[test]
    fn gif_main_is_passed_through() {
        let backend = MockBackend::with_image(2000, 1000, SourceFormat::Gif);
        let blob = b"GIF89a-original-bytes";
        let result = process_image(&backend, blob, &PipelineConfig::default(), None).unwrap();

        assert_eq!(result.main.bytes(), blob);
        assert!(matches!(result.main, MainOutput::PassThrough { .. }));
        assert_eq!(result.main.media_type(), "image/gif");
        assert_eq!(result.main.extension(), "gif");
        assert_eq!(result.thumbnail.dimensions, Dimensions::new(500, 400));

        let ops = backend.get_operations();
        // Only the thumbnail resize: planned from 2000x1000 directly
        let resizes: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, RecordedOp::Resize { .. }))
            .collect();
        assert_eq!(
            resizes,
            vec![&RecordedOp::Resize {
                width: 1000,
                height: 500
            }]
        );
    }

    #[test]
    fn gif_ignores_original_thumbnail_source() {
        let backend = MockBackend::with_image(300, 600, SourceFormat::Gif);
        let config = PipelineConfig {
            thumbnail_source: ThumbnailSource::Original,
            ..Default::default()
        };
        process_image(&backend, b"gif", &config, None).unwrap();
        assert_eq!(decodes(&backend.get_operations()), 1);
    }

    // =========================================================================
    // Errors and handle release
    // =========================================================================

    #[test]
    fn decode_failure_is_decode_error() {
        let backend = MockBackend::new();
        let result = process_image(&backend, b"junk", &PipelineConfig::default(), None);
        assert!(matches!(result, Err(ProcessError::Decode(_))));
    }

    #[test]
    fn unsupported_format_produces_nothing() {
        let backend = MockBackend::with_image(100, 100, SourceFormat::Other("tiff"));
        let result = process_image(&backend, b"tiff", &PipelineConfig::default(), None);

        assert!(matches!(
            result,
            Err(ProcessError::UnsupportedFormat(SourceFormat::Other("tiff")))
        ));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Decode { len: 4 }, RecordedOp::Release]
        );
    }

    #[test]
    fn unsupported_format_message_names_format() {
        let err = ProcessError::UnsupportedFormat(SourceFormat::Other("tiff"));
        assert_eq!(err.to_string(), "Unsupported image format: TIFF");
    }

    #[test]
    fn resize_failure_names_stage_and_releases_handle() {
        let backend =
            MockBackend::with_image(2000, 1000, SourceFormat::Jpeg).failing_on(FailOn::Resize);
        let result = process_image(&backend, b"jpeg", &PipelineConfig::default(), None);

        assert!(matches!(
            result,
            Err(ProcessError::Transform {
                stage: Stage::MainResize,
                cause: TransformCause::Backend(_)
            })
        ));
        assert_eq!(releases(&backend.get_operations()), 1);
    }

    #[test]
    fn crop_failure_aborts_without_output() {
        let backend =
            MockBackend::with_image(2000, 1000, SourceFormat::Png).failing_on(FailOn::Crop);
        let result = process_image(&backend, b"png", &PipelineConfig::default(), None);

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Transform {
                stage: Stage::ThumbnailCrop,
                ..
            }
        ));
        assert!(err.to_string().starts_with("thumbnail crop failed"));
        assert_eq!(releases(&backend.get_operations()), 1);
    }

    #[test]
    fn encode_failure_names_main_stage() {
        let backend =
            MockBackend::with_image(800, 600, SourceFormat::Bmp).failing_on(FailOn::Encode);
        let result = process_image(&backend, b"bmp", &PipelineConfig::default(), None);
        assert!(matches!(
            result,
            Err(ProcessError::Transform {
                stage: Stage::MainEncode,
                ..
            })
        ));
    }

    #[test]
    fn quality_failure_names_compress_stage() {
        let backend =
            MockBackend::with_image(2000, 1000, SourceFormat::Png).failing_on(FailOn::Quality);
        let err = process_image(&backend, b"png", &PipelineConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Transform {
                stage: Stage::MainCompress,
                ..
            }
        ));
        assert!(err.to_string().starts_with("main image compress failed"));
        assert_eq!(releases(&backend.get_operations()), 1);
    }

    #[test]
    fn recognized_but_undecodable_format_is_unsupported() {
        let backend = MockBackend::with_image(10, 10, SourceFormat::Png)
            .failing_on(FailOn::Unsupported(SourceFormat::Other("pbm")));
        let result = process_image(&backend, b"P1", &PipelineConfig::default(), None);

        assert!(matches!(
            result,
            Err(ProcessError::UnsupportedFormat(SourceFormat::Other("pbm")))
        ));
        // Nothing was decoded, so there is no handle to release
        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode { len: 2 }]);
    }

    #[test]
    fn box_larger_than_cover_is_crop_error() {
        let backend = MockBackend::with_image(800, 600, SourceFormat::Png);
        let config = PipelineConfig {
            // Cover is 666x500, narrower than the box
            thumbnail_box: (700, 400),
            ..Default::default()
        };
        let result = process_image(&backend, b"png", &config, None);
        assert!(matches!(
            result,
            Err(ProcessError::Transform {
                stage: Stage::ThumbnailCrop,
                cause: TransformCause::Plan(PlanError::CropOutOfRange { .. })
            })
        ));
    }

    #[test]
    fn zero_sized_image_is_plan_error() {
        let backend = MockBackend::with_image(0, 600, SourceFormat::Png);
        let result = process_image(&backend, b"png", &PipelineConfig::default(), None);
        assert!(matches!(
            result,
            Err(ProcessError::Transform {
                stage: Stage::MainResize,
                cause: TransformCause::Plan(PlanError::ZeroDimension { .. })
            })
        ));
        assert_eq!(releases(&backend.get_operations()), 1);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn events_follow_stages() {
        let backend = MockBackend::with_image(2000, 1000, SourceFormat::Jpeg);
        let (tx, rx) = mpsc::channel();
        process_image(&backend, b"jpeg", &PipelineConfig::default(), Some(&tx)).unwrap();
        drop(tx);

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            ProcessEvent::Decoded {
                format: SourceFormat::Jpeg,
                dimensions: Dimensions::new(2000, 1000)
            }
        );
        assert!(matches!(
            events[1],
            ProcessEvent::MainEncoded { to, .. } if to == Dimensions::new(1280, 640)
        ));
        assert!(matches!(
            events[2],
            ProcessEvent::ThumbnailEncoded { cover, .. } if cover == Dimensions::new(1000, 500)
        ));
    }

    #[test]
    fn events_survive_dropped_receiver() {
        let backend = MockBackend::with_image(100, 100, SourceFormat::Gif);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(process_image(&backend, b"gif", &PipelineConfig::default(), Some(&tx)).is_ok());
    }

    // =========================================================================
    // plan_variants
    // =========================================================================

    #[test]
    fn plan_variants_matches_pipeline() {
        let config = PipelineConfig::default();
        let plan = plan_variants(
            Dimensions::new(2000, 1000),
            MainStep::ResizeAndCompress,
            &config,
        )
        .unwrap();

        assert_eq!(plan.main, Some(Dimensions::new(1280, 640)));
        assert_eq!(plan.thumbnail_cover, Dimensions::new(1000, 500));
        assert_eq!(
            plan.thumbnail_crop,
            CropRect {
                x: 250,
                y: 50,
                width: 500,
                height: 400
            }
        );
    }

    #[test]
    fn plan_variants_pass_through_uses_original() {
        let plan = plan_variants(
            Dimensions::new(400, 600),
            MainStep::PassThrough,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.main, None);
        assert_eq!(plan.thumbnail_cover, Dimensions::new(500, 750));
    }

    #[test]
    fn plan_variants_rejects_zero_size() {
        let result = plan_variants(
            Dimensions::new(0, 10),
            MainStep::PassThrough,
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(PlanError::ZeroDimension { .. })));
    }
}
