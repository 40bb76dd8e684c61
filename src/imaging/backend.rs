//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the whole surface the pipeline needs from an
//! image library: decode a blob into a handle, inspect it, mutate it (resize,
//! quality, output format, crop) and encode it back to bytes.
//!
//! The handle is an owned value of the backend's [`ImageBackend::Image`] type.
//! Whoever decodes it owns it; it is released when dropped, on every path out
//! of the caller, so there is no init/teardown pair to forget.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{CropRect, OutputFormat, Quality, SourceFormat};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    /// The blob is a known image format the backend does not accept.
    /// Reported without decoding any pixels.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(SourceFormat),
    #[error("Transform failed: {0}")]
    Transform(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend value can serve many independent pipeline
/// invocations on a thread pool. Handles themselves are never shared.
pub trait ImageBackend: Sync {
    /// Decoded working state for one invocation.
    type Image;

    /// Decode an encoded blob. Fails with [`BackendError::Decode`] if the bytes
    /// are not a recognizable image, and with [`BackendError::UnsupportedFormat`]
    /// if they are one the backend has no decoder for.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, BackendError>;

    /// Current pixel dimensions of the working state.
    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Container format detected at decode time.
    fn format(&self, image: &Self::Image) -> SourceFormat;

    /// Resample to exactly `width x height` with a Lanczos-class filter.
    fn resize(&self, image: &mut Self::Image, width: u32, height: u32)
    -> Result<(), BackendError>;

    /// Compression quality used by the next lossy encode.
    fn set_quality(&self, image: &mut Self::Image, quality: Quality) -> Result<(), BackendError>;

    /// Encoding used by the next [`encode`](Self::encode).
    fn set_format(&self, image: &mut Self::Image, format: OutputFormat)
    -> Result<(), BackendError>;

    /// Keep only `rect`. Fails if the rectangle leaves the image.
    fn crop(&self, image: &mut Self::Image, rect: CropRect) -> Result<(), BackendError>;

    /// Encode the current state.
    fn encode(&self, image: &Self::Image) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock backend that records operations without touching pixels.
    ///
    /// Uses Mutex (not RefCell) so it is Sync like the real backend.
    /// Decode results are popped from the back of `decode_results`.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_results: Mutex<Vec<(Dimensions, SourceFormat)>>,
        pub operations: Arc<Mutex<Vec<RecordedOp>>>,
        pub fail_on: Mutex<Option<FailOn>>,
    }

    /// Operation to fail with a backend error.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailOn {
        /// Decode reports the blob as a known but unaccepted format.
        Unsupported(SourceFormat),
        Resize,
        Quality,
        Crop,
        Encode,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode { len: usize },
        Resize { width: u32, height: u32 },
        SetQuality(u32),
        SetFormat(OutputFormat),
        Crop(CropRect),
        Encode { width: u32, height: u32 },
        Release,
    }

    /// Handle handed out by [`MockBackend`]. Records [`RecordedOp::Release`]
    /// when dropped.
    pub struct MockImage {
        dims: Dimensions,
        format: SourceFormat,
        output: Option<OutputFormat>,
        log: Arc<Mutex<Vec<RecordedOp>>>,
    }

    impl Drop for MockImage {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(RecordedOp::Release);
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(width: u32, height: u32, format: SourceFormat) -> Self {
            Self {
                decode_results: Mutex::new(vec![(Dimensions::new(width, height), format)]),
                ..Self::default()
            }
        }

        pub fn failing_on(self, fail: FailOn) -> Self {
            *self.fail_on.lock().unwrap() = Some(fail);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn check(&self, op: FailOn) -> Result<(), BackendError> {
            if *self.fail_on.lock().unwrap() == Some(op) {
                return Err(BackendError::Transform(format!("mock failure on {op:?}")));
            }
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        type Image = MockImage;

        fn decode(&self, bytes: &[u8]) -> Result<MockImage, BackendError> {
            self.record(RecordedOp::Decode { len: bytes.len() });
            if let Some(FailOn::Unsupported(format)) = *self.fail_on.lock().unwrap() {
                return Err(BackendError::UnsupportedFormat(format));
            }
            let (dims, format) = self
                .decode_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::Decode("No mock image".to_string()))?;
            Ok(MockImage {
                dims,
                format,
                output: None,
                log: Arc::clone(&self.operations),
            })
        }

        fn dimensions(&self, image: &MockImage) -> Dimensions {
            image.dims
        }

        fn format(&self, image: &MockImage) -> SourceFormat {
            image.format
        }

        fn resize(&self, image: &mut MockImage, width: u32, height: u32) -> Result<(), BackendError> {
            self.record(RecordedOp::Resize { width, height });
            self.check(FailOn::Resize)?;
            image.dims = Dimensions::new(width, height);
            Ok(())
        }

        fn set_quality(&self, _image: &mut MockImage, quality: Quality) -> Result<(), BackendError> {
            self.record(RecordedOp::SetQuality(quality.value()));
            self.check(FailOn::Quality)?;
            Ok(())
        }

        fn set_format(
            &self,
            image: &mut MockImage,
            format: OutputFormat,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::SetFormat(format));
            image.output = Some(format);
            Ok(())
        }

        fn crop(&self, image: &mut MockImage, rect: CropRect) -> Result<(), BackendError> {
            self.record(RecordedOp::Crop(rect));
            self.check(FailOn::Crop)?;
            image.dims = Dimensions::new(rect.width, rect.height);
            Ok(())
        }

        /// Encodes to the text `"<format> <w>x<h>"` so tests can read it back.
        fn encode(&self, image: &MockImage) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::Encode {
                width: image.dims.width,
                height: image.dims.height,
            });
            self.check(FailOn::Encode)?;
            let format = image
                .output
                .map(|f| f.extension())
                .unwrap_or(image.format.name());
            Ok(format!("{} {}", format, image.dims).into_bytes())
        }
    }

    #[test]
    fn mock_records_decode_and_release() {
        let backend = MockBackend::with_image(800, 600, SourceFormat::Png);

        let image = backend.decode(b"png").unwrap();
        assert_eq!(backend.dimensions(&image), Dimensions::new(800, 600));
        assert_eq!(backend.format(&image), SourceFormat::Png);
        drop(image);

        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Decode { len: 3 }, RecordedOp::Release]
        );
    }

    #[test]
    fn mock_decode_without_results_errors() {
        let backend = MockBackend::new();
        assert!(matches!(
            backend.decode(b"?"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn mock_resize_updates_dimensions() {
        let backend = MockBackend::with_image(800, 600, SourceFormat::Jpeg);
        let mut image = backend.decode(b"jpeg").unwrap();

        backend.resize(&mut image, 400, 300).unwrap();
        assert_eq!(backend.dimensions(&image), Dimensions::new(400, 300));
        assert_eq!(backend.encode(&image).unwrap(), b"jpeg 400x300");
    }

    #[test]
    fn mock_failure_injection() {
        let backend = MockBackend::with_image(800, 600, SourceFormat::Jpeg).failing_on(FailOn::Crop);
        let mut image = backend.decode(b"jpeg").unwrap();

        let rect = CropRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(matches!(
            backend.crop(&mut image, rect),
            Err(BackendError::Transform(_))
        ));
    }

    #[test]
    fn dimensions_display_and_conversion() {
        let dims = Dimensions::from((1280, 640));
        assert_eq!(dims.to_string(), "1280x640");
        assert_eq!(dims.as_tuple(), (1280, 640));
    }
}
