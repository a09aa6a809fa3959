//! The `Source` capability set and the result of a fetch
//!
//! A source is one concrete origin of pixels for an image: the original
//! file, a pregenerated thumbnail, an internal cache. Every source can
//! declare its output size and predict its own duration without touching
//! storage; optional capabilities (streaming, decoding an open stream,
//! persisting a result) are advertised through [`Capabilities`] so callers
//! check a flag instead of probing types at runtime.

use crate::types::{ImageId, Orientation, Size};
use bitflags::bitflags;
use image::DynamicImage;
use std::fmt;
use std::io::{BufRead, Seek};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by sources and passed through decorators unchanged
///
/// Results are shared between coalesced callers and kept in caches, so the
/// error is `Clone` and carries rendered messages rather than source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A backend the feature depends on is not configured
    #[error("not available: {0}")]
    NotAvailable(String),
    /// The source cannot handle this file (filtered extension, missing codec)
    #[error("not supported: {0}")]
    NotSupported(String),
    /// The attempt failed (I/O, decode, external process); worth retrying later
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl SourceError {
    pub fn is_not_supported(&self) -> bool {
        matches!(self, SourceError::NotSupported(_))
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Fetch(err.to_string())
    }
}

impl From<image::ImageError> for SourceError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => SourceError::NotSupported(e.to_string()),
            other => SourceError::Fetch(other.to_string()),
        }
    }
}

/// Outcome of fetching one image from one source
///
/// `image == None && error == None` is a definitive "not available" and is
/// safe to cache; a set `error` means the attempt failed.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub image: Option<Arc<DynamicImage>>,
    pub orientation: Option<Orientation>,
    pub error: Option<SourceError>,
    /// Set by caching decorators when the result did not come from a fresh fetch
    pub from_cache: bool,
}

impl FetchResult {
    pub fn image(image: DynamicImage, orientation: Orientation) -> Self {
        Self {
            image: Some(Arc::new(image)),
            orientation: Some(orientation),
            error: None,
            from_cache: false,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn error(error: SourceError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.image.is_some() && self.error.is_none()
    }

    /// Size of the decoded buffer, if any
    pub fn size(&self) -> Option<Size> {
        self.image
            .as_ref()
            .map(|img| Size::new(img.width(), img.height()))
    }
}

bitflags! {
    /// Operations a source supports beyond the mandatory name/size/estimate
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const EXISTS = 1 << 0;
        const GET = 1 << 1;
        const READER = 1 << 2;
        const DECODE = 1 << 3;
        const SET = 1 << 4;
    }
}

/// Seekable buffered stream handed out by streaming sources
pub trait ReadSeek: BufRead + Seek + Send {}

impl<T: BufRead + Seek + Send> ReadSeek for T {}

/// One interchangeable origin of pixels for an image
pub trait Source: Send + Sync {
    /// Unique name, used as part of every cache key
    fn name(&self) -> &str;

    /// Human readable description for diagnostics
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Declared output size for an original of `original` size; no I/O
    fn size(&self, original: Size) -> Size;

    /// Predicted fetch duration for an output of `size`; no I/O
    fn duration_estimate(&self, size: Size) -> Duration;

    fn capabilities(&self) -> Capabilities {
        Capabilities::EXISTS | Capabilities::GET
    }

    fn exists(&self, id: ImageId, path: &Path) -> bool;

    fn get(&self, id: ImageId, path: &Path) -> FetchResult;

    /// Open a stream over the stored bytes
    fn reader(&self, _id: ImageId, _path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
        Err(SourceError::NotSupported(format!(
            "reader not supported by {}",
            self.name()
        )))
    }

    /// Decode an already open stream
    fn decode(&self, _reader: &mut dyn ReadSeek) -> FetchResult {
        FetchResult::error(SourceError::NotSupported(format!(
            "decoder not supported by {}",
            self.name()
        )))
    }

    /// Persist a computed result; returns false when not stored
    fn set(&self, _id: ImageId, _path: &Path, _result: &FetchResult) -> bool {
        false
    }

    fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

impl fmt::Debug for dyn Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Shared handle to a source, the form sources are registered and composed in
pub type SharedSource = Arc<dyn Source>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl Source for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn size(&self, original: Size) -> Size {
            original
        }

        fn duration_estimate(&self, _size: Size) -> Duration {
            Duration::from_millis(1)
        }

        fn exists(&self, _id: ImageId, _path: &Path) -> bool {
            true
        }

        fn get(&self, _id: ImageId, _path: &Path) -> FetchResult {
            FetchResult::not_found()
        }
    }

    #[test]
    fn test_default_capabilities_are_fetch_only() {
        let source = Bare;
        assert_eq!(source.capabilities(), Capabilities::EXISTS | Capabilities::GET);
        assert!(!source.capabilities().contains(Capabilities::READER));

        let err = source.reader(ImageId(1), Path::new("a.jpg")).err().unwrap();
        assert!(err.is_not_supported());

        let decoded = source.decode(&mut std::io::Cursor::new(Vec::<u8>::new()));
        assert!(decoded.error.unwrap().is_not_supported());
        assert!(!source.set(ImageId(1), Path::new("a.jpg"), &FetchResult::not_found()));
    }

    #[test]
    fn test_fetch_result_states() {
        let negative = FetchResult::not_found();
        assert!(!negative.is_ok());
        assert!(negative.error.is_none());

        let ok = FetchResult::image(DynamicImage::new_rgb8(4, 3), Orientation::Normal);
        assert!(ok.is_ok());
        assert_eq!(ok.size(), Some(Size::new(4, 3)));

        let failed = FetchResult::error(SourceError::Fetch("disk".into()));
        assert!(!failed.is_ok());
        assert_eq!(failed.error.unwrap().to_string(), "fetch failed: disk");
    }
}
