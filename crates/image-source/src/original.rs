//! Leaf source that decodes the original file
//!
//! Always the most faithful and usually the most expensive source: its cost
//! grows with the pixel area of the original.

use crate::config::DurationModel;
use crate::source::{Capabilities, FetchResult, ReadSeek, Source, SourceError};
use crate::types::{ImageId, Orientation, Size};
use image::ImageReader;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;
use std::time::Duration;

/// Decode any format the `image` crate recognizes from an open stream
pub fn decode_stream<R: BufRead + Seek>(reader: R, orientation: Option<Orientation>) -> FetchResult {
    let decoded = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(SourceError::from)
        .and_then(|r| r.decode().map_err(SourceError::from));

    match decoded {
        Ok(img) => FetchResult {
            orientation,
            ..FetchResult::image(img, orientation.unwrap_or_default())
        },
        Err(e) => FetchResult::error(e),
    }
}

pub(crate) fn open_file(path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
    let file = File::open(path)
        .map_err(|e| SourceError::Fetch(format!("unable to open {}: {}", path.display(), e)))?;
    Ok(Box::new(BufReader::new(file)))
}

pub struct OriginalSource {
    name: String,
    cost: DurationModel,
}

impl OriginalSource {
    pub fn new(name: impl Into<String>, cost: DurationModel) -> Self {
        Self {
            name: name.into(),
            cost,
        }
    }
}

impl Default for OriginalSource {
    fn default() -> Self {
        Self::new("original", DurationModel::per_megapixel(Duration::from_millis(20)))
    }
}

impl Source for OriginalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        "Original"
    }

    fn size(&self, original: Size) -> Size {
        original
    }

    fn duration_estimate(&self, size: Size) -> Duration {
        self.cost.estimate(size)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::EXISTS | Capabilities::GET | Capabilities::READER | Capabilities::DECODE
    }

    fn exists(&self, _id: ImageId, path: &Path) -> bool {
        path.is_file()
    }

    /// Orientation is left unset: the original's orientation lives in its metadata
    fn get(&self, id: ImageId, path: &Path) -> FetchResult {
        match self.reader(id, path) {
            Ok(reader) => decode_stream(reader, None),
            Err(e) => FetchResult::error(e),
        }
    }

    fn reader(&self, _id: ImageId, path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
        open_file(path)
    }

    fn decode(&self, reader: &mut dyn ReadSeek) -> FetchResult {
        decode_stream(reader, None)
    }
}
