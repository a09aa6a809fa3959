//! Pregenerated thumbnails stored next to (or derived from) the original
//!
//! A thumb source knows the box its files were generated for and how they
//! were fit into it, so it can declare its output size for any original
//! without opening a file. The file location is a template over the
//! original's path:
//!
//! - `{dir}`: directory of the original, with trailing separator
//! - `{filename}`: file name with extension
//! - `{stem}`: file name without extension
//! - `{ext}`: extension without the dot

use crate::config::DurationModel;
use crate::original::{decode_stream, open_file};
use crate::source::{Capabilities, FetchResult, ReadSeek, Source, SourceError};
use crate::types::{AspectRatioFit, ImageId, Orientation, Size};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Duration;

/// Per-pixel generation cost used when no cost model is configured
const NANOS_PER_PIXEL: u64 = 31;

pub struct ThumbSource {
    name: String,
    template: String,
    size: Size,
    fit: AspectRatioFit,
    cost: DurationModel,
}

impl ThumbSource {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        size: Size,
        fit: AspectRatioFit,
        cost: DurationModel,
    ) -> Self {
        let mut name = name.into();
        if name.is_empty() {
            name = format!("thumb-{}x{}", size.width, size.height);
        }
        let cost = if cost == DurationModel::default() {
            DurationModel::constant(Duration::from_nanos(NANOS_PER_PIXEL * size.area()))
        } else {
            cost
        };
        Self {
            name,
            template: template.into(),
            size,
            fit,
            cost,
        }
    }

    /// Box the thumbnails were generated for
    pub fn box_size(&self) -> Size {
        self.size
    }

    /// Location of the thumbnail for `original`
    pub fn resolve_path(&self, original: &Path) -> PathBuf {
        let dir = match original.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                let mut dir = parent.to_string_lossy().into_owned();
                if !dir.ends_with(MAIN_SEPARATOR) {
                    dir.push(MAIN_SEPARATOR);
                }
                dir
            }
            _ => String::new(),
        };
        let component = |part: Option<&std::ffi::OsStr>| {
            part.map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let resolved = self
            .template
            .replace("{dir}", &dir)
            .replace("{filename}", &component(original.file_name()))
            .replace("{stem}", &component(original.file_stem()))
            .replace("{ext}", &component(original.extension()));
        PathBuf::from(resolved)
    }
}

impl Source for ThumbSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self, original: Size) -> Size {
        self.size.fit(original, self.fit)
    }

    /// Thumbnails are small and already resized; the cost ignores the request
    fn duration_estimate(&self, _size: Size) -> Duration {
        self.cost.estimate(self.size)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::EXISTS | Capabilities::GET | Capabilities::READER | Capabilities::DECODE
    }

    fn exists(&self, _id: ImageId, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }

    fn get(&self, id: ImageId, path: &Path) -> FetchResult {
        let resolved = self.resolve_path(path);
        if !resolved.is_file() {
            return FetchResult::not_found();
        }
        match self.reader(id, path) {
            Ok(reader) => decode_stream(reader, Some(Orientation::Normal)),
            Err(e) => FetchResult::error(e),
        }
    }

    fn reader(&self, _id: ImageId, path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
        open_file(&self.resolve_path(path))
    }

    fn decode(&self, reader: &mut dyn ReadSeek) -> FetchResult {
        decode_stream(reader, Some(Orientation::Normal))
    }
}
