//! Extension allow-list decorator
//!
//! Requests for files whose extension is not listed are refused before the
//! wrapped source sees them. Existence checks answer `false` for those files
//! so unsupported formats never look available to higher layers.

use crate::source::{Capabilities, FetchResult, ReadSeek, Source, SourceError};
use crate::types::{ImageId, Size};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct Filtered {
    source: Arc<dyn Source>,
    /// Lowercase extensions including the leading dot; empty allows everything
    extensions: Vec<String>,
}

impl Filtered {
    pub fn new<I, S>(source: Arc<dyn Source>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        Self { source, extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn supports_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!(".{}", ext.to_lowercase()),
            None => return false,
        };
        self.extensions.iter().any(|allowed| *allowed == ext)
    }

    fn unsupported(&self, path: &Path) -> SourceError {
        SourceError::NotSupported(format!(
            "extension of {} not supported by {}",
            path.display(),
            self.source.name()
        ))
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

impl Source for Filtered {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn display_name(&self) -> &str {
        self.source.display_name()
    }

    fn size(&self, original: Size) -> Size {
        self.source.size(original)
    }

    fn duration_estimate(&self, size: Size) -> Duration {
        self.source.duration_estimate(size)
    }

    fn capabilities(&self) -> Capabilities {
        self.source.capabilities()
    }

    fn exists(&self, id: ImageId, path: &Path) -> bool {
        self.supports_extension(path) && self.source.exists(id, path)
    }

    fn get(&self, id: ImageId, path: &Path) -> FetchResult {
        if !self.supports_extension(path) {
            return FetchResult::error(self.unsupported(path));
        }
        self.source.get(id, path)
    }

    fn reader(&self, id: ImageId, path: &Path) -> Result<Box<dyn ReadSeek>, SourceError> {
        if !self.supports_extension(path) {
            return Err(self.unsupported(path));
        }
        self.source.reader(id, path)
    }

    fn decode(&self, reader: &mut dyn ReadSeek) -> FetchResult {
        self.source.decode(reader)
    }

    fn set(&self, id: ImageId, path: &Path, result: &FetchResult) -> bool {
        self.supports_extension(path) && self.source.set(id, path, result)
    }

    fn close(&self) -> Result<(), SourceError> {
        self.source.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached::{CacheConfig, Cached, ResultCache};
    use crate::types::Orientation;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Source for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn size(&self, original: Size) -> Size {
            original
        }

        fn duration_estimate(&self, _size: Size) -> Duration {
            Duration::from_millis(5)
        }

        fn exists(&self, _id: ImageId, _path: &Path) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn get(&self, _id: ImageId, _path: &Path) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FetchResult::image(DynamicImage::new_rgb8(1, 1), Orientation::Normal)
        }
    }

    #[test]
    fn test_rejects_without_touching_source() {
        let inner = Arc::new(Counting::default());
        let filtered = Filtered::new(inner.clone(), ["jpg", ".JPEG"]);

        let result = filtered.get(ImageId(1), Path::new("/photos/clip.mp4"));
        assert!(result.error.unwrap().is_not_supported());
        assert!(!filtered.exists(ImageId(1), Path::new("/photos/clip.mp4")));
        assert!(filtered.reader(ImageId(1), Path::new("/photos/clip.mp4")).is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_matches_case_insensitively() {
        let filtered = Filtered::new(Arc::new(Counting::default()), ["jpg", ".jpeg"]);
        assert!(filtered.supports_extension(Path::new("a/IMG_0001.JPG")));
        assert!(filtered.supports_extension(Path::new("a/b.jpeg")));
        assert!(!filtered.supports_extension(Path::new("a/b.png")));
        assert!(!filtered.supports_extension(Path::new("a/noext")));
        assert_eq!(filtered.extensions(), &[".jpg".to_string(), ".jpeg".to_string()]);
    }

    #[test]
    fn test_empty_list_allows_everything() {
        let inner = Arc::new(Counting::default());
        let filtered = Filtered::new(inner.clone(), Vec::<String>::new());
        assert!(filtered.get(ImageId(1), Path::new("x.heic")).is_ok());
        assert!(filtered.exists(ImageId(1), Path::new("x")));
    }

    #[test]
    fn test_composes_with_cache_in_either_order() {
        let inner = Arc::new(Counting::default());
        let cache = ResultCache::new(CacheConfig::default());

        let cached_then_filtered =
            Filtered::new(Arc::new(Cached::new(inner.clone(), cache.clone())), ["jpg"]);
        let filtered_then_cached =
            Cached::new(Arc::new(Filtered::new(inner.clone(), ["jpg"])), cache);

        for source in [&cached_then_filtered as &dyn Source, &filtered_then_cached] {
            assert!(source.get(ImageId(2), Path::new("b.png")).error.is_some());
            assert!(source.get(ImageId(3), Path::new("c.jpg")).is_ok());
        }
        // c.jpg is fetched once; both stacks share the cache under the same name
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
