//! Ordered set of sources and the predictive cost model
//!
//! Estimating never touches storage: every source declares its output size
//! and duration up front, so a ranking for any request can be computed for
//! thousands of photos per frame.

use crate::cached::{CacheConfig, ResultCache};
use crate::source::{Capabilities, FetchResult, SharedSource, SourceError};
use crate::types::{ImageId, Size};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Weight of drawing fewer pixels than requested over drawing more
pub const UNDERDRAW_PENALTY: f64 = 59.851585;
pub const SIZE_COST_MULTIPLIER: f64 = 0.000281;

/// Predicted cost of serving one request from one source
#[derive(Debug, Clone)]
pub struct CostEstimate {
    /// Position of the source in the registry
    pub index: usize,
    pub name: String,
    /// Declared output size for the original
    pub size: Size,
    pub duration: Duration,
    /// Squared deviation of the declared area from the target area
    pub size_cost: f64,
}

/// Squared area deviation; producing too few pixels is penalised heavily
pub fn size_cost(declared: Size, target: Size) -> f64 {
    let declared = if declared.is_empty() { target } else { declared };
    let target_area = target.area() as f64;
    let mut diff = target_area - declared.area() as f64;
    if diff > 0.0 {
        diff *= UNDERDRAW_PENALTY;
    }
    diff * diff * SIZE_COST_MULTIPLIER
}

/// Re-sort estimates by how closely they match the target size
pub fn sort_by_size_cost(estimates: &mut [CostEstimate]) {
    estimates.sort_by(|a, b| a.size_cost.total_cmp(&b.size_cost));
}

pub struct SourceRegistry {
    sources: Vec<SharedSource>,
    cache: ResultCache,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SharedSource>) -> Self {
        Self::with_cache(sources, ResultCache::new(CacheConfig::default()))
    }

    /// Registry whose cached sources share `cache`
    pub fn with_cache(sources: Vec<SharedSource>, cache: ResultCache) -> Self {
        Self { sources, cache }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[SharedSource] {
        &self.sources
    }

    pub fn get(&self, index: usize) -> Option<&SharedSource> {
        self.sources.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&SharedSource> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// One estimate per source, fastest first, ties broken by smaller declared area
    ///
    /// Sources that may not be able to serve the request are still listed.
    pub fn estimate_cost(&self, original: Size, target: Size) -> Vec<CostEstimate> {
        let mut estimates: Vec<CostEstimate> = self
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let size = source.size(original);
                CostEstimate {
                    index,
                    name: source.name().to_string(),
                    size,
                    duration: source.duration_estimate(size),
                    size_cost: size_cost(size, target),
                }
            })
            .collect();

        estimates.sort_by(|a, b| {
            a.duration
                .cmp(&b.duration)
                .then_with(|| a.size.area().cmp(&b.size.area()))
        });
        estimates
    }

    /// Walk the ranking and return the first result carrying an image
    ///
    /// When no source produces one, the first error met is returned, or a
    /// plain negative result if every source simply had nothing.
    pub fn fetch(&self, id: ImageId, path: &Path, original: Size, target: Size) -> FetchResult {
        let mut first_error: Option<SourceError> = None;
        for estimate in self.estimate_cost(original, target) {
            let source = &self.sources[estimate.index];
            if !source.capabilities().contains(Capabilities::GET) {
                continue;
            }
            let result = source.get(id, path);
            if result.image.is_some() {
                debug!(%id, source = %estimate.name, "fetched");
                return result;
            }
            if let Some(err) = result.error {
                debug!(%id, source = %estimate.name, error = %err, "source failed, trying next");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => FetchResult::error(err),
            None => FetchResult::not_found(),
        }
    }

    /// Close every source; all are closed even if some fail
    pub fn close(&self) -> Result<(), SourceError> {
        let mut first_error = None;
        for source in &self.sources {
            if let Err(err) = source.close() {
                warn!(source = source.name(), error = %err, "failed to close source");
                first_error.get_or_insert(err);
            }
        }
        self.cache.clear();
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl From<Vec<SharedSource>> for SourceRegistry {
    fn from(sources: Vec<SharedSource>) -> Self {
        Self::new(sources)
    }
}

impl FromIterator<SharedSource> for SourceRegistry {
    fn from_iter<I: IntoIterator<Item = SharedSource>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sources.iter().map(Arc::as_ref)).finish()
    }
}
