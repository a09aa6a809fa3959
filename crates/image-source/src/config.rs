//! Serde configuration for the source stack
//!
//! A [`SourcesConfig`] lists leaf sources in the order they should be
//! considered, each with its own cost constants, optional extension filter and
//! optional caching. [`SourcesConfig::build`] turns it into a ready
//! [`SourceRegistry`].

use crate::cached::{CacheConfig, Cached, ResultCache};
use crate::filtered::Filtered;
use crate::original::OriginalSource;
use crate::registry::SourceRegistry;
use crate::source::SharedSource;
use crate::thumb::ThumbSource;
use crate::types::{AspectRatioFit, Size};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Predicted fetch duration as a fixed part plus a per-megapixel part
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationModel {
    #[serde(with = "duration_millis")]
    pub time: Duration,
    #[serde(with = "duration_millis")]
    pub time_per_megapixel: Duration,
}

impl DurationModel {
    pub fn constant(time: Duration) -> Self {
        Self {
            time,
            time_per_megapixel: Duration::ZERO,
        }
    }

    pub fn per_megapixel(time_per_megapixel: Duration) -> Self {
        Self {
            time: Duration::ZERO,
            time_per_megapixel,
        }
    }

    pub fn estimate(&self, size: Size) -> Duration {
        let nanos = self.time_per_megapixel.as_nanos() * size.area() as u128 / 1_000_000;
        self.time + Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The original file, decoded in full
    Original,
    /// A pregenerated file of fixed dimensions next to or derived from the original
    Thumb,
}

/// One entry of the source list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// Path template for thumbs, see [`ThumbSource`]
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub fit: AspectRatioFit,
    /// Allowed extensions; empty allows everything
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub cost: DurationModel,
    /// Keep results in the shared result cache
    #[serde(default)]
    pub cached: bool,
}

impl SourceConfig {
    fn build_leaf(&self) -> Result<SharedSource> {
        Ok(match self.kind {
            SourceKind::Original => Arc::new(OriginalSource::new(&self.name, self.cost)),
            SourceKind::Thumb => {
                let template = self
                    .path
                    .as_deref()
                    .with_context(|| format!("thumb source {} has no path template", self.name))?;
                if self.width == 0 || self.height == 0 {
                    bail!("thumb source {} needs a non-zero width and height", self.name);
                }
                Arc::new(ThumbSource::new(
                    &self.name,
                    template,
                    Size::new(self.width, self.height),
                    self.fit,
                    self.cost,
                ))
            }
        })
    }

    /// Leaf source wrapped in the configured decorators
    pub fn build(&self, cache: &ResultCache) -> Result<SharedSource> {
        let mut source = self.build_leaf()?;
        if !self.extensions.is_empty() {
            source = Arc::new(Filtered::new(source, &self.extensions));
        }
        if self.cached {
            source = Arc::new(Cached::new(source, cache.clone()));
        }
        Ok(source)
    }
}

/// Complete source stack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub sources: Vec<SourceConfig>,
    pub cache: CacheConfig,
}

impl SourcesConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse sources config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sources config {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Build every source, sharing one result cache between the cached ones
    pub fn build(&self) -> Result<SourceRegistry> {
        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                bail!("duplicate source name: {}", source.name);
            }
        }

        let cache = ResultCache::new(self.cache.clone());
        let sources = self
            .sources
            .iter()
            .map(|config| config.build(&cache))
            .collect::<Result<Vec<_>>>()?;

        info!(sources = sources.len(), max_cost = self.cache.max_cost, "source registry built");
        Ok(SourceRegistry::with_cache(sources, cache))
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}
