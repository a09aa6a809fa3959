//! Multi-resolution image sources for zoomable photo views
//!
//! Every photo can be served by several interchangeable sources: the original
//! file, pregenerated thumbnails of various sizes, in-memory caches. This
//! crate models them behind one [`Source`] trait and ranks them with a cost
//! model that never touches storage, so the cheapest adequate resolution can
//! be picked for every photo of every frame.
//!
//! # Features
//!
//! - **Predictive ranking**: declared sizes and duration estimates, no I/O
//! - **Caching decorator**: cost-bounded, TTL-expiring result cache shared by
//!   all sources, with per-key coalescing of concurrent misses
//! - **Filtering decorator**: extension allow-lists that refuse requests up front
//! - **Cost accounting**: decoded byte size per pixel layout
//! - **Color extraction**: dominant color for placeholder backgrounds
//! - **Configurable stack**: sources and cache built from a JSON config

pub mod cached;
pub mod color;
pub mod config;
pub mod cost;
pub mod filtered;
pub mod flight;
pub mod original;
pub mod registry;
pub mod source;
pub mod thumb;
pub mod types;

pub use cached::{CacheConfig, CacheKey, CacheStats, Cached, ResultCache};
pub use color::{dominant_color, Color};
pub use config::{DurationModel, SourceConfig, SourceKind, SourcesConfig};
pub use cost::{result_cost, DecodedSize, PixelLayout};
pub use filtered::Filtered;
pub use flight::{Flight, SingleFlight};
pub use original::OriginalSource;
pub use registry::{size_cost, sort_by_size_cost, CostEstimate, SourceRegistry};
pub use source::{Capabilities, FetchResult, ReadSeek, SharedSource, Source, SourceError};
pub use thumb::ThumbSource;
pub use types::{AspectRatioFit, ImageId, Orientation, Size};
