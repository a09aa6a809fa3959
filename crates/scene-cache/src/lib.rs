//! Scene store for zoomable photo scenes
//!
//! [`SceneCache::add`] returns a scene at once and lays it out on a
//! background thread through the [`Layout`] registered for its layout kind.
//! Stored scenes are bounded by a byte budget and pruned oldest first;
//! [`SceneCache::get_scenes_with_config`] finds scenes an equivalent config
//! would reproduce. Both lookups refresh whether a scene went stale because
//! its collection changed after it was built.

pub mod build;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod hot;
pub mod id;

pub use build::{Collaborators, Embedder, Layout, SearchQuery, SharedEmbedder, SharedLayout, SWATCH_SIZE};
pub use cache::{SceneCache, SceneCacheBuilder};
pub use collection::{CollectionStamp, Collections};
pub use config::{
    scene_config_equal, CollectionConfig, LayoutConfig, LayoutKind, Order, SceneCacheConfig, SceneConfig,
};
pub use error::SceneError;
pub use hot::{HotScenes, HotStats};
pub use id::{is_scene_id, new_scene_id, ID_ALPHABET, ID_LENGTH};
