//! Background scene construction
//!
//! Layout algorithms and search embeddings live outside this crate and are
//! plugged in through [`Layout`] and [`Embedder`]. The builder runs on its
//! own thread and only ever writes to the scene it was given.

use image_source::{dominant_color, Color, ImageId, Size, SourceRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tile_render::Scene;
use tracing::{debug, info, warn};

use crate::collection::Collections;
use crate::config::{LayoutKind, SceneConfig};
use crate::error::SceneError;

/// Longest edge of the bitmaps dominant colors are taken from
pub const SWATCH_SIZE: u32 = 32;

/// Places photos of a collection into a scene
///
/// Implementations write through [`Scene::body_mut`]. Readers see the body
/// as it was when the last guard was dropped, so a layout may publish
/// partial progress by releasing the guard between batches, and may report
/// it with [`Scene::set_file_count`].
pub trait Layout: Send + Sync {
    fn layout(&self, config: &SceneConfig, scene: &Scene) -> Result<(), SceneError>;
}

/// Turns search expressions into embedding vectors
pub trait Embedder: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, SceneError>;
    fn image_embedding(&self, id: ImageId) -> Result<Vec<f32>, SceneError>;
}

pub type SharedLayout = Arc<dyn Layout>;
pub type SharedEmbedder = Arc<dyn Embedder>;

/// What a search expression refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery<'a> {
    Text(&'a str),
    Image(ImageId),
}

impl<'a> SearchQuery<'a> {
    /// `img:<id>` selects a reference image, anything else is free text
    pub fn parse(search: &'a str) -> Result<Self, SceneError> {
        match search.strip_prefix("img:") {
            Some(id) => id
                .trim()
                .parse::<u32>()
                .map(|id| SearchQuery::Image(ImageId(id)))
                .map_err(|_| SceneError::Configuration(format!("invalid reference image {:?}", search))),
            None => Ok(SearchQuery::Text(search)),
        }
    }
}

/// Layouts by kind plus the optional embedder; shared by all builds
#[derive(Clone, Default)]
pub struct Collaborators {
    layouts: HashMap<LayoutKind, SharedLayout>,
    embedder: Option<SharedEmbedder>,
    collections: Arc<Collections>,
    swatches: Option<Arc<SourceRegistry>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_layout(&mut self, kind: LayoutKind, layout: SharedLayout) {
        self.layouts.insert(kind, layout);
    }

    pub fn set_embedder(&mut self, embedder: SharedEmbedder) {
        self.embedder = Some(embedder);
    }

    pub fn set_collections(&mut self, collections: Arc<Collections>) {
        self.collections = collections;
    }

    /// Fill in dominant colors of laid-out photos from small bitmaps
    pub fn set_swatches(&mut self, registry: Arc<SourceRegistry>) {
        self.swatches = Some(registry);
    }

    pub fn layout(&self, kind: LayoutKind) -> Option<&SharedLayout> {
        self.layouts.get(&kind)
    }

    pub fn collections(&self) -> &Arc<Collections> {
        &self.collections
    }

    /// Color every photo the layout left neutral; returns how many were set
    fn fill_colors(&self, registry: &SourceRegistry, scene: &Scene) -> usize {
        let snapshot = scene.body();
        let target = Size::new(SWATCH_SIZE, SWATCH_SIZE);
        let colors: Vec<(usize, Color)> = snapshot
            .photos
            .iter()
            .enumerate()
            .filter(|(_, photo)| photo.color == Color::NEUTRAL)
            .filter_map(|(i, photo)| {
                let result = registry.fetch(photo.id, &photo.path, photo.size, target);
                if let Some(err) = &result.error {
                    debug!(id = %photo.id, "no swatch: {}", err);
                }
                result.image.map(|image| (i, dominant_color(&image)))
            })
            .collect();
        drop(snapshot);

        let mut body = scene.body_mut();
        for &(i, color) in &colors {
            if let Some(photo) = body.photos.get_mut(i) {
                photo.color = color;
            }
        }
        colors.len()
    }

    fn resolve_search(&self, search: &str) -> Result<Vec<f32>, SceneError> {
        let query = SearchQuery::parse(search)?;
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| SceneError::NotAvailable("search embeddings".into()))?;
        match query {
            SearchQuery::Text(text) => embedder.embed_text(text),
            SearchQuery::Image(id) => embedder.image_embedding(id),
        }
    }

    /// Fill `scene` according to `config` and mark it loaded
    ///
    /// Failures are recorded on the scene. A failed search resolution still
    /// lets the layout run, so the scene shows the unfiltered collection.
    pub fn build(&self, config: &SceneConfig, scene: &Scene) {
        let start = Instant::now();
        let kind = config.layout.kind_or_default();
        info!(scene = %scene.id(), collection = %config.collection.id, layout = %kind, "scene loading");

        scene.add_dependency(self.collections.stamp(&config.collection.id));

        let mut first_error: Option<SceneError> = None;

        let search = config.search_text();
        if !search.is_empty() {
            scene.body_mut().search = Some(search.to_string());
            match self.resolve_search(search) {
                Ok(embedding) => scene.body_mut().search_embedding = Some(embedding),
                Err(err) => {
                    warn!(scene = %scene.id(), search, "search unavailable: {}", err);
                    first_error = Some(err);
                }
            }
        }

        let laid_out = match self.layout(kind) {
            Some(layout) => layout.layout(config, scene),
            None => Err(SceneError::Configuration(format!("no layout registered for {}", kind))),
        };
        if let Err(err) = laid_out {
            warn!(scene = %scene.id(), layout = %kind, "layout failed: {}", err);
            first_error.get_or_insert(err);
        }

        if let Some(registry) = &self.swatches {
            let colored = self.fill_colors(registry, scene);
            debug!(scene = %scene.id(), colored, "swatches");
        }

        let elapsed = start.elapsed();
        scene.finish_loading(elapsed, first_error.map(|err| err.to_string()));
        info!(
            scene = %scene.id(),
            photos = scene.file_count(),
            bounds = %scene.bounds(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scene loaded"
        );
    }
}
