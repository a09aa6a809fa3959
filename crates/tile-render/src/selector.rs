//! Zoom-adaptive bitmap selection
//!
//! For every visible photo the selector ranks all sources by how close their
//! declared resolution is to one source pixel per tile pixel, then walks that
//! ranking and draws the first bitmap it can actually get. Sources that do not
//! have the photo are skipped using a short-lived existence cache, so a missing
//! thumbnail costs one filesystem check per TTL instead of one per tile.

use image_source::{CacheKey, Capabilities, ImageId, Size, SourceError, SourceRegistry};
use moka::sync::Cache;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::elements::Photo;
use crate::geometry::View;

/// One source considered for one photo under one view
#[derive(Debug, Clone)]
pub struct Candidate {
    pub index: usize,
    pub name: Arc<str>,
    pub size: Size,
    pub zoom_distance: f64,
    pub duration: Duration,
}

/// What drawing a photo ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutcome {
    /// Too small on the tile to draw anything
    Skipped,
    /// Small enough to be drawn as a flat swatch without fetching
    Swatch,
    Drawn { source: Arc<str>, zoom_distance: f64 },
    /// No source produced an image; the dominant color was drawn instead
    Placeholder { errors: Vec<SourceError> },
}

impl DrawOutcome {
    pub fn drawn_source(&self) -> Option<&str> {
        match self {
            DrawOutcome::Drawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub struct BitmapSelector {
    registry: Arc<SourceRegistry>,
    names: Vec<Arc<str>>,
    /// Queried once here; sources cannot change what they support
    capabilities: Vec<Capabilities>,
    exists: Cache<CacheKey, bool>,
}

impl BitmapSelector {
    pub fn new(registry: Arc<SourceRegistry>, config: &RenderConfig) -> Self {
        let names = registry
            .sources()
            .iter()
            .map(|s| Arc::from(s.name()))
            .collect();
        let capabilities = registry.sources().iter().map(|s| s.capabilities()).collect();
        let exists = Cache::builder()
            .max_capacity(config.exists_capacity)
            .time_to_live(config.exists_ttl())
            .build();
        Self {
            registry,
            names,
            capabilities,
            exists,
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// All sources for `photo`, best zoom distance first, ties by predicted duration
    pub fn candidates(&self, photo: &Photo, view: &View) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .registry
            .sources()
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let size = source.size(photo.size);
                Candidate {
                    index,
                    name: Arc::clone(&self.names[index]),
                    size,
                    zoom_distance: photo.rect.zoom_distance(view, size),
                    duration: source.duration_estimate(size),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.zoom_distance
                .partial_cmp(&b.zoom_distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.duration.cmp(&b.duration))
        });
        candidates
    }

    /// Sources that cannot check existence are assumed to have every photo
    fn exists(&self, candidate: &Candidate, id: ImageId, path: &Path) -> bool {
        if !self.capabilities[candidate.index].contains(Capabilities::EXISTS) {
            return true;
        }
        let key = CacheKey::new(id, Arc::clone(&candidate.name));
        let source = &self.registry.sources()[candidate.index];
        self.exists.get_with(key, || source.exists(id, path))
    }

    /// Forget cached existence answers, e.g. after thumbnails were generated
    pub fn invalidate_exists(&self) {
        self.exists.invalidate_all();
    }

    /// Draw `photo` with the best available bitmap, falling back to its color
    pub fn draw(&self, config: &RenderConfig, photo: &Photo, canvas: &dyn Canvas, view: &View) -> DrawOutcome {
        let area = photo.tile_area(view);
        if area < config.min_pixel_area {
            return DrawOutcome::Skipped;
        }
        if area < config.max_solid_pixel_area {
            photo.draw_swatch(canvas, view);
            return DrawOutcome::Swatch;
        }

        let rect = view.to_tile(&photo.rect);
        let mut errors = Vec::new();
        for candidate in self.candidates(photo, view) {
            if !self.capabilities[candidate.index].contains(Capabilities::GET) {
                continue;
            }
            if !self.exists(&candidate, photo.id, &photo.path) {
                continue;
            }
            let source = &self.registry.sources()[candidate.index];
            let result = source.get(photo.id, &photo.path);
            if let Some(err) = result.error {
                errors.push(err);
                continue;
            }
            let Some(image) = result.image else {
                continue;
            };
            let orientation = result.orientation.unwrap_or(photo.orientation);
            canvas.draw_image(rect, &image, orientation);
            return DrawOutcome::Drawn {
                source: candidate.name,
                zoom_distance: candidate.zoom_distance,
            };
        }

        debug!(id = %photo.id, errors = errors.len(), "unable to draw photo, using placeholder");
        photo.draw_swatch(canvas, view);
        DrawOutcome::Placeholder { errors }
    }
}
