//! Tile rendering for zoomable photo scenes
//!
//! A scene is an unbounded canvas of placed photos, solid rects and labels.
//! Tiles are requested by `(zoom, x, y)`; for every photo visible in a tile
//! the [`BitmapSelector`] picks the source whose resolution best matches the
//! current zoom, skipping sources that do not have the photo and falling back
//! to the photo's dominant color when nothing can be decoded.

pub mod canvas;
pub mod config;
pub mod elements;
pub mod geometry;
pub mod scene;
pub mod selector;
pub mod tile;

pub use canvas::{orient, Canvas, RasterCanvas};
pub use config::RenderConfig;
pub use elements::{Photo, Solid, Text};
pub use geometry::{Point, Rect, View};
pub use scene::{Dependency, DrawStats, Scene, SceneBody, SceneBodyMut};
pub use selector::{BitmapSelector, Candidate, DrawOutcome};
pub use tile::{render_tile, TileRequest};
