use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::canvas::RasterCanvas;
use crate::config::RenderConfig;
use crate::geometry::View;
use crate::scene::{DrawStats, Scene};
use crate::selector::BitmapSelector;

/// Address of one square tile of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRequest {
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
    /// Overrides the configured tile size when non-zero
    #[serde(default)]
    pub tile_size: u32,
}

impl TileRequest {
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self {
            zoom,
            x,
            y,
            tile_size: 0,
        }
    }

    pub fn tile_size(&self, config: &RenderConfig) -> u32 {
        if self.tile_size == 0 {
            config.tile_size
        } else {
            self.tile_size
        }
    }

    pub fn view(&self, config: &RenderConfig, scene: &Scene) -> View {
        View::tile(self.zoom, self.x, self.y, self.tile_size(config), scene.bounds())
    }
}

/// Render one tile of `scene` onto a fresh canvas filled with the background
pub fn render_tile(
    scene: &Scene,
    config: &RenderConfig,
    selector: &BitmapSelector,
    request: TileRequest,
) -> (RgbaImage, DrawStats) {
    let size = request.tile_size(config);
    let canvas = RasterCanvas::new(size, size, config.background_color);
    let view = request.view(config, scene);
    let stats = scene.draw(config, &canvas, &view, selector);
    (canvas.into_image(), stats)
}
