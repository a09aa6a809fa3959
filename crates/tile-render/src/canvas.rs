//! Raster seam between scene elements and pixels
//!
//! Elements draw through the [`Canvas`] trait in tile pixel coordinates. All
//! methods take `&self` so one canvas can be shared by the draw workers;
//! [`RasterCanvas`] does the expensive resampling outside its lock and only
//! holds it to blit.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use image_source::{Color, Orientation};
use parking_lot::Mutex;

use crate::geometry::Rect;

pub trait Canvas: Send + Sync {
    /// Width and height of the canvas in pixels
    fn dimensions(&self) -> (u32, u32);

    fn fill_rect(&self, rect: Rect, color: Color);

    /// Draw `image`, with `orientation` applied, stretched over `rect`
    fn draw_image(&self, rect: Rect, image: &DynamicImage, orientation: Orientation);

    /// Canvases without a glyph rasterizer ignore text
    fn draw_text(&self, _rect: Rect, _text: &str, _color: Color) {}

    fn bounds(&self) -> Rect {
        let (w, h) = self.dimensions();
        Rect::new(0.0, 0.0, w as f64, h as f64)
    }
}

/// Rotate and flip a decoded buffer into display orientation
pub fn orient(image: &DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => image.clone(),
        Orientation::MirrorHorizontal => image.fliph(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::MirrorVertical => image.flipv(),
        Orientation::MirrorHorizontalRotate270 => image.rotate90().fliph(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::MirrorHorizontalRotate90 => image.rotate270().fliph(),
        Orientation::Rotate270 => image.rotate270(),
    }
}

/// Pixel bounds of `rect` clipped to a `width` x `height` buffer
fn pixel_bounds(rect: Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.round().max(0.0).min(width as f64) as u32;
    let y0 = rect.y.round().max(0.0).min(height as f64) as u32;
    let x1 = rect.right().round().max(0.0).min(width as f64) as u32;
    let y1 = rect.bottom().round().max(0.0).min(height as f64) as u32;
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1 - x0, y1 - y0))
}

pub struct RasterCanvas {
    pixels: Mutex<RgbaImage>,
    width: u32,
    height: u32,
    filter: FilterType,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            pixels: Mutex::new(RgbaImage::from_pixel(width, height, Rgba(background.to_rgba()))),
            width,
            height,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let pixels = self.pixels.lock();
        (x < self.width && y < self.height).then(|| pixels.get_pixel(x, y).0)
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels.into_inner()
    }
}

impl Canvas for RasterCanvas {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&self, rect: Rect, color: Color) {
        let Some((x, y, w, h)) = pixel_bounds(rect, self.width, self.height) else {
            return;
        };
        let fill = Rgba(color.to_rgba());
        let mut pixels = self.pixels.lock();
        for py in y..y + h {
            for px in x..x + w {
                pixels.put_pixel(px, py, fill);
            }
        }
    }

    fn draw_image(&self, rect: Rect, image: &DynamicImage, orientation: Orientation) {
        let Some(visible) = rect.intersection(&self.bounds()) else {
            return;
        };
        let Some((x, y, w, h)) = pixel_bounds(visible, self.width, self.height) else {
            return;
        };

        let oriented = orient(image, orientation);
        let (iw, ih) = (oriented.width(), oriented.height());
        if iw == 0 || ih == 0 {
            return;
        }

        // Only resample the part of the source that lands on the canvas
        let sx = (((visible.x - rect.x) / rect.w * iw as f64).floor() as u32).min(iw - 1);
        let sy = (((visible.y - rect.y) / rect.h * ih as f64).floor() as u32).min(ih - 1);
        let sw = ((visible.w / rect.w * iw as f64).ceil() as u32).clamp(1, iw - sx);
        let sh = ((visible.h / rect.h * ih as f64).ceil() as u32).clamp(1, ih - sy);

        let cropped = oriented.crop_imm(sx, sy, sw, sh).to_rgba8();
        let resized = imageops::resize(&cropped, w, h, self.filter);

        let mut pixels = self.pixels.lock();
        imageops::overlay(&mut *pixels, &resized, x as i64, y as i64);
    }
}
