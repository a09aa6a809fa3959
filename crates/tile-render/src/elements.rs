//! Elements a scene is made of
//!
//! All rects are canvas rects; elements are transformed into tile pixels by
//! the [`View`] at draw time.

use image_source::{Color, ImageId, Orientation, Size};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::canvas::Canvas;
use crate::geometry::{Rect, View};

/// One placed photo with the metadata needed to pick and draw a bitmap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: ImageId,
    pub rect: Rect,
    pub path: PathBuf,
    /// Size of the original as stored, before orientation
    pub size: Size,
    pub orientation: Orientation,
    /// Dominant color, used for swatches and placeholders
    pub color: Color,
}

impl Photo {
    pub fn new(id: ImageId, path: impl Into<PathBuf>, size: Size) -> Self {
        Self {
            id,
            rect: Rect::default(),
            path: path.into(),
            size,
            orientation: Orientation::Normal,
            color: Color::NEUTRAL,
        }
    }

    /// Place the photo fit inside the given box, keeping its display aspect
    pub fn place(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let display = self.orientation.apply_to_size(self.size);
        self.rect = Rect::new(x, y, width, height)
            .fit_inside(display.width as f64, display.height as f64);
    }

    pub fn is_visible(&self, view: &View) -> bool {
        self.rect.intersects(&view.visible())
    }

    /// Area on the tile of the whole photo rect
    pub fn tile_area(&self, view: &View) -> f64 {
        self.rect.pixel_area(view, Size::new(1, 1))
    }

    /// Flat rect in the dominant color
    pub fn draw_swatch(&self, canvas: &dyn Canvas, view: &View) {
        canvas.fill_rect(view.to_tile(&self.rect), self.color);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub rect: Rect,
    pub color: Color,
}

impl Solid {
    pub fn new(rect: Rect, color: Color) -> Self {
        Self { rect, color }
    }

    pub fn draw(&self, canvas: &dyn Canvas, view: &View) {
        if self.rect.intersects(&view.visible()) {
            canvas.fill_rect(view.to_tile(&self.rect), self.color);
        }
    }
}

/// A label, e.g. a date header above a group of photos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub rect: Rect,
    pub text: String,
    pub color: Color,
}

impl Text {
    pub fn new(rect: Rect, text: impl Into<String>, color: Color) -> Self {
        Self {
            rect,
            text: text.into(),
            color,
        }
    }

    pub fn draw(&self, canvas: &dyn Canvas, view: &View) {
        if self.rect.intersects(&view.visible()) {
            canvas.draw_text(view.to_tile(&self.rect), &self.text, self.color);
        }
    }
}
