//! Canvas geometry and the canvas-to-tile transform
//!
//! Scenes are laid out on an unbounded canvas in abstract units with y
//! growing downwards. A [`View`] maps that canvas onto one tile: a uniform
//! scale followed by a translation, so a source pixel's footprint on the tile
//! only depends on the rect it is drawn into and the view scale.

use image_source::Size;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Touching edges count as intersecting
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && self.y <= other.bottom()
            && self.right() >= other.x
            && self.bottom() >= other.y
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::new(x, y, right - x, bottom - y);
        (!rect.is_empty()).then_some(rect)
    }

    pub fn translate(&self, offset: Point) -> Rect {
        Rect::new(self.x + offset.x, self.y + offset.y, self.w, self.h)
    }

    pub fn scale(&self, scale: f64) -> Rect {
        Rect::new(self.x * scale, self.y * scale, self.w * scale, self.h * scale)
    }

    /// Largest rect of `width:height` aspect centered inside `self`
    pub fn fit_inside(&self, width: f64, height: f64) -> Rect {
        if width <= 0.0 || height <= 0.0 {
            return *self;
        }
        let scale = if self.w / self.h < width / height {
            self.w / width
        } else {
            self.h / height
        };
        self.centered(width * scale, height * scale)
    }

    /// Smallest rect of `width:height` aspect centered over `self` covering it
    pub fn fill_outside(&self, width: f64, height: f64) -> Rect {
        if width <= 0.0 || height <= 0.0 {
            return *self;
        }
        let scale = if self.w / self.h > width / height {
            self.w / width
        } else {
            self.h / height
        };
        self.centered(width * scale, height * scale)
    }

    fn centered(&self, w: f64, h: f64) -> Rect {
        Rect::new(
            self.x + (self.w - w) * 0.5,
            self.y + (self.h - h) * 0.5,
            w,
            h,
        )
    }

    /// Area on the tile covered by one source pixel when an image of `size`
    /// is drawn fit-to-width into this rect
    pub fn pixel_area(&self, view: &View, size: Size) -> f64 {
        if size.width == 0 {
            return f64::INFINITY;
        }
        let side = self.w * view.scale / size.width as f64;
        side * side
    }

    /// Signed zoom: the pixel area when a source pixel covers at least one
    /// tile pixel, otherwise the negated number of source pixels per tile pixel
    pub fn pixel_zoom(&self, view: &View, size: Size) -> f64 {
        let area = self.pixel_area(view, size);
        if area >= 1.0 {
            area
        } else {
            -1.0 / area
        }
    }

    /// How far drawing `size` into this rect is from one-to-one; lower is better
    ///
    /// Upscaling is weighted three times as heavily as downscaling.
    pub fn zoom_distance(&self, view: &View, size: Size) -> f64 {
        let zoom = self.pixel_zoom(view, size);
        if zoom > 0.0 {
            zoom * 3.0
        } else {
            -zoom
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {:.3} {:.3} {:.3}", self.x, self.y, self.w, self.h)
    }
}

/// Uniform scale plus translation from canvas units to tile pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Tile pixels per canvas unit
    pub scale: f64,
    /// Tile pixel position of the canvas origin, negated
    pub offset: Point,
    /// Side of the square tile in pixels
    pub tile_size: u32,
}

impl View {
    pub fn new(scale: f64, offset: Point, tile_size: u32) -> Self {
        Self {
            scale,
            offset,
            tile_size,
        }
    }

    /// View for tile `(x, y)` at `zoom` of a scene with `bounds`
    ///
    /// At zoom 0 the longer side of the scene spans exactly one tile; every
    /// zoom level doubles the scale. Tiles are numbered from the top-left.
    pub fn tile(zoom: u32, x: u32, y: u32, tile_size: u32, bounds: Rect) -> Self {
        let ts = tile_size as f64;
        let zoom_power = 2f64.powi(zoom.min(30) as i32);
        let longest = bounds.w.max(bounds.h);
        let base = if longest > 0.0 { ts / longest } else { 1.0 };
        let scale = base * zoom_power;
        let offset = Point::new(
            x as f64 * ts + bounds.x * scale,
            y as f64 * ts + bounds.y * scale,
        );
        Self {
            scale,
            offset,
            tile_size,
        }
    }

    pub fn to_tile(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.x * self.scale - self.offset.x,
            rect.y * self.scale - self.offset.y,
            rect.w * self.scale,
            rect.h * self.scale,
        )
    }

    pub fn to_canvas(&self, rect: &Rect) -> Rect {
        Rect::new(
            (rect.x + self.offset.x) / self.scale,
            (rect.y + self.offset.y) / self.scale,
            rect.w / self.scale,
            rect.h / self.scale,
        )
    }

    /// The tile as a rect on the canvas
    pub fn visible(&self) -> Rect {
        let ts = self.tile_size as f64;
        self.to_canvas(&Rect::new(0.0, 0.0, ts, ts))
    }

    /// Rendered size in tile pixels of an image of `size` drawn fit-to-width into `rect`
    pub fn rendered_size(&self, rect: &Rect, size: Size) -> Size {
        if size.width == 0 {
            return Size::default();
        }
        let w = rect.w * self.scale;
        let h = w * size.height as f64 / size.width as f64;
        Size::new(w.round() as u32, h.round() as u32)
    }
}
