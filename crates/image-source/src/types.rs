//! Identity and geometry primitives shared by every source
//!
//! Images are addressed by a stable numeric [`ImageId`] rather than by path,
//! and sizes are plain pixel pairs with the fit arithmetic thumbnails need.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable identity of one original image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u32);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ImageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale `self`, treated as a bounding box, to the aspect ratio of `original`
    ///
    /// `FitInside` shrinks one side so the result fits in the box, `FitOutside`
    /// grows one side so the result covers it, and `OriginalSize` ignores the
    /// box entirely.
    pub fn fit(&self, original: Size, fit: AspectRatioFit) -> Size {
        if fit == AspectRatioFit::OriginalSize {
            return original;
        }
        if self.is_empty() || original.is_empty() {
            return *self;
        }

        let mut tw = self.width as f64;
        let mut th = self.height as f64;
        let ratio = tw / th;
        let original_ratio = original.width as f64 / original.height as f64;

        match fit {
            AspectRatioFit::FitInside => {
                if ratio < original_ratio {
                    th = tw / original_ratio;
                } else {
                    tw = th * original_ratio;
                }
            }
            AspectRatioFit::FitOutside => {
                if ratio > original_ratio {
                    th = tw / original_ratio;
                } else {
                    tw = th * original_ratio;
                }
            }
            AspectRatioFit::OriginalSize => unreachable!(),
        }

        Size::new(tw.round() as u32, th.round() as u32)
    }

    /// Scale down (never up) to fit inside `bounds`, preserving aspect ratio
    pub fn fit_inside(&self, bounds: Size) -> Size {
        if self.width <= bounds.width && self.height <= bounds.height {
            return *self;
        }
        bounds.fit(*self, AspectRatioFit::FitInside)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// How a source's declared size is derived from its configured box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AspectRatioFit {
    FitInside,
    FitOutside,
    #[default]
    OriginalSize,
}

impl AspectRatioFit {
    /// Lenient parse used by config files; unknown values mean `OriginalSize`
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "INSIDE" | "FITINSIDE" => AspectRatioFit::FitInside,
            "OUTSIDE" | "FITOUTSIDE" => AspectRatioFit::FitOutside,
            _ => AspectRatioFit::OriginalSize,
        }
    }
}

impl<'de> Deserialize<'de> for AspectRatioFit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(AspectRatioFit::parse_lenient(&raw))
    }
}

impl fmt::Display for AspectRatioFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectRatioFit::FitInside => write!(f, "INSIDE"),
            AspectRatioFit::FitOutside => write!(f, "OUTSIDE"),
            AspectRatioFit::OriginalSize => write!(f, "ORIGINAL"),
        }
    }
}

/// EXIF orientation; all rotations are counter-clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    MirrorHorizontalRotate270,
    Rotate90,
    MirrorHorizontalRotate90,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation tag value; anything outside 1..=8 is `Normal`
    pub fn from_exif(value: u16) -> Self {
        match value {
            2 => Orientation::MirrorHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::MirrorVertical,
            5 => Orientation::MirrorHorizontalRotate270,
            6 => Orientation::Rotate90,
            7 => Orientation::MirrorHorizontalRotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn to_exif(self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::MirrorHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::MirrorVertical => 4,
            Orientation::MirrorHorizontalRotate270 => 5,
            Orientation::Rotate90 => 6,
            Orientation::MirrorHorizontalRotate90 => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// True for the four states that turn a landscape buffer into a portrait one
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::MirrorHorizontalRotate270
                | Orientation::Rotate90
                | Orientation::MirrorHorizontalRotate90
                | Orientation::Rotate270
        )
    }

    /// Size of a buffer of `size` once this orientation is applied
    pub fn apply_to_size(self, size: Size) -> Size {
        if self.swaps_dimensions() {
            Size::new(size.height, size.width)
        } else {
            size
        }
    }
}
