//! In-memory cost of decoded images
//!
//! Caches are bounded by the estimated byte size of what they hold. Each
//! pixel layout has a closed-form size; anything not modeled gets a
//! conservative fixed cost so it can never slip into the cache for free.

use crate::source::FetchResult;
use crate::types::Size;
use image::DynamicImage;
use tracing::warn;

/// Cost charged for a decoded image whose layout is not modeled (10MB)
pub const FALLBACK_COST: u64 = 10_000_000;

/// Cost charged for a result without an image
pub const EMPTY_COST: u64 = 1;

/// Memory layout of a decoded pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Interleaved channels, e.g. RGB, RGBA, gray+alpha
    Packed { channels: u8, bytes_per_sample: u8 },
    /// Full resolution luma plus two chroma planes subsampled by the given factors
    PlanarYCbCr { horizontal: u8, vertical: u8 },
    /// One index byte per pixel plus a palette of RGBA entries
    Paletted { palette_len: u16 },
}

impl PixelLayout {
    pub const GRAY8: PixelLayout = PixelLayout::Packed { channels: 1, bytes_per_sample: 1 };
    pub const RGBA8: PixelLayout = PixelLayout::Packed { channels: 4, bytes_per_sample: 1 };

    /// Bytes needed to hold a buffer of `size` in this layout
    pub fn estimate(&self, size: Size) -> u64 {
        let pixels = size.area();
        match *self {
            PixelLayout::Packed { channels, bytes_per_sample } => {
                pixels * channels as u64 * bytes_per_sample as u64
            }
            PixelLayout::PlanarYCbCr { horizontal, vertical } => {
                let h = horizontal.max(1) as u64;
                let v = vertical.max(1) as u64;
                let chroma_w = (size.width as u64).div_ceil(h);
                let chroma_h = (size.height as u64).div_ceil(v);
                pixels + 2 * chroma_w * chroma_h
            }
            PixelLayout::Paletted { palette_len } => pixels + palette_len as u64 * 4,
        }
    }
}

/// Estimate of the decoded, in-memory size of an image representation
pub trait DecodedSize {
    /// Pixel layout, or `None` when the representation is not modeled
    fn pixel_layout(&self) -> Option<PixelLayout>;

    fn pixel_size(&self) -> Size;

    /// Fixed per-value overhead next to the pixel buffer
    fn overhead(&self) -> u64 {
        0
    }

    fn decoded_size(&self) -> Option<u64> {
        self.pixel_layout()
            .map(|layout| layout.estimate(self.pixel_size()) + self.overhead())
    }
}

impl DecodedSize for DynamicImage {
    fn pixel_layout(&self) -> Option<PixelLayout> {
        let packed = |channels, bytes_per_sample| {
            Some(PixelLayout::Packed { channels, bytes_per_sample })
        };
        match self {
            DynamicImage::ImageLuma8(_) => packed(1, 1),
            DynamicImage::ImageLumaA8(_) => packed(2, 1),
            DynamicImage::ImageRgb8(_) => packed(3, 1),
            DynamicImage::ImageRgba8(_) => packed(4, 1),
            DynamicImage::ImageLuma16(_) => packed(1, 2),
            DynamicImage::ImageLumaA16(_) => packed(2, 2),
            DynamicImage::ImageRgb16(_) => packed(3, 2),
            DynamicImage::ImageRgba16(_) => packed(4, 2),
            DynamicImage::ImageRgb32F(_) => packed(3, 4),
            DynamicImage::ImageRgba32F(_) => packed(4, 4),
            _ => None,
        }
    }

    fn pixel_size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    fn overhead(&self) -> u64 {
        std::mem::size_of::<DynamicImage>() as u64
    }
}

/// Cache cost of a fetch result; never zero
pub fn result_cost(result: &FetchResult) -> u64 {
    match result.image.as_deref() {
        None => EMPTY_COST,
        Some(img) => match img.decoded_size() {
            Some(bytes) => bytes.max(EMPTY_COST),
            None => {
                warn!(color = ?img.color(), "unable to compute cost, unsupported image layout");
                FALLBACK_COST
            }
        },
    }
}
