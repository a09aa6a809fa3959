//! Dominant color of a photo, used to paint placeholders
//!
//! The color is sampled once when a photo is indexed and kept with its
//! metadata, so a placeholder can be drawn without fetching any pixels.

use anyhow::{bail, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const NEUTRAL: Color = Color { r: 128, g: 128, b: 128 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Perceived brightness using standard luminance weights
    pub fn brightness(&self) -> u8 {
        let luminance = 0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64;
        luminance.round() as u8
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            bail!("Invalid color: {}. Expected #rrggbb", s);
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Color { r, g, b }),
            _ => bail!("Invalid color: {}. Expected #rrggbb", s),
        }
    }
}

/// Average color of the center 25% of an image
pub fn dominant_color(img: &DynamicImage) -> Color {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let center_x = width / 2;
    let center_y = height / 2;
    let sample_width = (width / 4).max(1);
    let sample_height = (height / 4).max(1);

    let start_x = center_x.saturating_sub(sample_width / 2);
    let start_y = center_y.saturating_sub(sample_height / 2);
    let end_x = (start_x + sample_width).min(width);
    let end_y = (start_y + sample_height).min(height);

    let mut total = [0u64; 3];
    let mut pixel_count = 0u64;
    for y in start_y..end_y {
        for x in start_x..end_x {
            let pixel = rgb_img.get_pixel(x, y);
            for (sum, channel) in total.iter_mut().zip(pixel.0) {
                *sum += channel as u64;
            }
            pixel_count += 1;
        }
    }

    if pixel_count == 0 {
        return Color::NEUTRAL;
    }

    Color {
        r: (total[0] / pixel_count) as u8,
        g: (total[1] / pixel_count) as u8,
        b: (total[2] / pixel_count) as u8,
    }
}
