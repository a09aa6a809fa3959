use image_source::Color;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tile rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub tile_size: u32,
    /// Photos whose whole rect covers less tile area than this are not drawn
    pub min_pixel_area: f64,
    /// Photos below this area are drawn as a flat swatch without fetching
    pub max_solid_pixel_area: f64,
    /// Draw workers per tile; 0 uses the rayon pool size
    pub workers: usize,
    pub background_color: Color,
    /// How long a source's existence answer for a photo is trusted
    pub exists_ttl_secs: u64,
    /// Upper bound on cached existence answers
    pub exists_capacity: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            min_pixel_area: 0.1,
            max_solid_pixel_area: 0.0,
            workers: 0,
            background_color: Color::new(255, 255, 255),
            exists_ttl_secs: 60,
            exists_capacity: 100_000,
        }
    }
}

impl RenderConfig {
    pub fn exists_ttl(&self) -> Duration {
        Duration::from_secs(self.exists_ttl_secs)
    }

    /// Worker count for a draw with `visible` photos, never zero
    pub fn worker_count(&self, visible: usize) -> usize {
        let workers = if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        };
        workers.min(visible).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_partial_json() {
        let config: RenderConfig = serde_json::from_str(r#"{"tile_size": 512, "workers": 3}"#).unwrap();
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.min_pixel_area, 0.1);
        assert_eq!(config.worker_count(10), 3);
        assert_eq!(config.worker_count(2), 2);
        assert_eq!(config.worker_count(0), 1);
        assert_eq!(config.exists_ttl(), Duration::from_secs(60));
    }
}
