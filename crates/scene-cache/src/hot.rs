//! Cost-bounded hot-access cache in front of the scene store
//!
//! Weighs each scene by its memory cost at insertion time. The store
//! re-inserts a scene when its build finishes so the weight follows the
//! laid-out size rather than the empty placeholder.

use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tile_render::Scene;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotStats {
    pub entries: u64,
    pub total_cost: u64,
    pub hits: u64,
    pub misses: u64,
}

pub struct HotScenes {
    scenes: Cache<String, Arc<Scene>>,
    max_cost: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HotScenes {
    pub fn new(max_cost: u64) -> Self {
        let scenes = Cache::builder()
            .max_capacity(max_cost)
            .weigher(|_id: &String, scene: &Arc<Scene>| -> u32 {
                scene.memory_cost().min(u32::MAX as u64) as u32
            })
            .build();
        Self {
            scenes,
            max_cost,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Scene>> {
        let found = self.scenes.get(id);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, scene: Arc<Scene>) {
        self.scenes.insert(scene.id().to_string(), scene);
    }

    /// Re-weigh `scene` if it is cached
    pub fn refresh(&self, scene: &Arc<Scene>) {
        if self.scenes.contains_key(scene.id()) {
            self.insert(Arc::clone(scene));
        }
    }

    pub fn remove(&self, id: &str) {
        self.scenes.invalidate(id);
    }

    pub fn clear(&self) {
        self.scenes.invalidate_all();
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    pub fn stats(&self) -> HotStats {
        self.scenes.run_pending_tasks();
        HotStats {
            entries: self.scenes.entry_count(),
            total_cost: self.scenes.weighted_size(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for HotScenes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotScenes")
            .field("entries", &self.scenes.entry_count())
            .field("max_cost", &self.max_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_source::{ImageId, Size};
    use tile_render::Photo;

    fn scene_with(id: &str, photos: u32) -> Arc<Scene> {
        let scene = Arc::new(Scene::new(id));
        {
            let mut body = scene.body_mut();
            for i in 0..photos {
                body.photos.push(Photo::new(ImageId(i), "/p.jpg", Size::new(10, 10)));
            }
        }
        scene
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let hot = HotScenes::new(1 << 20);
        hot.insert(scene_with("a", 1));
        assert!(hot.get("a").is_some());
        assert!(hot.get("b").is_none());

        let stats = hot.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_refresh_reweighs_grown_scene() {
        let hot = HotScenes::new(1 << 20);
        let scene = scene_with("a", 0);
        hot.insert(Arc::clone(&scene));
        let before = hot.stats().total_cost;

        scene.body_mut().photos.push(Photo::new(ImageId(1), "/p.jpg", Size::new(10, 10)));
        hot.refresh(&scene);
        assert!(hot.stats().total_cost > before);

        // Absent scenes are not pulled in by a refresh
        hot.refresh(&scene_with("b", 1));
        assert_eq!(hot.stats().entries, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let hot = HotScenes::new(1 << 20);
        hot.insert(scene_with("a", 1));
        hot.insert(scene_with("b", 1));
        hot.remove("a");
        assert!(hot.get("a").is_none());
        hot.clear();
        assert!(hot.get("b").is_none());
        assert_eq!(hot.max_cost(), 1 << 20);
    }
}
