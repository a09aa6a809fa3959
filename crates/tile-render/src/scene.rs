//! A laid-out scene and its concurrent draw
//!
//! A scene is handed out while it is still being built. The builder owns the
//! only writer: it edits a working body through [`Scene::body_mut`], and every
//! time that guard is released the body is published as an immutable
//! snapshot together with its memory cost. Renderers and the cache only ever
//! see snapshots, so drawing or pruning never waits on a running layout.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::debug;

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::elements::{Photo, Solid, Text};
use crate::geometry::{Rect, View};
use crate::selector::{BitmapSelector, DrawOutcome};

/// Mutable content of a scene, written by its builder
#[derive(Debug, Clone, Default)]
pub struct SceneBody {
    pub bounds: Rect,
    pub photos: Vec<Photo>,
    pub solids: Vec<Solid>,
    pub texts: Vec<Text>,
    pub search: Option<String>,
    pub search_embedding: Option<Vec<f32>>,
    /// Why the build failed, if it did
    pub error: Option<String>,
    pub load_time: Option<Duration>,
}

impl SceneBody {
    fn memory_cost(&self) -> u64 {
        let elements = self.photos.len() * std::mem::size_of::<Photo>()
            + self.solids.len() * std::mem::size_of::<Solid>()
            + self.texts.len() * std::mem::size_of::<Text>();
        (std::mem::size_of::<Scene>() + elements) as u64
    }
}

/// Something a scene was built from; the scene is stale once it changed later
pub trait Dependency: Send + Sync + fmt::Debug {
    /// Last modification, `None` if never modified
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

#[derive(Debug)]
pub struct Scene {
    id: String,
    created_at: DateTime<Utc>,
    loading: AtomicBool,
    stale: AtomicBool,
    file_count: AtomicUsize,
    cost: AtomicU64,
    working: Mutex<SceneBody>,
    published: RwLock<Arc<SceneBody>>,
    dependencies: Mutex<Vec<Arc<dyn Dependency>>>,
}

/// Write access to a scene body; publishes a snapshot when dropped
pub struct SceneBodyMut<'a> {
    scene: &'a Scene,
    body: MutexGuard<'a, SceneBody>,
}

impl Deref for SceneBodyMut<'_> {
    type Target = SceneBody;

    fn deref(&self) -> &SceneBody {
        &self.body
    }
}

impl DerefMut for SceneBodyMut<'_> {
    fn deref_mut(&mut self) -> &mut SceneBody {
        &mut self.body
    }
}

impl Drop for SceneBodyMut<'_> {
    fn drop(&mut self) {
        self.scene.publish(&self.body);
    }
}

impl Scene {
    /// Empty scene that is still loading
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_created_at(id, Utc::now())
    }

    pub fn with_created_at(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let body = SceneBody::default();
        Self {
            id: id.into(),
            created_at,
            loading: AtomicBool::new(true),
            stale: AtomicBool::new(false),
            file_count: AtomicUsize::new(0),
            cost: AtomicU64::new(body.memory_cost()),
            published: RwLock::new(Arc::new(body.clone())),
            working: Mutex::new(body),
            dependencies: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Number of photos placed so far; updated as the build progresses
    pub fn file_count(&self) -> usize {
        self.file_count.load(Ordering::Acquire)
    }

    pub fn set_file_count(&self, count: usize) {
        self.file_count.store(count, Ordering::Release);
    }

    /// Latest published snapshot of the body
    pub fn body(&self) -> Arc<SceneBody> {
        Arc::clone(&self.published.read())
    }

    /// Edit the working body; only the builder should hold this
    pub fn body_mut(&self) -> SceneBodyMut<'_> {
        SceneBodyMut {
            scene: self,
            body: self.working.lock(),
        }
    }

    fn publish(&self, body: &SceneBody) {
        let snapshot = Arc::new(body.clone());
        self.cost.store(snapshot.memory_cost(), Ordering::Release);
        *self.published.write() = snapshot;
    }

    pub fn bounds(&self) -> Rect {
        self.published.read().bounds
    }

    pub fn error(&self) -> Option<String> {
        self.published.read().error.clone()
    }

    /// Mark the build as done, successful or not
    pub fn finish_loading(&self, elapsed: Duration, error: Option<String>) {
        {
            let mut body = self.body_mut();
            body.load_time = Some(elapsed);
            if error.is_some() {
                body.error = error;
            }
            self.set_file_count(body.photos.len());
        }
        self.loading.store(false, Ordering::Release);
    }

    /// Estimated bytes held by the scene as of the last published snapshot
    pub fn memory_cost(&self) -> u64 {
        self.cost.load(Ordering::Acquire)
    }

    pub fn add_dependency(&self, dependency: Arc<dyn Dependency>) {
        self.dependencies.lock().push(dependency);
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Recheck dependencies; stale when any changed after the scene was created
    pub fn update_staleness(&self) -> bool {
        let stale = self
            .dependencies
            .lock()
            .iter()
            .any(|dep| dep.updated_at().is_some_and(|at| at > self.created_at));
        self.stale.store(stale, Ordering::Release);
        stale
    }

    /// Draw solids, then visible photos on a pool of workers, then texts
    ///
    /// Draws the snapshot published when the call started and blocks until
    /// every visible photo has been drawn.
    pub fn draw(
        &self,
        config: &RenderConfig,
        canvas: &dyn Canvas,
        view: &View,
        selector: &BitmapSelector,
    ) -> DrawStats {
        let body = self.body();

        for solid in &body.solids {
            solid.draw(canvas, view);
        }

        let visible = view.visible();
        let visible_count = body
            .photos
            .iter()
            .filter(|p| p.rect.intersects(&visible))
            .count();
        let workers = config.worker_count(visible_count);

        let (sender, receiver) = mpsc::channel::<&Photo>();
        let receiver = Mutex::new(receiver);
        let stats = Mutex::new(DrawStats {
            visible: visible_count,
            ..DrawStats::default()
        });

        rayon::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    let mut local = DrawStats::default();
                    loop {
                        let next = receiver.lock().recv();
                        let Ok(photo) = next else {
                            break;
                        };
                        local.record(&selector.draw(config, photo, canvas, view));
                    }
                    stats.lock().merge(&local);
                });
            }

            for photo in body.photos.iter().filter(|p| p.rect.intersects(&visible)) {
                if sender.send(photo).is_err() {
                    break;
                }
            }
            drop(sender);
        });

        for text in &body.texts {
            text.draw(canvas, view);
        }

        let stats = stats.into_inner();
        debug!(
            scene = %self.id,
            visible = stats.visible,
            drawn = stats.drawn,
            placeholders = stats.placeholders,
            workers,
            "scene drawn"
        );
        stats
    }
}

/// Tally of draw outcomes for one tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub visible: usize,
    pub drawn: usize,
    pub swatches: usize,
    pub placeholders: usize,
    pub skipped: usize,
}

impl DrawStats {
    fn record(&mut self, outcome: &DrawOutcome) {
        match outcome {
            DrawOutcome::Skipped => self.skipped += 1,
            DrawOutcome::Swatch => self.swatches += 1,
            DrawOutcome::Drawn { .. } => self.drawn += 1,
            DrawOutcome::Placeholder { .. } => self.placeholders += 1,
        }
    }

    fn merge(&mut self, other: &DrawStats) {
        self.drawn += other.drawn;
        self.swatches += other.swatches;
        self.placeholders += other.placeholders;
        self.skipped += other.skipped;
    }
}
