//! Scene configuration and the equivalence used for scene reuse

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// The photos a scene is built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub id: String,
    pub name: String,
    pub dirs: Vec<String>,
    /// Maximum number of photos placed, 0 for no limit
    pub limit: usize,
    /// Maximum number of photos indexed, 0 for no limit
    pub index_limit: usize,
}

impl CollectionConfig {
    fn dir_set(&self) -> HashSet<&str> {
        self.dirs.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayoutKind {
    #[default]
    Album,
    Timeline,
    Square,
    Wall,
    Map,
    Search,
    Strip,
    Highlights,
    Flex,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 9] = [
        LayoutKind::Album,
        LayoutKind::Timeline,
        LayoutKind::Square,
        LayoutKind::Wall,
        LayoutKind::Map,
        LayoutKind::Search,
        LayoutKind::Strip,
        LayoutKind::Highlights,
        LayoutKind::Flex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::Album => "ALBUM",
            LayoutKind::Timeline => "TIMELINE",
            LayoutKind::Square => "SQUARE",
            LayoutKind::Wall => "WALL",
            LayoutKind::Map => "MAP",
            LayoutKind::Search => "SEARCH",
            LayoutKind::Strip => "STRIP",
            LayoutKind::Highlights => "HIGHLIGHTS",
            LayoutKind::Flex => "FLEX",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Photo ordering; written as `"+date"` / `"-date"` in config files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Order {
    #[default]
    None,
    DateAsc,
    DateDesc,
}

impl Order {
    /// Unrecognized sort expressions mean no particular order
    pub fn from_sort(sort: &str) -> Self {
        match sort.trim() {
            "+date" | "date" => Order::DateAsc,
            "-date" => Order::DateDesc,
            _ => Order::None,
        }
    }

    pub fn as_sort(&self) -> &'static str {
        match self {
            Order::None => "",
            Order::DateAsc => "+date",
            Order::DateDesc => "-date",
        }
    }
}

impl From<String> for Order {
    fn from(sort: String) -> Self {
        Order::from_sort(&sort)
    }
}

impl From<Order> for String {
    fn from(order: Order) -> Self {
        order.as_sort().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Unset means the default layout
    pub kind: Option<LayoutKind>,
    pub order: Order,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub image_height: f64,
    pub tweaks: String,
}

impl LayoutConfig {
    pub fn kind_or_default(&self) -> LayoutKind {
        self.kind.unwrap_or_default()
    }
}

/// Everything that determines the content of a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub collection: CollectionConfig,
    pub layout: LayoutConfig,
    /// Search expression: free text or `img:<id>` for a reference image
    pub search: Option<String>,
    /// Reuse this id instead of generating one
    pub scene_id: Option<String>,
}

impl SceneConfig {
    pub fn search_text(&self) -> &str {
        self.search.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid scene config")
    }

    pub fn equivalent(&self, other: &SceneConfig) -> bool {
        scene_config_equal(self, other)
    }
}

fn dimension_equal(a: f64, b: f64) -> bool {
    a == 0.0 || b == 0.0 || a == b
}

/// Whether two configs would produce the same scene
///
/// The pinned scene id is ignored. Directory order does not matter. A zero
/// viewport or image dimension and an unset layout kind match anything.
pub fn scene_config_equal(a: &SceneConfig, b: &SceneConfig) -> bool {
    if a.collection.limit != b.collection.limit || a.collection.index_limit != b.collection.index_limit {
        return false;
    }
    if a.collection.dir_set() != b.collection.dir_set() {
        return false;
    }

    let (la, lb) = (&a.layout, &b.layout);
    if !dimension_equal(la.viewport_width, lb.viewport_width)
        || !dimension_equal(la.viewport_height, lb.viewport_height)
        || !dimension_equal(la.image_height, lb.image_height)
    {
        return false;
    }
    if la.tweaks != lb.tweaks {
        return false;
    }
    if let (Some(ka), Some(kb)) = (la.kind, lb.kind) {
        if ka != kb {
            return false;
        }
    }
    if la.order != lb.order {
        return false;
    }

    a.search_text() == b.search_text()
}

/// Byte budgets of the scene store and its hot-access cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneCacheConfig {
    pub max_bytes: u64,
    pub hot_max_bytes: u64,
}

impl Default for SceneCacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1 << 26,
            hot_max_bytes: 1 << 24,
        }
    }
}

impl SceneCacheConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene cache config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scene cache config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SceneConfig {
        SceneConfig {
            collection: CollectionConfig {
                id: "vacation".into(),
                name: "Vacation".into(),
                dirs: vec!["/photos/2023".into(), "/photos/2024".into()],
                limit: 1000,
                index_limit: 0,
            },
            layout: LayoutConfig {
                kind: Some(LayoutKind::Album),
                order: Order::DateAsc,
                viewport_width: 1280.0,
                viewport_height: 720.0,
                image_height: 200.0,
                tweaks: String::new(),
            },
            search: Some("beach".into()),
            scene_id: Some("6789BCDFGH".into()),
        }
    }

    #[test]
    fn test_equal_ignoring_id_and_dir_order() {
        let a = base();
        let mut b = base();
        b.scene_id = Some("zzzzzzzzzz".into());
        b.collection.dirs.reverse();
        assert!(scene_config_equal(&a, &b));
        assert!(scene_config_equal(&b, &a));
    }

    #[test]
    fn test_any_single_difference_breaks_equality() {
        let changes: [(&str, fn(&mut SceneConfig)); 11] = [
            ("limit", |c| c.collection.limit = 10),
            ("index limit", |c| c.collection.index_limit = 5),
            ("dirs", |c| c.collection.dirs.push("/photos/2025".into())),
            ("dir removed", |c| {
                c.collection.dirs.pop();
            }),
            ("kind", |c| c.layout.kind = Some(LayoutKind::Timeline)),
            ("width", |c| c.layout.viewport_width = 1920.0),
            ("height", |c| c.layout.viewport_height = 1080.0),
            ("image height", |c| c.layout.image_height = 100.0),
            ("order", |c| c.layout.order = Order::DateDesc),
            ("tweaks", |c| c.layout.tweaks = "dense".into()),
            ("search", |c| c.search = Some("mountain".into())),
        ];

        for (name, change) in changes {
            let a = base();
            let mut b = base();
            change(&mut b);
            assert!(!scene_config_equal(&a, &b), "{} should break equality", name);
        }
    }

    #[test]
    fn test_unset_fields_match_anything() {
        let a = base();
        let mut b = base();
        b.layout.viewport_width = 0.0;
        b.layout.kind = None;
        assert!(scene_config_equal(&a, &b));

        b.search = None;
        assert!(!scene_config_equal(&a, &b));
        let mut c = base();
        c.search = Some("  ".into());
        assert!(scene_config_equal(&b, &c));
    }

    #[test]
    fn test_parse_scene_config() -> Result<()> {
        let config = SceneConfig::from_json(
            r#"{
                "collection": { "id": "c", "dirs": ["/a"], "limit": 10 },
                "layout": { "kind": "TIMELINE", "order": "-date", "viewport_width": 800 },
                "search": "img:42"
            }"#,
        )?;
        assert_eq!(config.layout.kind, Some(LayoutKind::Timeline));
        assert_eq!(config.layout.order, Order::DateDesc);
        assert_eq!(config.collection.limit, 10);
        assert_eq!(config.search_text(), "img:42");
        assert!(config.scene_id.is_none());

        assert!(SceneConfig::from_json(r#"{"layout": {"kind": "SPIRAL"}}"#).is_err());
        Ok(())
    }

    #[test]
    fn test_sort_expressions_are_lenient() -> Result<()> {
        let parse = |order: &str| -> Result<Order> {
            let json = format!(r#"{{"layout": {{"order": "{}"}}}}"#, order);
            Ok(SceneConfig::from_json(&json)?.layout.order)
        };
        assert_eq!(parse("date")?, Order::DateAsc);
        assert_eq!(parse(" -date ")?, Order::DateDesc);
        assert_eq!(parse("name")?, Order::None);

        let mut config = SceneConfig::default();
        config.layout.order = Order::DateDesc;
        let json = serde_json::to_string(&config)?;
        assert!(json.contains(r#""order":"-date""#));
        assert_eq!(SceneConfig::from_json(&json)?, config);
        Ok(())
    }

    #[test]
    fn test_cache_config_defaults_and_load() -> Result<()> {
        assert_eq!(SceneCacheConfig::default().max_bytes, 64 * 1024 * 1024);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scenes.json");
        std::fs::write(&path, r#"{ "max_bytes": 4096 }"#)?;
        let config = SceneCacheConfig::load(&path)?;
        assert_eq!(config.max_bytes, 4096);
        assert_eq!(config.hot_max_bytes, SceneCacheConfig::default().hot_max_bytes);
        Ok(())
    }
}
