use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image_source::{Color, ImageId, Size, SourcesConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tile_render::{render_tile, BitmapSelector, DrawOutcome, Photo, Point, RenderConfig, Scene, TileRequest, View};

const SOURCES: &str = r#"{
    "sources": [
        { "name": "original", "kind": "original", "cost": { "time_per_megapixel": 20.0 } },
        {
            "name": "thumb-S",
            "kind": "thumb",
            "path": "{dir}thumbs/{stem}_S.png",
            "width": 120,
            "height": 120,
            "fit": "INSIDE",
            "cached": true
        },
        {
            "name": "thumb-M",
            "kind": "thumb",
            "path": "{dir}thumbs/{stem}_M.png",
            "width": 320,
            "height": 320,
            "fit": "INSIDE",
            "cached": true
        }
    ]
}"#;

fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) -> Result<()> {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
        .save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

fn photo(path: &Path) -> Photo {
    let mut photo = Photo::new(ImageId(1), path, Size::new(4000, 3000));
    photo.color = Color::new(200, 0, 200);
    photo.place(0.0, 0.0, 320.0, 240.0);
    photo
}

#[test]
fn test_draws_next_best_thumbnail_when_best_is_missing() -> Result<()> {
    let dir = tempdir()?;
    let original = dir.path().join("IMG_0001.jpg");
    // Ranked last at this zoom, so its content is never decoded
    fs::write(&original, b"not decoded")?;
    fs::create_dir(dir.path().join("thumbs"))?;
    write_png(&dir.path().join("thumbs/IMG_0001_S.png"), 120, 90, [0, 255, 0])?;

    let registry = Arc::new(SourcesConfig::from_json(SOURCES)?.build()?);
    let config = RenderConfig::default();
    let selector = BitmapSelector::new(Arc::clone(&registry), &config);

    // One canvas unit per tile pixel: thumb-M would be drawn one-to-one
    let view = View::new(1.0, Point::default(), 320);
    let photo = photo(&original);

    let ranked: Vec<String> = selector
        .candidates(&photo, &view)
        .iter()
        .map(|c| c.name.to_string())
        .collect();
    assert_eq!(ranked, ["thumb-M", "thumb-S", "original"]);

    let canvas = tile_render::RasterCanvas::new(320, 320, config.background_color);
    let outcome = selector.draw(&config, &photo, &canvas, &view);
    assert_eq!(outcome.drawn_source(), Some("thumb-S"));
    assert_eq!(canvas.pixel(160, 120), Some([0, 255, 0, 255]));

    // The thumbnail is now served from the shared result cache
    let stats = registry.cache().stats();
    assert_eq!(stats.entries, 1);
    selector.draw(&config, &photo, &canvas, &view);
    assert_eq!(registry.cache().stats().hits, 1);
    Ok(())
}

#[test]
fn test_placeholder_when_no_source_has_the_photo() -> Result<()> {
    let dir = tempdir()?;
    let original = dir.path().join("IMG_0002.jpg");
    fs::write(&original, b"truncated jpeg")?;

    let registry = Arc::new(SourcesConfig::from_json(SOURCES)?.build()?);
    let config = RenderConfig::default();
    let selector = BitmapSelector::new(registry, &config);
    let view = View::new(1.0, Point::default(), 320);
    let photo = photo(&original);

    let canvas = tile_render::RasterCanvas::new(320, 320, config.background_color);
    match selector.draw(&config, &photo, &canvas, &view) {
        DrawOutcome::Placeholder { errors } => assert_eq!(errors.len(), 1),
        other => panic!("expected placeholder, got {:?}", other),
    }
    assert_eq!(canvas.pixel(160, 120), Some([200, 0, 200, 255]));
    Ok(())
}

#[test]
fn test_render_tile_of_scene() -> Result<()> {
    let dir = tempdir()?;
    let original = dir.path().join("IMG_0003.jpg");
    fs::write(&original, b"not decoded")?;
    fs::create_dir(dir.path().join("thumbs"))?;
    write_png(&dir.path().join("thumbs/IMG_0003_M.png"), 320, 240, [0, 0, 255])?;

    let scene = Scene::new("6789BCDFGH");
    {
        let mut body = scene.body_mut();
        body.bounds = tile_render::Rect::new(0.0, 0.0, 320.0, 240.0);
        body.photos.push(photo(&original));
    }
    scene.finish_loading(std::time::Duration::from_millis(1), None);

    let registry = Arc::new(SourcesConfig::from_json(SOURCES)?.build()?);
    let config = RenderConfig {
        tile_size: 320,
        ..RenderConfig::default()
    };
    let selector = BitmapSelector::new(registry, &config);

    let (tile, stats) = render_tile(&scene, &config, &selector, TileRequest::new(0, 0, 0));
    assert_eq!(tile.dimensions(), (320, 320));
    assert_eq!(stats.drawn, 1);
    assert_eq!(tile.get_pixel(160, 120).0, [0, 0, 255, 255]);
    // Below the scene the background shows through
    assert_eq!(tile.get_pixel(160, 300).0, [255, 255, 255, 255]);
    Ok(())
}
