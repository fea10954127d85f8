//! Oversized images drawn through tiles match a single-texture draw

mod common;

use common::engine_with_limits;
use vecta::types::{IRect, RasterImage, Rect};
use vecta::gpu::{DeviceLimits, HeadlessDevice};
use vecta::RenderEngine;

fn pattern() -> RasterImage {
    RasterImage::from_fn(300, 200, |x, y| {
        [((x * 7 + y * 13) % 256) as u8, (x % 256) as u8, (y % 256) as u8, 255]
    })
    .unwrap()
}

fn render(max_texture_size: u32, image: &RasterImage, dest: Rect) -> RenderEngine<HeadlessDevice> {
    let limits = DeviceLimits {
        max_texture_size,
        npot_textures: true,
        ..DeviceLimits::default()
    };
    let mut engine = engine_with_limits(200, 120, limits);
    engine.draw_image(image, None, dest, true);
    engine
}

/// Every pixel of `a` has an equal pixel in `b` at most one pixel away
fn matches_within_one_pixel(a: &HeadlessDevice, b: &HeadlessDevice) -> bool {
    let (w, h) = (a.width() as i64, a.height() as i64);
    (0..h).all(|y| {
        (0..w).all(|x| {
            let want = a.pixel(x as u32, y as u32);
            (-1..=1).any(|dy| {
                (-1..=1).any(|dx| {
                    let (nx, ny) = (x + dx, y + dy);
                    nx >= 0 && ny >= 0 && nx < w && ny < h && b.pixel(nx as u32, ny as u32) == want
                })
            })
        })
    })
}

#[test]
fn test_tiled_draw_matches_unbounded_draw() {
    let image = pattern();
    // Non-uniform downscale, offsets chosen so no pixel center lands
    // exactly on a texel edge
    let dest = Rect::new(3.31, 2.17, 190.37, 97.13);
    let tiled = render(128, &image, dest);
    let whole = render(4096, &image, dest);

    assert_eq!(tiled.device().counters().texture_creates, 6);
    assert_eq!(whole.device().counters().texture_creates, 1);
    assert!(matches_within_one_pixel(tiled.device(), whole.device()));
    assert!(matches_within_one_pixel(whole.device(), tiled.device()));

    let covered = |d: &HeadlessDevice| d.count_pixels(|p| p[3] == 255);
    assert_eq!(covered(tiled.device()), covered(whole.device()));
}

#[test]
fn test_tiled_subrect_draw() {
    let image = pattern();
    let dest = Rect::new(0.0, 0.0, 160.0, 100.0);
    let source = Some(IRect::new(20, 10, 260, 150));

    let limits = DeviceLimits {
        max_texture_size: 100,
        ..DeviceLimits::default()
    };
    let mut tiled = engine_with_limits(200, 120, limits);
    tiled.draw_image(&image, source, dest, false);
    let mut whole = engine_with_limits(200, 120, DeviceLimits::default());
    whole.draw_image(&image, source, dest, false);

    // 260 x 150 in tiles of at most 100: 3 x 2
    assert_eq!(tiled.texture_stats().live_textures, 6);
    assert!(matches_within_one_pixel(tiled.device(), whole.device()));
}
