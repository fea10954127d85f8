//! Clip composition through the engine

mod common;

use common::{engine, engine_with_limits, lit};
use vecta::types::{Affine2D, Path, Point, Rect};
use vecta::gpu::{ClipMechanism, DeviceLimits};
use vecta::ClipShape;

fn flood(engine: &mut vecta::RenderEngine<vecta::gpu::HeadlessDevice>) {
    engine.fill(&Path::rect(Rect::new(0.0, 0.0, 128.0, 128.0)), false, true);
}

#[test]
fn test_rect_and_circle_intersect() {
    let mut engine = engine(128, 128);
    engine.push_clip(ClipShape::Rect(Rect::new(20.0, 20.0, 60.0, 60.0)));
    assert_eq!(engine.clip_mechanism(), ClipMechanism::Scissor);
    engine.push_clip(ClipShape::Path(Path::circle(Point::new(80.0, 80.0), 30.0)));
    assert_eq!(engine.clip_mechanism(), ClipMechanism::Stencil);

    flood(&mut engine);
    // Quarter of the circle lies inside the rectangle
    let expected = std::f32::consts::PI * 30.0 * 30.0 / 4.0;
    let covered = lit(&engine) as f32;
    assert!(
        (covered - expected).abs() <= expected * 0.05,
        "covered {covered}, expected about {expected}"
    );

    // Popping the circle leaves the rectangle alone
    engine.pop_clip();
    assert_eq!(engine.clip_mechanism(), ClipMechanism::Scissor);
    engine.device_mut().clear([0, 0, 0, 0]);
    flood(&mut engine);
    assert_eq!(lit(&engine), 60 * 60);

    engine.set_clip(None);
    assert_eq!(engine.clip_mechanism(), ClipMechanism::None);
    flood(&mut engine);
    assert_eq!(lit(&engine), 128 * 128);
}

#[test]
fn test_rotated_rect_uses_planes() {
    let mut engine = engine(64, 64);
    engine.set_transform(
        Affine2D::rotate(std::f32::consts::FRAC_PI_4).then(&Affine2D::translate(32.0, 32.0)),
    );
    engine.set_clip(Some(ClipShape::Rect(Rect::new(-10.0, -10.0, 20.0, 20.0))));
    assert_eq!(engine.clip_mechanism(), ClipMechanism::Planes);

    engine.set_transform(Affine2D::IDENTITY);
    engine.fill(&Path::rect(Rect::new(0.0, 0.0, 64.0, 64.0)), false, true);
    let covered = lit(&engine) as f32;
    assert!((covered - 400.0).abs() <= 20.0, "covered {covered}");
}

#[test]
fn test_rotated_rect_without_planes_uses_stencil() {
    let limits = DeviceLimits {
        max_clip_planes: 0,
        ..DeviceLimits::default()
    };
    let mut engine = engine_with_limits(64, 64, limits);
    engine.set_transform(
        Affine2D::rotate(std::f32::consts::FRAC_PI_4).then(&Affine2D::translate(32.0, 32.0)),
    );
    engine.set_clip(Some(ClipShape::Rect(Rect::new(-10.0, -10.0, 20.0, 20.0))));
    assert_eq!(engine.clip_mechanism(), ClipMechanism::Stencil);

    engine.set_transform(Affine2D::IDENTITY);
    engine.fill(&Path::rect(Rect::new(0.0, 0.0, 64.0, 64.0)), false, true);
    let covered = lit(&engine) as f32;
    assert!((covered - 400.0).abs() <= 20.0, "covered {covered}");
}

#[test]
fn test_activate_restores_each_context_clip() {
    let mut engine = engine(64, 64);
    engine.set_clip(Some(ClipShape::Rect(Rect::new(0.0, 0.0, 10.0, 10.0))));
    let clipped = engine.context().clone();
    engine.set_clip(None);
    let unclipped = engine.context().clone();

    engine.activate(&clipped);
    flood(&mut engine);
    assert_eq!(lit(&engine), 100);

    engine.activate(&unclipped);
    assert_eq!(engine.clip_mechanism(), ClipMechanism::None);
    engine.fill(&Path::rect(Rect::new(20.0, 20.0, 10.0, 10.0)), false, true);
    assert_eq!(lit(&engine), 200);
}

#[test]
fn test_rect_clips_do_not_accumulate_lists() {
    let mut engine = engine(64, 64);
    let mut live = Vec::new();
    for _ in 0..10 {
        engine.set_clip(None);
        engine.push_clip(ClipShape::Rect(Rect::new(4.0, 4.0, 40.0, 40.0)));
        engine.push_clip(ClipShape::Rect(Rect::new(20.0, 20.0, 40.0, 40.0)));
        assert_eq!(engine.clip_mechanism(), ClipMechanism::Stencil);
        flood(&mut engine);
        engine.flush_pending_deletions();
        live.push((engine.shape_stats().entries, engine.device().live_lists()));
    }
    assert!(live.iter().all(|&l| l == live[0]), "{live:?}");
    assert_eq!(live[0], (0, 0));
    // 24 x 24 overlap
    assert_eq!(lit(&engine), 24 * 24);
}
