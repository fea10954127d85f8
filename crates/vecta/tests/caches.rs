//! Geometry cache idempotence and state deduplication through the engine

mod common;

use common::{engine, lit};
use vecta::gpu::{Capability, StateAttr};
use vecta::types::{Color, LineCap, LinearGradient, Paint, Path, Point, Rect, StrokeStyle};

#[test]
fn test_immutable_fill_tessellates_once() {
    let mut engine = engine(64, 64);
    engine.set_paint(Color::BLUE);
    let circle = Path::circle(Point::new(32.0, 32.0), 20.0);

    engine.fill(&circle, true, false);
    let after_first = engine.shape_tessellations();
    assert_eq!(after_first, 1);
    engine.fill(&circle, true, false);
    assert_eq!(engine.shape_tessellations(), after_first);

    let stats = engine.shape_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(engine.device().counters().list_compiles, 1);
    assert_eq!(engine.device().counters().list_calls, 2);
}

#[test]
fn test_mutable_fill_tessellates_every_call() {
    let mut engine = engine(64, 64);
    let circle = Path::circle(Point::new(32.0, 32.0), 20.0);
    for _ in 0..3 {
        engine.fill(&circle, false, false);
    }
    assert_eq!(engine.shape_tessellations(), 3);
    assert_eq!(engine.shape_stats().entries, 0);
}

#[test]
fn test_immutable_stroke_keyed_by_style() {
    let mut engine = engine(64, 64);
    let line = Path::line(Point::new(8.0, 32.0), Point::new(56.0, 32.0));
    engine.set_stroke(StrokeStyle::new(4.0).with_cap(LineCap::Square));

    engine.draw(&line, true, false);
    engine.draw(&line, true, false);
    let compiles = engine.device().counters().list_compiles;
    assert_eq!(compiles, 1);
    // (48 + 4) x 4 pixels
    assert_eq!(lit(&engine), 52 * 4);

    // A new style instance is a new key
    engine.set_stroke(StrokeStyle::new(4.0));
    engine.draw(&line, true, false);
    assert_eq!(engine.device().counters().list_compiles, compiles + 1);
}

#[test]
fn test_convex_hint_skips_tessellation() {
    let mut engine = engine(32, 32);
    engine.fill(&Path::rect(Rect::new(2.0, 2.0, 10.0, 10.0)), false, true);
    assert_eq!(engine.shape_tessellations(), 0);
    assert_eq!(engine.shape_stats().fast_paths, 1);
    assert_eq!(lit(&engine), 100);
}

#[test]
fn test_device_calls_follow_value_transitions() {
    let mut engine = engine(8, 8);
    let values = [true, true, true, false, false, true, false, false, false, true];
    let gpu = engine.gpu_mut();
    gpu.device_mut().reset_counters();
    let before = gpu.stats();
    for v in values {
        gpu.set_enabled(Capability::Multisample, v);
    }
    let mut transitions = values.windows(2).filter(|w| w[0] != w[1]).count();
    // The mirror does not know the initial value
    transitions += 1;
    assert_eq!(
        gpu.device()
            .counters()
            .state_changes_for(StateAttr::Capability(Capability::Multisample)),
        transitions as u64
    );
    let stats = gpu.stats();
    assert_eq!(stats.requests - before.requests, values.len() as u64);
    assert_eq!(stats.device_calls - before.device_calls, transitions as u64);
}

#[test]
fn test_repeated_draws_reach_the_device_once() {
    let mut engine = engine(32, 32);
    engine.set_paint(Color::GREEN);
    engine.fill(&Path::rect(Rect::new(0.0, 0.0, 4.0, 4.0)), false, true);

    // Same paint, transform and composite: every state request is elided
    let before = engine.device().counters().clone();
    for i in 1..5 {
        let x = i as f32 * 6.0;
        engine.fill(&Path::rect(Rect::new(x, 0.0, 4.0, 4.0)), false, true);
    }
    let after = engine.device().counters();
    assert_eq!(after.color_changes, before.color_changes);
    assert_eq!(after.transform_sets, before.transform_sets);
    assert_eq!(after.state_changes(), before.state_changes());
    assert_eq!(after.draws - before.draws, 4);
    assert_eq!(lit(&engine), 5 * 16);
}

#[test]
fn test_thin_gradient_stroke_is_cached() {
    let mut engine = engine(64, 64);
    engine.set_paint(Paint::LinearGradient(LinearGradient::simple(
        Point::new(0.0, 0.0),
        Point::new(64.0, 0.0),
        Color::RED,
        Color::BLUE,
    )));
    engine.set_stroke(StrokeStyle::new(0.5));
    let path = Path::rect(Rect::new(8.0, 8.0, 40.0, 40.0));
    for _ in 0..3 {
        engine.draw(&path, true, false);
    }
    let stats = engine.shape_stats();
    assert_eq!(stats.tessellations, 1);
    assert_eq!((stats.hits, stats.misses), (2, 1));
}
