//! Tessellation area and orientation over generated polygons

mod common;

use common::{polygon_area, star_polygon, Lcg};
use vecta::types::{FillRule, Point};
use vecta::gpu::{Contour, GeometryCollector, Tessellator};

#[test]
fn test_simple_polygons_cover_their_area() {
    let mut rng = Lcg::new(0x5eed);
    let mut tess = Tessellator::new();
    for round in 0..40 {
        let n = 5 + (rng.next_f32() * 30.0) as usize;
        let points = star_polygon(&mut rng, Point::new(100.0, 100.0), n);
        let expected = polygon_area(&points);

        for rule in [FillRule::NonZero, FillRule::EvenOdd] {
            let mut collector = GeometryCollector::new();
            let contour = Contour::from_points(points.iter().copied(), true);
            if let Err(e) = tess.tessellate(&[contour], rule, &mut collector) {
                panic!("round {round}: tessellation failed: {e}");
            }
            let geometry = collector.finish();
            let area = geometry.covered_area();
            assert!(
                (area - expected).abs() <= expected * 1e-3,
                "round {round} {rule:?}: {area} vs {expected}"
            );
            for tri in geometry.triangles() {
                assert!(geometry.signed_area(tri) > 0.0, "round {round}: degenerate triangle");
            }
        }
    }
}

#[test]
fn test_reversed_winding_gives_same_area() {
    let mut rng = Lcg::new(7);
    let mut points = star_polygon(&mut rng, Point::new(0.0, 0.0), 12);
    let expected = polygon_area(&points);
    points.reverse();

    let mut collector = GeometryCollector::new();
    let mut tess = Tessellator::new();
    tess.tessellate(
        &[Contour::from_points(points, true)],
        FillRule::NonZero,
        &mut collector,
    )
    .unwrap();
    let area = collector.finish().covered_area();
    assert!((area - expected).abs() <= expected * 1e-3);
}
