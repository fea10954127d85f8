//! Oversized image tiling
//!
//! Images larger than the device's maximum texture dimension are drawn as a
//! grid of sub-rectangle draws. Each tile's destination is the proportional
//! slice of the full destination, so a non-uniform source to destination
//! scale stays continuous across tile edges.

use vecta_core::{IRect, Rect};

/// One sub-draw: a source sub-rectangle and where it lands
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageTile {
    pub source: IRect,
    pub dest: Rect,
}

/// Split the draw of `source` into `dest` into tiles no larger than
/// `max_size` on either axis
///
/// A source that already fits yields a single tile equal to the input.
pub fn tile_image_draw(source: IRect, dest: Rect, max_size: u32) -> Vec<ImageTile> {
    if source.is_empty() || max_size == 0 {
        return Vec::new();
    }
    let sx = dest.width / source.width as f32;
    let sy = dest.height / source.height as f32;

    let spans = |len: u32| {
        let mut out = Vec::new();
        let mut start = 0;
        while start < len {
            let size = max_size.min(len - start);
            out.push((start, size));
            start += size;
        }
        out
    };

    let mut tiles = Vec::new();
    for (ty, th) in spans(source.height) {
        for (tx, tw) in spans(source.width) {
            tiles.push(ImageTile {
                source: IRect::new(source.x + tx as i32, source.y + ty as i32, tw, th),
                dest: Rect::new(
                    dest.x + tx as f32 * sx,
                    dest.y + ty as f32 * sy,
                    tw as f32 * sx,
                    th as f32 * sy,
                ),
            });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitting_image_is_one_tile() {
        let tiles = tile_image_draw(IRect::new(0, 0, 64, 32), Rect::new(1.0, 2.0, 10.0, 5.0), 128);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].source, IRect::new(0, 0, 64, 32));
        assert_eq!(tiles[0].dest, Rect::new(1.0, 2.0, 10.0, 5.0));
    }

    #[test]
    fn test_tiles_partition_source_and_dest() {
        let src = IRect::new(10, 0, 300, 200);
        let dst = Rect::new(0.0, 0.0, 150.0, 400.0);
        let tiles = tile_image_draw(src, dst, 128);
        assert_eq!(tiles.len(), 3 * 2);
        let texels: u64 = tiles
            .iter()
            .map(|t| t.source.width as u64 * t.source.height as u64)
            .sum();
        assert_eq!(texels, 300 * 200);
        let area: f32 = tiles.iter().map(|t| t.dest.width * t.dest.height).sum();
        assert!((area - 150.0 * 400.0).abs() < 1e-2);
        for t in &tiles {
            assert!(t.source.width <= 128 && t.source.height <= 128);
            // Non-uniform scale preserved per tile
            assert!((t.dest.width / t.source.width as f32 - 0.5).abs() < 1e-6);
            assert!((t.dest.height / t.source.height as f32 - 2.0).abs() < 1e-6);
        }
        let last = tiles.last().unwrap();
        assert_eq!(last.source, IRect::new(266, 128, 44, 72));
        assert!((last.dest.max_x() - 150.0).abs() < 1e-4);
    }
}
