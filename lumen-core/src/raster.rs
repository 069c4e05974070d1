//! Integer rasterizer
//!
//! All primitives are written against [`PixelSink`], so the same code draws
//! into a single canvas or across matrix segments. Coordinates are widened
//! to `i32` before any arithmetic; pixels outside the sink are dropped.

use heapless::Vec;
use lumen_protocol::{Rgb, MAX_POLYGON_VERTICES};

/// Something pixels can be written into
pub trait PixelSink {
    /// Drawable width and height
    fn size(&self) -> (i32, i32);

    /// Write one pixel, returning `false` when it falls outside the sink
    fn plot(&mut self, x: i32, y: i32, color: Rgb) -> bool;

    /// Write a horizontal run from `x0` to `x1` inclusive
    fn span(&mut self, y: i32, x0: i32, x1: i32, color: Rgb) {
        let (width, height) = self.size();
        if y < 0 || y >= height {
            return;
        }
        let (lo, hi) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        for x in lo.max(0)..=hi.min(width - 1) {
            self.plot(x, y, color);
        }
    }
}

impl<S: PixelSink + ?Sized> PixelSink for &mut S {
    fn size(&self) -> (i32, i32) {
        (**self).size()
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgb) -> bool {
        (**self).plot(x, y, color)
    }

    fn span(&mut self, y: i32, x0: i32, x1: i32, color: Rgb) {
        (**self).span(y, x0, x1, color)
    }
}

/// Bresenham line between two points, both ends included
pub fn line<S: PixelSink + ?Sized>(sink: &mut S, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
    if y0 == y1 {
        sink.span(y0, x0, x1, color);
        return;
    }

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        sink.plot(x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Rectangle outline; empty when either side is not positive
pub fn rect<S: PixelSink + ?Sized>(sink: &mut S, x: i32, y: i32, w: i32, h: i32, color: Rgb) {
    if w <= 0 || h <= 0 {
        return;
    }
    let (x1, y1) = (x + w - 1, y + h - 1);
    sink.span(y, x, x1, color);
    sink.span(y1, x, x1, color);
    for row in (y + 1)..y1 {
        sink.plot(x, row, color);
        sink.plot(x1, row, color);
    }
}

/// Filled rectangle, clipped to the sink
pub fn fill_rect<S: PixelSink + ?Sized>(sink: &mut S, x: i32, y: i32, w: i32, h: i32, color: Rgb) {
    if w <= 0 || h <= 0 {
        return;
    }
    let (_, height) = sink.size();
    for row in y.max(0)..(y + h).min(height) {
        sink.span(row, x, x + w - 1, color);
    }
}

/// Midpoint circle outline
pub fn circle<S: PixelSink + ?Sized>(sink: &mut S, cx: i32, cy: i32, radius: i32, color: Rgb) {
    if radius < 0 {
        return;
    }
    let (mut x, mut y) = (radius, 0);
    let mut err = 1 - radius;

    while x >= y {
        for (px, py) in [
            (cx + x, cy + y),
            (cx + y, cy + x),
            (cx - y, cy + x),
            (cx - x, cy + y),
            (cx - x, cy - y),
            (cx - y, cy - x),
            (cx + y, cy - x),
            (cx + x, cy - y),
        ] {
            sink.plot(px, py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Midpoint circle, filled with horizontal spans
pub fn fill_circle<S: PixelSink + ?Sized>(sink: &mut S, cx: i32, cy: i32, radius: i32, color: Rgb) {
    if radius < 0 {
        return;
    }
    let (mut x, mut y) = (radius, 0);
    let mut err = 1 - radius;

    while x >= y {
        sink.span(cy + y, cx - x, cx + x, color);
        sink.span(cy - y, cx - x, cx + x, color);
        sink.span(cy + x, cx - y, cx + y, color);
        sink.span(cy - x, cx - y, cx + y, color);
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Triangle outline
pub fn triangle<S: PixelSink + ?Sized>(sink: &mut S, points: [(i32, i32); 3], color: Rgb) {
    let [a, b, c] = points;
    line(sink, a.0, a.1, b.0, b.1, color);
    line(sink, b.0, b.1, c.0, c.1, color);
    line(sink, c.0, c.1, a.0, a.1, color);
}

/// Scanline polygon fill (even-odd), edges included
///
/// At most [`MAX_POLYGON_VERTICES`] vertices are used.
pub fn fill_polygon<S: PixelSink + ?Sized>(sink: &mut S, vertices: &[(i32, i32)], color: Rgb) {
    let vertices = &vertices[..vertices.len().min(MAX_POLYGON_VERTICES as usize)];
    if vertices.is_empty() {
        return;
    }

    let (_, height) = sink.size();
    let top = vertices.iter().map(|v| v.1).min().unwrap_or(0).max(0);
    let bottom = vertices.iter().map(|v| v.1).max().unwrap_or(0).min(height - 1);

    for y in top..=bottom {
        let mut crossings: Vec<i32, { MAX_POLYGON_VERTICES as usize }> = Vec::new();
        for (i, &(ax, ay)) in vertices.iter().enumerate() {
            let (bx, by) = vertices[(i + 1) % vertices.len()];
            if ay == by {
                continue;
            }
            // Half-open in y so shared vertices count once
            let (lo, hi) = if ay < by { (ay, by) } else { (by, ay) };
            if y >= lo && y < hi {
                // Products of i16-range deltas overflow i32
                let dx = i64::from(y - ay) * i64::from(bx - ax) / i64::from(by - ay);
                let _ = crossings.push(ax + dx as i32);
            }
        }
        crossings.sort_unstable();
        for pair in crossings.chunks_exact(2) {
            sink.span(y, pair[0], pair[1], color);
        }
    }

    for (i, &(ax, ay)) in vertices.iter().enumerate() {
        let (bx, by) = vertices[(i + 1) % vertices.len()];
        line(sink, ax, ay, bx, by, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::Canvas;

    fn lit(canvas: &Canvas, x: u16, y: u16) -> bool {
        canvas.get(x, y) != Some(Rgb::BLACK)
    }

    #[test]
    fn test_line_endpoints_and_diagonal() {
        let mut canvas = Canvas::new(8, 8);
        line(&mut canvas, 0, 0, 7, 7, Rgb::WHITE);
        for i in 0..8 {
            assert!(lit(&canvas, i, i));
        }
        assert_eq!(canvas.lit_count(), 8);
    }

    #[test]
    fn test_line_reverse_direction() {
        let mut a = Canvas::new(16, 16);
        let mut b = Canvas::new(16, 16);
        line(&mut a, 1, 2, 12, 9, Rgb::RED);
        line(&mut b, 12, 9, 1, 2, Rgb::RED);
        assert!(lit(&b, 1, 2) && lit(&b, 12, 9));
        assert_eq!(a.lit_count(), b.lit_count());
    }

    #[test]
    fn test_line_clipped() {
        let mut canvas = Canvas::new(4, 4);
        line(&mut canvas, -10, 1, 10, 1, Rgb::WHITE);
        assert_eq!(canvas.lit_count(), 4);
    }

    #[test]
    fn test_rect_outline() {
        let mut canvas = Canvas::new(8, 8);
        rect(&mut canvas, 1, 1, 4, 3, Rgb::GREEN);
        // Perimeter of a 4x3 box
        assert_eq!(canvas.lit_count(), 10);
        assert!(!lit(&canvas, 2, 2));
        assert!(lit(&canvas, 4, 3));
    }

    #[test]
    fn test_fill_rect_clipped_and_empty() {
        let mut canvas = Canvas::new(4, 4);
        fill_rect(&mut canvas, -2, -2, 4, 4, Rgb::BLUE);
        assert_eq!(canvas.lit_count(), 4);

        let mut canvas = Canvas::new(4, 4);
        fill_rect(&mut canvas, 0, 0, 0, 4, Rgb::BLUE);
        fill_rect(&mut canvas, 0, 0, 4, -1, Rgb::BLUE);
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    fn test_circle_symmetry() {
        let mut canvas = Canvas::new(21, 21);
        circle(&mut canvas, 10, 10, 5, Rgb::WHITE);
        assert!(lit(&canvas, 15, 10));
        assert!(lit(&canvas, 5, 10));
        assert!(lit(&canvas, 10, 15));
        assert!(lit(&canvas, 10, 5));
        assert!(!lit(&canvas, 10, 10));
    }

    #[test]
    fn test_zero_radius_is_a_point() {
        let mut canvas = Canvas::new(4, 4);
        circle(&mut canvas, 1, 1, 0, Rgb::WHITE);
        assert_eq!(canvas.lit_count(), 1);

        let mut canvas = Canvas::new(4, 4);
        fill_circle(&mut canvas, 1, 1, -3, Rgb::WHITE);
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    fn test_fill_circle_covers_center_and_outline() {
        let mut outline = Canvas::new(21, 21);
        let mut filled = Canvas::new(21, 21);
        circle(&mut outline, 10, 10, 6, Rgb::WHITE);
        fill_circle(&mut filled, 10, 10, 6, Rgb::WHITE);

        assert!(lit(&filled, 10, 10));
        for (i, p) in outline.pixels().iter().enumerate() {
            if *p != Rgb::BLACK {
                assert_ne!(filled.pixels()[i], Rgb::BLACK);
            }
        }
    }

    #[test]
    fn test_triangle_vertices() {
        let mut canvas = Canvas::new(10, 10);
        triangle(&mut canvas, [(0, 0), (9, 0), (0, 9)], Rgb::RED);
        assert!(lit(&canvas, 0, 0) && lit(&canvas, 9, 0) && lit(&canvas, 0, 9));
        assert!(!lit(&canvas, 3, 3));
    }

    #[test]
    fn test_fill_polygon_square() {
        let mut canvas = Canvas::new(10, 10);
        fill_polygon(&mut canvas, &[(2, 2), (6, 2), (6, 6), (2, 6)], Rgb::GREEN);
        assert_eq!(canvas.lit_count(), 25);
        assert!(lit(&canvas, 4, 4));
        assert!(!lit(&canvas, 7, 4));
    }

    #[test]
    fn test_fill_polygon_extreme_vertices() {
        let mut canvas = Canvas::new(16, 8);
        let corners = [(-32768, -32768), (32767, 32767), (-32768, 32767)];
        fill_polygon(&mut canvas, &corners, Rgb::RED);
        // The diagonal edge crosses the canvas; everything below-left is inside
        assert!(lit(&canvas, 0, 7));
        assert!(lit(&canvas, 3, 7));
        assert!(!lit(&canvas, 15, 0));
    }

    #[test]
    fn test_fill_polygon_concave() {
        // U shape: the notch between the arms stays empty
        let mut canvas = Canvas::new(12, 12);
        let u = [(0, 0), (3, 0), (3, 6), (7, 6), (7, 0), (10, 0), (10, 10), (0, 10)];
        fill_polygon(&mut canvas, &u, Rgb::WHITE);
        assert!(lit(&canvas, 1, 1));
        assert!(lit(&canvas, 9, 1));
        assert!(!lit(&canvas, 5, 2));
        assert!(lit(&canvas, 5, 8));
    }
}
