//! Pixel storage
//!
//! A [`Canvas`] is one grid of RGB triples. A [`DoubleBuffer`] pairs two of
//! them: drawing goes into the pending canvas while the visible one stays
//! untouched until [`DoubleBuffer::flip`].

use alloc::vec;
use alloc::vec::Vec;

use lumen_protocol::Rgb;

use crate::raster::PixelSink;

/// A fixed-size grid of pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
}

impl Canvas {
    /// Create a black canvas
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::BLACK; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// All pixels, row-major
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// One row of pixels
    pub fn row(&self, y: u16) -> Option<&[Rgb]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.width as usize;
        self.pixels.get(start..start + self.width as usize)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<Rgb> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Write one pixel; returns `false` when outside the canvas
    pub fn set(&mut self, x: u16, y: u16, color: Rgb) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = color;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Number of pixels that are not black
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p != Rgb::BLACK).count()
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

impl PixelSink for Canvas {
    fn size(&self) -> (i32, i32) {
        (self.width as i32, self.height as i32)
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgb) -> bool {
        match (u16::try_from(x), u16::try_from(y)) {
            (Ok(x), Ok(y)) => self.set(x, y, color),
            _ => false,
        }
    }
}

/// Pending and visible canvases of one surface
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    buffers: [Canvas; 2],
    visible: usize,
}

impl DoubleBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            buffers: [Canvas::new(width, height), Canvas::new(width, height)],
            visible: 0,
        }
    }

    /// The canvas last handed to the panel
    pub fn visible(&self) -> &Canvas {
        &self.buffers[self.visible]
    }

    /// The canvas drawing goes into
    pub fn pending(&self) -> &Canvas {
        &self.buffers[self.visible ^ 1]
    }

    pub fn pending_mut(&mut self) -> &mut Canvas {
        &mut self.buffers[self.visible ^ 1]
    }

    /// Swap roles, then seed the new pending canvas with the new visible one
    ///
    /// After a flip both canvases hold the just-presented frame, so drawing
    /// accumulates on top of it.
    pub fn flip(&mut self) -> &Canvas {
        self.visible ^= 1;
        let [a, b] = &mut self.buffers;
        let (visible, pending) = if self.visible == 0 { (a, b) } else { (b, a) };
        pending.pixels.copy_from_slice(&visible.pixels);
        &self.buffers[self.visible]
    }

    /// Black out both canvases
    pub fn reset(&mut self) {
        for canvas in &mut self.buffers {
            canvas.fill(Rgb::BLACK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_bounds() {
        let mut canvas = Canvas::new(4, 2);
        assert!(canvas.set(3, 1, Rgb::RED));
        assert!(!canvas.set(4, 0, Rgb::RED));
        assert!(!canvas.set(0, 2, Rgb::RED));
        assert_eq!(canvas.get(3, 1), Some(Rgb::RED));
        assert_eq!(canvas.get(4, 1), None);
        assert_eq!(canvas.row(1).map(|r| r[3]), Some(Rgb::RED));
        assert!(canvas.row(2).is_none());
    }

    #[test]
    fn test_canvas_plot_rejects_negative() {
        let mut canvas = Canvas::new(4, 4);
        assert!(!canvas.plot(-1, 0, Rgb::WHITE));
        assert!(!canvas.plot(0, 70_000, Rgb::WHITE));
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    fn test_pending_isolated_until_flip() {
        let mut buffer = DoubleBuffer::new(2, 2);
        buffer.pending_mut().set(0, 0, Rgb::GREEN);

        assert_eq!(buffer.visible().get(0, 0), Some(Rgb::BLACK));

        let shown = buffer.flip();
        assert_eq!(shown.get(0, 0), Some(Rgb::GREEN));
        assert_eq!(buffer.visible().get(0, 0), Some(Rgb::GREEN));
    }

    #[test]
    fn test_flip_seeds_new_pending() {
        let mut buffer = DoubleBuffer::new(2, 2);
        buffer.pending_mut().set(1, 1, Rgb::BLUE);
        buffer.flip();

        // Accumulate on top of the presented frame
        assert_eq!(buffer.pending().get(1, 1), Some(Rgb::BLUE));
        buffer.pending_mut().set(0, 1, Rgb::RED);
        assert_eq!(buffer.visible().get(0, 1), Some(Rgb::BLACK));

        buffer.flip();
        assert_eq!(buffer.visible().get(1, 1), Some(Rgb::BLUE));
        assert_eq!(buffer.visible().get(0, 1), Some(Rgb::RED));
    }

    #[test]
    fn test_reset_clears_both() {
        let mut buffer = DoubleBuffer::new(2, 2);
        buffer.pending_mut().fill(Rgb::WHITE);
        buffer.flip();
        buffer.reset();
        assert_eq!(buffer.visible().lit_count(), 0);
        assert_eq!(buffer.pending().lit_count(), 0);
    }
}
