//! Virtual matrix layout
//!
//! Matrix segments sit side by side, left to right, and share one height.
//! A virtual x belongs to exactly one segment; mapping is pure.

use heapless::Vec;

use crate::config::{RendererConfig, MAX_SEGMENTS};

/// Virtual coordinate outside every segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfBounds;

/// A virtual coordinate resolved to a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SegmentPoint {
    pub segment: u8,
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: u16,
    width: u16,
}

/// Horizontal arrangement of the matrix segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    spans: Vec<Span, MAX_SEGMENTS>,
    height: u16,
}

impl SegmentLayout {
    /// Lay out segments of the given widths left to right
    ///
    /// Widths beyond [`MAX_SEGMENTS`] are ignored; configurations are
    /// validated before they get here.
    pub fn new(widths: &[u16], height: u16) -> Self {
        let mut spans = Vec::new();
        let mut start = 0u16;
        for &width in widths.iter().take(MAX_SEGMENTS) {
            let _ = spans.push(Span { start, width });
            start = start.saturating_add(width);
        }
        Self { spans, height }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(&config.segment_widths, config.segment_height)
    }

    pub fn segment_count(&self) -> usize {
        self.spans.len()
    }

    /// Width of one segment
    pub fn segment_width(&self, segment: u8) -> Option<u16> {
        self.spans.get(segment as usize).map(|s| s.width)
    }

    /// Width of the whole virtual matrix
    pub fn width(&self) -> u16 {
        self.spans.last().map(|s| s.start + s.width).unwrap_or(0)
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Resolve a virtual coordinate to a segment and its local coordinate
    pub fn map_virtual(&self, x: i16, y: i16) -> Result<SegmentPoint, OutOfBounds> {
        self.locate(x as i32, y as i32)
    }

    /// Same as [`Self::map_virtual`] over a wider coordinate range
    pub(crate) fn locate(&self, x: i32, y: i32) -> Result<SegmentPoint, OutOfBounds> {
        if y < 0 || y >= self.height as i32 || x < 0 {
            return Err(OutOfBounds);
        }
        self.spans
            .iter()
            .enumerate()
            .find(|(_, s)| x >= s.start as i32 && x < s.start as i32 + s.width as i32)
            .map(|(i, s)| SegmentPoint {
                segment: i as u8,
                x: (x - s.start as i32) as u16,
                y: y as u16,
            })
            .ok_or(OutOfBounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_segment_mapping() {
        let layout = SegmentLayout::new(&[64, 64], 32);
        assert_eq!(layout.width(), 128);

        assert_eq!(
            layout.map_virtual(70, 5),
            Ok(SegmentPoint {
                segment: 1,
                x: 6,
                y: 5
            })
        );
        assert_eq!(
            layout.map_virtual(63, 31),
            Ok(SegmentPoint {
                segment: 0,
                x: 63,
                y: 31
            })
        );
        assert_eq!(layout.map_virtual(64, 0).map(|p| (p.segment, p.x)), Ok((1, 0)));
    }

    #[test]
    fn test_out_of_bounds() {
        let layout = SegmentLayout::new(&[64, 64], 32);
        assert_eq!(layout.map_virtual(128, 0), Err(OutOfBounds));
        assert_eq!(layout.map_virtual(-1, 0), Err(OutOfBounds));
        assert_eq!(layout.map_virtual(0, 32), Err(OutOfBounds));
        assert_eq!(layout.map_virtual(0, -1), Err(OutOfBounds));
    }

    #[test]
    fn test_uneven_segments() {
        let layout = SegmentLayout::new(&[10, 30, 5], 8);
        assert_eq!(layout.width(), 45);
        assert_eq!(layout.map_virtual(39, 0).map(|p| (p.segment, p.x)), Ok((1, 29)));
        assert_eq!(layout.map_virtual(40, 7).map(|p| (p.segment, p.x)), Ok((2, 0)));
        assert_eq!(layout.segment_width(2), Some(5));
        assert_eq!(layout.segment_width(3), None);
    }
}
