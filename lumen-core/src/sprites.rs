//! Sprite store and blitter
//!
//! Sprites are uploaded once and drawn many times by id. Pixels that decode
//! to black are transparent, so sprites can be stamped over a background.

use alloc::vec::Vec;

use lumen_protocol::{Rgb, SpriteFormat};

use crate::palette::Palette;
use crate::raster::PixelSink;

/// Number of sprite slots
pub const MAX_SPRITES: usize = 16;

/// Largest sprite data block in bytes
pub const MAX_SPRITE_BYTES: usize = 1024;

/// Sprite storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpriteError {
    /// Slot id beyond [`MAX_SPRITES`]
    BadSlot(u8),
    /// Data larger than [`MAX_SPRITE_BYTES`]
    TooLarge,
    /// Data length does not match width, height and format
    SizeMismatch,
    /// Nothing uploaded in this slot
    Missing(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    width: u8,
    height: u8,
    format: SpriteFormat,
    data: Vec<u8>,
}

impl Sprite {
    pub fn new(width: u8, height: u8, format: SpriteFormat, data: &[u8]) -> Result<Self, SpriteError> {
        if data.len() > MAX_SPRITE_BYTES {
            return Err(SpriteError::TooLarge);
        }
        if data.len() != format.data_len(width, height) {
            return Err(SpriteError::SizeMismatch);
        }
        Ok(Self {
            width,
            height,
            format,
            data: data.to_vec(),
        })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// Colour of one sprite pixel
    pub fn pixel(&self, x: u8, y: u8, palette: &Palette) -> Rgb {
        let (x, y, w) = (x as usize, y as usize, self.width as usize);
        match self.format {
            SpriteFormat::Rgb888 => {
                let i = (y * w + x) * 3;
                Rgb::new(self.data[i], self.data[i + 1], self.data[i + 2])
            }
            SpriteFormat::Mono1 => {
                let stride = w.div_ceil(8);
                let byte = self.data[y * stride + x / 8];
                if byte & (0x80 >> (x % 8)) != 0 {
                    Rgb::WHITE
                } else {
                    Rgb::BLACK
                }
            }
            SpriteFormat::Indexed8 => palette.get(self.data[y * w + x]),
        }
    }

    /// Draw with the top-left corner at `(x, y)`
    pub fn blit<S: PixelSink + ?Sized>(&self, sink: &mut S, palette: &Palette, x: i32, y: i32) {
        for sy in 0..self.height {
            for sx in 0..self.width {
                let color = self.pixel(sx, sy, palette);
                if color != Rgb::BLACK {
                    sink.plot(x + sx as i32, y + sy as i32, color);
                }
            }
        }
    }
}

/// Fixed set of sprite slots
#[derive(Debug, Clone, Default)]
pub struct SpriteStore {
    slots: [Option<Sprite>; MAX_SPRITES],
}

impl SpriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sprite, replacing whatever the slot held
    pub fn upload(&mut self, id: u8, sprite: Sprite) -> Result<(), SpriteError> {
        *self.slot_mut(id)? = Some(sprite);
        Ok(())
    }

    pub fn delete(&mut self, id: u8) -> Result<(), SpriteError> {
        self.slot_mut(id)?.take().map(|_| ()).ok_or(SpriteError::Missing(id))
    }

    pub fn get(&self, id: u8) -> Result<&Sprite, SpriteError> {
        self.slots
            .get(id as usize)
            .ok_or(SpriteError::BadSlot(id))?
            .as_ref()
            .ok_or(SpriteError::Missing(id))
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    fn slot_mut(&mut self, id: u8) -> Result<&mut Option<Sprite>, SpriteError> {
        self.slots.get_mut(id as usize).ok_or(SpriteError::BadSlot(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::Canvas;

    #[test]
    fn test_size_checks() {
        assert_eq!(
            Sprite::new(2, 2, SpriteFormat::Rgb888, &[0; 11]),
            Err(SpriteError::SizeMismatch)
        );
        assert_eq!(
            Sprite::new(32, 32, SpriteFormat::Indexed8, &[0; 1024]).map(|s| s.width()),
            Ok(32)
        );
        assert_eq!(
            Sprite::new(20, 20, SpriteFormat::Rgb888, &[0; 1200]),
            Err(SpriteError::TooLarge)
        );
    }

    #[test]
    fn test_store_slots() {
        let mut store = SpriteStore::new();
        let sprite = Sprite::new(1, 1, SpriteFormat::Indexed8, &[1]).unwrap();

        assert_eq!(store.upload(16, sprite.clone()), Err(SpriteError::BadSlot(16)));
        store.upload(3, sprite).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(3).is_ok());
        assert_eq!(store.get(4).err(), Some(SpriteError::Missing(4)));

        store.delete(3).unwrap();
        assert_eq!(store.delete(3), Err(SpriteError::Missing(3)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_mono_blit_msb_first_with_transparency() {
        // 10 pixels wide: two bytes per row, second byte only uses its top bits
        let sprite = Sprite::new(10, 1, SpriteFormat::Mono1, &[0b1000_0001, 0b0100_0000]).unwrap();
        let mut canvas = Canvas::new(16, 2);
        canvas.fill(Rgb::BLUE);
        sprite.blit(&mut canvas, &Palette::new(), 2, 1);

        assert_eq!(canvas.get(2, 1), Some(Rgb::WHITE));
        assert_eq!(canvas.get(9, 1), Some(Rgb::WHITE));
        assert_eq!(canvas.get(11, 1), Some(Rgb::WHITE));
        // Clear bits leave the background alone
        assert_eq!(canvas.get(3, 1), Some(Rgb::BLUE));
        assert_eq!(canvas.get(10, 1), Some(Rgb::BLUE));
    }

    #[test]
    fn test_indexed_blit_uses_palette() {
        let mut palette = Palette::new();
        palette.set(9, Rgb::new(7, 8, 9)).unwrap();
        let sprite = Sprite::new(2, 1, SpriteFormat::Indexed8, &[9, 0]).unwrap();

        let mut canvas = Canvas::new(4, 4);
        sprite.blit(&mut canvas, &palette, -1, 0);
        assert_eq!(canvas.get(0, 0), Some(Rgb::BLACK));

        sprite.blit(&mut canvas, &palette, 3, 3);
        assert_eq!(canvas.get(3, 3), Some(Rgb::new(7, 8, 9)));
    }

    #[test]
    fn test_rgb_pixel() {
        let sprite = Sprite::new(2, 1, SpriteFormat::Rgb888, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(sprite.pixel(1, 0, &Palette::new()), Rgb::new(4, 5, 6));
    }
}
