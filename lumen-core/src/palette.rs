//! Colour palette for indexed sprites

use lumen_protocol::Rgb;

/// Number of palette entries
pub const PALETTE_SIZE: usize = 16;

/// Palette index beyond [`PALETTE_SIZE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BadPaletteIndex(pub u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [Rgb; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// Boot palette: black, white, then primaries and their mixes
    pub const fn new() -> Self {
        let mut entries = [Rgb::BLACK; PALETTE_SIZE];
        entries[1] = Rgb::WHITE;
        entries[2] = Rgb::RED;
        entries[3] = Rgb::GREEN;
        entries[4] = Rgb::BLUE;
        entries[5] = Rgb::new(255, 255, 0);
        entries[6] = Rgb::new(0, 255, 255);
        entries[7] = Rgb::new(255, 0, 255);
        Self { entries }
    }

    pub fn set(&mut self, index: u8, color: Rgb) -> Result<(), BadPaletteIndex> {
        let entry = self
            .entries
            .get_mut(index as usize)
            .ok_or(BadPaletteIndex(index))?;
        *entry = color;
        Ok(())
    }

    /// Colour for an index; out-of-range indices wrap
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[index as usize % PALETTE_SIZE]
    }
}
