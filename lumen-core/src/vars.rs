//! Numeric variable table
//!
//! 256 signed slots written by `SetVar`/`SetVars` and read by instructions
//! that take their coordinates indirectly (polygons). Every slot starts
//! unset; reading an unset slot is an error, not zero.

/// Number of variable slots
pub const VAR_COUNT: usize = 256;

/// Read of a slot that was never written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnsetVariable(pub u8);

#[derive(Debug, Clone)]
pub struct VariableTable {
    slots: [Option<i16>; VAR_COUNT],
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; VAR_COUNT],
        }
    }

    pub fn set(&mut self, index: u8, value: i16) {
        self.slots[index as usize] = Some(value);
    }

    /// Write consecutive slots starting at `start`
    ///
    /// Writes past the last slot wrap around to slot 0.
    pub fn set_many<I: IntoIterator<Item = i16>>(&mut self, start: u8, values: I) {
        let mut index = start;
        for value in values {
            self.set(index, value);
            index = index.wrapping_add(1);
        }
    }

    pub fn get(&self, index: u8) -> Result<i16, UnsetVariable> {
        self.slots[index as usize].ok_or(UnsetVariable(index))
    }

    pub fn is_set(&self, index: u8) -> bool {
        self.slots[index as usize].is_some()
    }

    /// Forget every value
    pub fn clear(&mut self) {
        self.slots = [None; VAR_COUNT];
    }
}
