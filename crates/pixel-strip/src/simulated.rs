use crate::{PackedColor, PixelStrip, StripError};

/// In-memory strip. Writes land in a pending buffer; `show` copies it into
/// the committed frame.
#[derive(Debug, Clone)]
pub struct SimulatedStrip {
    pending: Vec<PackedColor>,
    committed: Vec<PackedColor>,
    brightness: u8,
    shows: u64,
}

impl SimulatedStrip {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            pending: vec![0; pixel_count],
            committed: vec![0; pixel_count],
            brightness: 255,
            shows: 0,
        }
    }

    /// Last frame committed by `show`.
    pub fn committed(&self) -> &[PackedColor] {
        &self.committed
    }

    pub fn shows(&self) -> u64 {
        self.shows
    }

    fn check(&self, index: usize) -> Result<(), StripError> {
        if index >= self.pending.len() {
            return Err(StripError::OutOfRange {
                index,
                len: self.pending.len(),
            });
        }
        Ok(())
    }
}

impl PixelStrip for SimulatedStrip {
    fn set_pixel_color(&mut self, index: usize, color: PackedColor) -> Result<(), StripError> {
        self.check(index)?;
        self.pending[index] = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), StripError> {
        self.committed.copy_from_slice(&self.pending);
        self.shows += 1;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn num_pixels(&self) -> usize {
        self.pending.len()
    }

    fn pixel_color(&self, index: usize) -> Result<PackedColor, StripError> {
        self.check(index)?;
        Ok(self.pending[index])
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
