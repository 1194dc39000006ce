//! Addressable pixel strip drivers.
//!
//! Every driver, real or simulated, speaks the same primitive set: write one
//! pixel into the pending frame, commit the frame, read back a pixel, and
//! get/set a global 0-255 brightness. Colors travel as packed `0xWWRRGGBB`
//! words so this crate stays independent of any higher-level color type.

pub mod simulated;
pub mod smart;

pub use simulated::SimulatedStrip;
pub use smart::{SmartLedFactory, SmartLedStrip};

use thiserror::Error;

/// Packed `0xWWRRGGBB` pixel value.
pub type PackedColor = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StripError {
    #[error("pixel driver unavailable: {0}")]
    Unavailable(String),
    #[error("pixel index {index} out of range for strip of {len} pixels")]
    OutOfRange { index: usize, len: usize },
    #[error("pixel driver write failed: {0}")]
    Write(String),
}

/// Primitive operations a pixel driver exposes.
pub trait PixelStrip: Send {
    fn set_pixel_color(&mut self, index: usize, color: PackedColor) -> Result<(), StripError>;

    /// Commit the pending frame to the LEDs.
    fn show(&mut self) -> Result<(), StripError>;

    fn set_brightness(&mut self, brightness: u8);

    fn brightness(&self) -> u8;

    fn num_pixels(&self) -> usize;

    /// Pending (not necessarily shown) color of one pixel.
    fn pixel_color(&self, index: usize) -> Result<PackedColor, StripError>;

    /// True for drivers with no physical LEDs behind them.
    fn is_simulated(&self) -> bool {
        false
    }
}

/// Creates strips for a given pixel count and data pin / channel.
pub trait StripFactory: Send + Sync {
    fn init(&self, pixel_count: usize, pin: u8, channel: u8)
        -> Result<Box<dyn PixelStrip>, StripError>;
}

/// Which driver the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPreference {
    Simulated,
    Hardware,
}

/// Open a strip, falling back to the simulated driver when the hardware one is
/// missing or refuses to initialise. The fallback is never an error.
pub fn open_strip(
    preference: DriverPreference,
    hardware: Option<&dyn StripFactory>,
    pixel_count: usize,
    pin: u8,
    channel: u8,
) -> Box<dyn PixelStrip> {
    if preference == DriverPreference::Hardware {
        match hardware {
            Some(factory) => match factory.init(pixel_count, pin, channel) {
                Ok(strip) => return strip,
                Err(err) => {
                    log::warn!(
                        "[driver] {} (pin {}, channel {}), using simulated strip",
                        err,
                        pin,
                        channel
                    );
                }
            },
            None => {
                log::warn!(
                    "[driver] {}, using simulated strip",
                    StripError::Unavailable("no hardware backend in this build".into())
                );
            }
        }
    }
    Box::new(SimulatedStrip::new(pixel_count))
}

/// Scale one 8-bit channel by an 8-bit brightness, 255 being identity.
pub fn scale_channel(value: u8, brightness: u8) -> u8 {
    ((value as u16 * brightness as u16 + 127) / 255) as u8
}

pub fn unpack(color: PackedColor) -> (u8, u8, u8, u8) {
    (
        (color >> 16) as u8,
        (color >> 8) as u8,
        color as u8,
        (color >> 24) as u8,
    )
}
