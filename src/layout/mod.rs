//! Panel topologies.
//!
//! A topology turns a panel description into the static list of LED
//! placements the controller caches at construction: where each LED sits in
//! the shared 2-D plane and which strip/pixel drives it.

pub mod hex;
pub mod scale;

pub use hex::{HexConfig, Hexagon, Winding};
pub use scale::ScaleConfig;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::config::VisualizerConfig;

/// One physical strip the layout needs the driver to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripSpec {
    pub pixel_count: usize,
    pub pin: u8,
    pub channel: u8,
}

/// Driver address of one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedAddress {
    pub strip: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedPlacement {
    pub x: f64,
    pub y: f64,
    pub address: LedAddress,
    /// Panel (scale panel or hexagon) the LED belongs to.
    pub panel: usize,
    /// Position of the LED along its ring, as a fraction of a turn. Hex only.
    pub ring_position: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Scale,
    Hex,
}

/// Fully resolved layout, ready for the controller.
#[derive(Debug, Clone)]
pub struct Layout {
    pub kind: LayoutKind,
    pub strips: Vec<StripSpec>,
    /// Placements in visiting order.
    pub leds: Vec<LedPlacement>,
    pub panel_count: usize,
    pub visualizer: VisualizerConfig,
}

pub trait Topology {
    /// Resolve and validate the layout. Any inconsistency is a
    /// `ScalesError::Configuration`.
    fn build(&self) -> Result<Layout>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutConfig {
    Scale(ScaleConfig),
    Hex(HexConfig),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::Scale(ScaleConfig::default())
    }
}

impl Topology for LayoutConfig {
    fn build(&self) -> Result<Layout> {
        match self {
            LayoutConfig::Scale(config) => config.build(),
            LayoutConfig::Hex(config) => config.build(),
        }
    }
}
