use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One pixel as pushed to observers.
#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[ts(export, export_to = "frame.ts")]
pub struct PixelState {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
    /// Strip brightness, 0-255.
    pub brightness: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub y: Option<f64>,
}

/// Full pixel state, one list per strip in driver order.
pub type FrameSnapshot = Vec<Vec<PixelState>>;
