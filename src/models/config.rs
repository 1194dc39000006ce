use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::layout::Hexagon;

/// Static description of the physical layout for a remote visualizer.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "config.ts")]
pub enum VisualizerConfig {
    Scale {
        x_count: usize,
        y_count: usize,
        panel_count: usize,
        spacing: f64,
        panel_spacing_scales: f64,
        total_width: f64,
        total_height: f64,
        scale_length: f64,
        scale_width: f64,
    },
    Hex {
        hex_size: f64,
        max_x: f64,
        max_y: f64,
        hexagons: Vec<Hexagon>,
    },
}
