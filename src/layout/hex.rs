//! Hexagonal cluster panels sharing one strip.
//!
//! Hexagon cells sit on a doubled grid: even columns use integer rows, odd
//! columns sit half a row lower. Each cell carries a ring of LEDs whose strip
//! indices are listed in ring order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Layout, LayoutKind, LedAddress, LedPlacement, StripSpec, Topology};
use crate::error::{Result, ScalesError};
use crate::models::config::VisualizerConfig;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[ts(export, export_to = "config.ts")]
pub struct Hexagon {
    pub x: f64,
    pub y: f64,
    /// Strip indices in ring order, starting at the reference angle.
    pub ordered_leds: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winding {
    Clockwise,
    Counterclockwise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexConfig {
    pub pin: u8,
    pub channel: u8,
    pub hex_size: f64,
    pub x_scale: f64,
    pub y_scale: f64,
    /// Ring radius as a fraction of `hex_size`.
    pub led_radius_factor: f64,
    /// Bearing of the first LED in degrees, clockwise from +y.
    pub first_led_angle: f64,
    pub winding: Winding,
    pub hexagons: Vec<Hexagon>,
}

impl Default for HexConfig {
    fn default() -> Self {
        let cells = [
            (1.0, 0.5),
            (0.0, 1.0),
            (2.0, 1.0),
            (1.0, 1.5),
            (0.0, 2.0),
            (2.0, 2.0),
            (1.0, 2.5),
        ];
        let hexagons = cells
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Hexagon {
                x,
                y,
                ordered_leds: (i * 6..i * 6 + 6).collect(),
            })
            .collect();

        Self {
            pin: 18,
            channel: 0,
            hex_size: 100.0,
            x_scale: 0.8,
            y_scale: 0.9,
            led_radius_factor: 0.45,
            first_led_angle: 150.0,
            winding: Winding::Counterclockwise,
            hexagons,
        }
    }
}

impl HexConfig {
    pub fn led_count(&self) -> usize {
        self.hexagons.iter().map(|h| h.ordered_leds.len()).sum()
    }

    fn cell_width(&self) -> f64 {
        self.hex_size * self.x_scale
    }

    fn cell_height(&self) -> f64 {
        self.hex_size * self.y_scale
    }

    /// `(min_x, max_x, min_y, max_y)` of a cell's bounding box.
    fn edges(&self, hexagon: &Hexagon) -> (f64, f64, f64, f64) {
        let base_x = hexagon.x * self.cell_width();
        let base_y = hexagon.y * self.cell_height();
        (
            base_x,
            base_x + self.cell_width(),
            base_y,
            base_y + self.cell_height(),
        )
    }

    /// Bearing in degrees of the LED at `position` on a ring of `len` LEDs.
    pub fn angle_at(&self, position: usize, len: usize) -> f64 {
        let step = position as f64 * 360.0 / len as f64;
        let angle = match self.winding {
            Winding::Counterclockwise => self.first_led_angle - step,
            Winding::Clockwise => self.first_led_angle + step,
        };
        angle.rem_euclid(360.0)
    }

    fn offset_at(&self, angle: f64) -> (f64, f64) {
        let radius = self.hex_size * self.led_radius_factor;
        let rad = angle.to_radians();
        ((radius * rad.sin()).round(), (radius * rad.cos()).round())
    }

    fn validate(&self) -> Result<()> {
        if self.hexagons.is_empty() {
            return Err(ScalesError::Configuration(
                "hex layout has no hexagons".into(),
            ));
        }

        for (i, hexagon) in self.hexagons.iter().enumerate() {
            if !hexagon.x.is_finite() || !hexagon.y.is_finite() || hexagon.x.fract() != 0.0 {
                return Err(ScalesError::Configuration(format!(
                    "hexagon {} at ({}, {}) is not on a column",
                    i, hexagon.x, hexagon.y
                )));
            }
            let odd_column = (hexagon.x as i64).rem_euclid(2) == 1;
            let row_fraction = hexagon.y.rem_euclid(1.0);
            let expected = if odd_column { 0.5 } else { 0.0 };
            if row_fraction != expected {
                return Err(ScalesError::Configuration(format!(
                    "hexagon {} at ({}, {}): {} columns need {} rows",
                    i,
                    hexagon.x,
                    hexagon.y,
                    if odd_column { "odd" } else { "even" },
                    if odd_column { "half-integer" } else { "integer" }
                )));
            }
            if hexagon.ordered_leds.is_empty() {
                return Err(ScalesError::Configuration(format!(
                    "hexagon {} has no LEDs",
                    i
                )));
            }
        }

        let total = self.led_count();
        let mut seen = HashSet::with_capacity(total);
        for index in self.hexagons.iter().flat_map(|h| h.ordered_leds.iter()) {
            if !seen.insert(*index) {
                return Err(ScalesError::Configuration(format!(
                    "LED index {} is assigned to more than one position",
                    index
                )));
            }
            if *index >= total {
                return Err(ScalesError::Configuration(format!(
                    "LED indices must cover 0..{} without gaps, found {}",
                    total, index
                )));
            }
        }
        Ok(())
    }
}

impl Topology for HexConfig {
    fn build(&self) -> Result<Layout> {
        self.validate()?;

        let (min_x, max_x, min_y, max_y) = self.hexagons.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |acc, h| {
                let (x0, x1, y0, y1) = self.edges(h);
                (acc.0.min(x0), acc.1.max(x1), acc.2.min(y0), acc.3.max(y1))
            },
        );
        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;

        let mut leds = Vec::with_capacity(self.led_count());
        for (panel, hexagon) in self.hexagons.iter().enumerate() {
            let (x0, x1, y0, y1) = self.edges(hexagon);
            let cell_x = (x0 + x1) / 2.0;
            let cell_y = (y0 + y1) / 2.0;
            let len = hexagon.ordered_leds.len();

            for (position, &index) in hexagon.ordered_leds.iter().enumerate() {
                let angle = self.angle_at(position, len);
                let (dx, dy) = self.offset_at(angle);
                leds.push(LedPlacement {
                    x: cell_x + dx - center_x,
                    y: cell_y + dy - center_y,
                    address: LedAddress { strip: 0, index },
                    panel,
                    ring_position: Some(angle / 360.0),
                });
            }
        }

        Ok(Layout {
            kind: LayoutKind::Hex,
            strips: vec![StripSpec {
                pixel_count: self.led_count(),
                pin: self.pin,
                channel: self.channel,
            }],
            leds,
            panel_count: self.hexagons.len(),
            visualizer: VisualizerConfig::Hex {
                hex_size: self.hex_size,
                max_x,
                max_y,
                hexagons: self.hexagons.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hexagons: Vec<Hexagon>) -> HexConfig {
        HexConfig {
            hexagons,
            ..HexConfig::default()
        }
    }

    fn hexagon(x: f64, y: f64, leds: &[usize]) -> Hexagon {
        Hexagon {
            x,
            y,
            ordered_leds: leds.to_vec(),
        }
    }

    #[test]
    fn parity_rule_accepts_even_integer_and_odd_half_rows() {
        let ok = config(vec![hexagon(0.0, 0.0, &[0, 1]), hexagon(1.0, 0.5, &[2, 3])]);
        assert!(ok.build().is_ok());
    }

    #[test]
    fn odd_column_on_integer_row_is_rejected() {
        let bad = config(vec![hexagon(1.0, 0.0, &[0, 1, 2])]);
        assert!(matches!(bad.build(), Err(ScalesError::Configuration(_))));

        let bad = config(vec![hexagon(2.0, 0.5, &[0])]);
        assert!(matches!(bad.build(), Err(ScalesError::Configuration(_))));

        let bad = config(vec![hexagon(0.5, 0.0, &[0])]);
        assert!(matches!(bad.build(), Err(ScalesError::Configuration(_))));
    }

    #[test]
    fn gaps_in_led_indices_are_rejected() {
        let bad = config(vec![hexagon(0.0, 0.0, &[0, 1]), hexagon(1.0, 0.5, &[2, 4])]);
        assert!(matches!(bad.build(), Err(ScalesError::Configuration(_))));
    }

    #[test]
    fn duplicate_led_indices_are_rejected() {
        let bad = config(vec![hexagon(0.0, 0.0, &[0, 1]), hexagon(1.0, 0.5, &[1, 2])]);
        assert!(matches!(bad.build(), Err(ScalesError::Configuration(_))));
    }

    #[test]
    fn first_led_sits_at_reference_bearing() {
        let layout = config(vec![hexagon(0.0, 0.0, &[0, 1, 2, 3, 4, 5])])
            .build()
            .unwrap();
        // Single cell is centred on the origin.
        let first = &layout.leds[0];
        assert_eq!((first.x, first.y), (23.0, -39.0));
        assert_eq!(first.ring_position, Some(150.0 / 360.0));
        // Counter-clockwise: the second LED is 60 degrees further anticlockwise.
        assert_eq!(layout.leds[1].ring_position, Some(90.0 / 360.0));
        assert_eq!((layout.leds[1].x, layout.leds[1].y), (45.0, 0.0));
    }

    #[test]
    fn ring_order_follows_ordered_leds() {
        let layout = config(vec![hexagon(0.0, 0.0, &[2, 0, 1])]).build().unwrap();
        let addresses: Vec<usize> = layout.leds.iter().map(|l| l.address.index).collect();
        assert_eq!(addresses, vec![2, 0, 1]);
        assert_eq!(layout.strips.len(), 1);
        assert_eq!(layout.strips[0].pixel_count, 3);
    }

    #[test]
    fn default_flower_is_centred() {
        let layout = HexConfig::default().build().unwrap();
        assert_eq!(layout.leds.len(), 42);
        assert_eq!(layout.panel_count, 7);
        let (sx, sy) = layout
            .leds
            .iter()
            .fold((0.0, 0.0), |acc, l| (acc.0 + l.x, acc.1 + l.y));
        assert!(sx.abs() < 1e-9);
        assert!(sy.abs() < 1e-9);
    }
}
