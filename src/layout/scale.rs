//! Rectangular "scale" panels wired in a zig-zag.

use serde::{Deserialize, Serialize};

use super::{Layout, LayoutKind, LedAddress, LedPlacement, StripSpec, Topology};
use crate::error::{Result, ScalesError};
use crate::models::config::VisualizerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub x_count: usize,
    pub y_count: usize,
    pub panel_count: usize,
    /// Distance between neighbouring scales, in millimetres.
    pub spacing: f64,
    /// Gap between panels, in scale columns.
    pub panel_spacing_scales: f64,
    pub base_length: f64,
    pub base_width: f64,
    /// `(pin, channel)` per panel, in panel order.
    pub pins: Vec<(u8, u8)>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            x_count: 6,
            y_count: 12,
            panel_count: 3,
            spacing: 55.0,
            panel_spacing_scales: 1.0,
            base_length: 25.0,
            base_width: 2.0,
            pins: vec![(18, 0), (13, 1), (21, 0)],
        }
    }
}

impl ScaleConfig {
    pub fn leds_per_panel(&self) -> usize {
        (2 * self.x_count).saturating_sub(1) * self.y_count
    }

    pub fn panel_width(&self) -> f64 {
        self.x_count as f64 * self.spacing
    }

    pub fn panel_height(&self) -> f64 {
        (self.y_count as f64 + 0.5) * self.spacing
    }

    pub fn total_width(&self) -> f64 {
        self.panel_width() * self.panel_count as f64
            + self.spacing * self.panel_count.saturating_sub(1) as f64
    }

    pub fn total_height(&self) -> f64 {
        self.panel_height()
    }

    /// Signed offset of a panel from the centre panel. Panel 0 is the centre,
    /// odd panels step out to the left, even panels to the right.
    pub fn distance_from_center(panel: usize) -> i64 {
        if panel == 0 {
            0
        } else if panel % 2 == 1 {
            -(((panel + 1) / 2) as i64)
        } else {
            (panel / 2) as i64
        }
    }

    fn base_x(&self, panel: usize) -> f64 {
        // Left panels mirror right panels around panel 0.
        let dfc = Self::distance_from_center(panel) as f64;
        (dfc - 0.5) * self.x_count as f64 + self.panel_spacing_scales * dfc + 0.5
    }

    fn validate(&self) -> Result<()> {
        if self.x_count == 0 || self.y_count == 0 || self.panel_count == 0 {
            return Err(ScalesError::Configuration(format!(
                "scale layout needs at least one panel, column and row (got {}x{} on {} panels)",
                self.x_count, self.y_count, self.panel_count
            )));
        }
        if self.pins.len() < self.panel_count {
            return Err(ScalesError::Configuration(format!(
                "{} panels configured but only {} pin assignments",
                self.panel_count,
                self.pins.len()
            )));
        }
        Ok(())
    }
}

impl Topology for ScaleConfig {
    fn build(&self) -> Result<Layout> {
        self.validate()?;

        let per_panel = self.leds_per_panel();
        let center_y = self.y_count as f64 / 2.0;
        let y_count = self.y_count as f64;
        let mut leds = Vec::with_capacity(per_panel * self.panel_count);
        let mut strips = Vec::with_capacity(self.panel_count);

        for panel in 0..self.panel_count {
            let (pin, channel) = self.pins[panel];
            strips.push(StripSpec {
                pixel_count: per_panel,
                pin,
                channel,
            });

            let base_x = self.base_x(panel);
            let mut index = 0;
            let mut push = |x: f64, y: f64, index: &mut usize| {
                leds.push(LedPlacement {
                    x,
                    y,
                    address: LedAddress {
                        strip: panel,
                        index: *index,
                    },
                    panel,
                    ring_position: None,
                });
                *index += 1;
            };

            for col in 0..self.x_count {
                let x = base_x + col as f64;
                for row in 0..self.y_count {
                    push(x, center_y - row as f64 - 1.0, &mut index);
                }
                if col != self.x_count - 1 {
                    for row in 0..self.y_count {
                        push(
                            x + 0.5,
                            center_y - (y_count - (row as f64 + 0.5)),
                            &mut index,
                        );
                    }
                }
            }
        }

        Ok(Layout {
            kind: LayoutKind::Scale,
            strips,
            leds,
            panel_count: self.panel_count,
            visualizer: VisualizerConfig::Scale {
                x_count: self.x_count,
                y_count: self.y_count,
                panel_count: self.panel_count,
                spacing: self.spacing,
                panel_spacing_scales: self.panel_spacing_scales,
                total_width: self.total_width(),
                total_height: self.total_height(),
                scale_length: self.base_length,
                scale_width: self.base_width,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(panels: usize) -> ScaleConfig {
        ScaleConfig {
            x_count: 2,
            y_count: 2,
            panel_count: panels,
            ..ScaleConfig::default()
        }
    }

    #[test]
    fn single_small_panel_has_two_interleaved_columns() {
        let layout = small(1).build().unwrap();
        assert_eq!(layout.leds.len(), 6);
        assert_eq!(layout.strips[0].pixel_count, 6);

        let coords: Vec<(f64, f64)> = layout.leds.iter().map(|l| (l.x, l.y)).collect();
        assert_eq!(
            coords,
            vec![
                (-0.5, 0.0),
                (-0.5, -1.0),
                (0.0, -0.5),
                (0.0, 0.5),
                (0.5, 0.0),
                (0.5, -1.0),
            ]
        );
        let indices: Vec<usize> = layout.leds.iter().map(|l| l.address.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn panels_alternate_left_and_right_of_centre() {
        assert_eq!(ScaleConfig::distance_from_center(0), 0);
        assert_eq!(ScaleConfig::distance_from_center(1), -1);
        assert_eq!(ScaleConfig::distance_from_center(2), 1);
        assert_eq!(ScaleConfig::distance_from_center(3), -2);

        let layout = small(3).build().unwrap();
        let min_x = |panel: usize| {
            layout
                .leds
                .iter()
                .filter(|l| l.panel == panel)
                .map(|l| l.x)
                .fold(f64::INFINITY, f64::min)
        };
        assert!(min_x(1) < min_x(0));
        assert!(min_x(2) > min_x(0));
        // one column of gap between neighbouring panels
        assert_eq!(min_x(0) - min_x(1), 3.0);
    }

    #[test]
    fn default_layout_counts() {
        let config = ScaleConfig::default();
        assert_eq!(config.leds_per_panel(), 132);
        assert_eq!(config.build().unwrap().leds.len(), 396);
        assert_eq!(config.total_width(), 6.0 * 55.0 * 3.0 + 110.0);
    }

    #[test]
    fn missing_pins_is_a_configuration_error() {
        let config = ScaleConfig {
            pins: vec![(18, 0)],
            ..ScaleConfig::default()
        };
        assert!(matches!(
            config.build(),
            Err(ScalesError::Configuration(_))
        ));
    }
}
