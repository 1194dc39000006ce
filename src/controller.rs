//! Owns the pixel strips and the cached LED geometry, and exposes the mapping
//! primitives effects draw through.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::ops::Range;

use pixel_strip::{open_strip, DriverPreference, PixelStrip, StripFactory};

use crate::color::Color;
use crate::error::{Result, ScalesError};
use crate::layout::{Layout, LayoutConfig, LayoutKind, LedAddress, Topology};
use crate::models::config::VisualizerConfig;
use crate::models::frame::{FrameSnapshot, PixelState};

/// Cached per-LED geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct LedInfo {
    pub x: f64,
    pub y: f64,
    pub distance: f64,
    /// Radians, in [0, 2π).
    pub angle: f64,
    pub address: LedAddress,
    pub panel: usize,
    pub ring_position: Option<f64>,
    /// Pixel count of the strip this LED lives on.
    pub strip_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

pub fn distance(x: f64, y: f64) -> f64 {
    x.hypot(y)
}

/// `atan2(y, x)` folded into [0, 2π). The origin maps to 0.
pub fn angle(x: f64, y: f64) -> f64 {
    let a = y.atan2(x);
    let a = if a < 0.0 { a + TAU } else { a };
    if a >= TAU {
        0.0
    } else {
        a
    }
}

fn normalize(value: f64, min: f64, max: f64, force_positive: bool) -> f64 {
    if force_positive {
        let span = max - min;
        if span.abs() <= f64::EPSILON {
            0.0
        } else {
            (value - min) / span
        }
    } else {
        let extent = min.abs().max(max.abs());
        if extent <= f64::EPSILON {
            0.0
        } else {
            value / extent
        }
    }
}

pub struct Controller {
    strips: Vec<Box<dyn PixelStrip>>,
    leds: Vec<LedInfo>,
    panels: Vec<Range<usize>>,
    lookup: HashMap<LedAddress, usize>,
    bounds: Bounds,
    max_distance: f64,
    kind: LayoutKind,
    visualizer: VisualizerConfig,
    debug_positions: bool,
}

impl Controller {
    /// Build the layout and open one strip per layout strip. The hardware
    /// driver falls back to the simulated one when it cannot be opened.
    pub fn new(
        layout: &LayoutConfig,
        preference: DriverPreference,
        hardware: Option<&dyn StripFactory>,
        debug_positions: bool,
    ) -> Result<Self> {
        let layout = layout.build()?;
        let strips = layout
            .strips
            .iter()
            .map(|spec| open_strip(preference, hardware, spec.pixel_count, spec.pin, spec.channel))
            .collect();
        Self::from_parts(layout, strips, debug_positions)
    }

    /// Simulated controller for a layout.
    pub fn simulated(layout: &LayoutConfig) -> Result<Self> {
        Self::new(layout, DriverPreference::Simulated, None, false)
    }

    pub fn from_parts(
        layout: Layout,
        strips: Vec<Box<dyn PixelStrip>>,
        debug_positions: bool,
    ) -> Result<Self> {
        if strips.len() != layout.strips.len() {
            return Err(ScalesError::Configuration(format!(
                "layout needs {} strips, got {}",
                layout.strips.len(),
                strips.len()
            )));
        }
        for (i, (spec, strip)) in layout.strips.iter().zip(&strips).enumerate() {
            if strip.num_pixels() < spec.pixel_count {
                return Err(ScalesError::Configuration(format!(
                    "strip {} has {} pixels, layout needs {}",
                    i,
                    strip.num_pixels(),
                    spec.pixel_count
                )));
            }
        }

        let mut leds = Vec::with_capacity(layout.leds.len());
        let mut panels: Vec<Range<usize>> = Vec::with_capacity(layout.panel_count);
        let mut lookup = HashMap::with_capacity(layout.leds.len());

        for (i, placement) in layout.leds.iter().enumerate() {
            // Placements arrive grouped by panel.
            if placement.panel < panels.len() {
                panels[placement.panel].end = i + 1;
            } else {
                panels.push(i..i + 1);
            }
            lookup.insert(placement.address, i);
            leds.push(LedInfo {
                x: placement.x,
                y: placement.y,
                distance: distance(placement.x, placement.y),
                angle: angle(placement.x, placement.y),
                address: placement.address,
                panel: placement.panel,
                ring_position: placement.ring_position,
                strip_len: layout.strips[placement.address.strip].pixel_count,
            });
        }

        let bounds = leds.iter().fold(
            Bounds {
                min_x: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                min_y: f64::INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |b, led| Bounds {
                min_x: b.min_x.min(led.x),
                max_x: b.max_x.max(led.x),
                min_y: b.min_y.min(led.y),
                max_y: b.max_y.max(led.y),
            },
        );
        let max_distance = leds.iter().map(|l| l.distance).fold(0.0, f64::max);

        Ok(Self {
            strips,
            leds,
            panels,
            lookup,
            bounds,
            max_distance,
            kind: layout.kind,
            visualizer: layout.visualizer,
            debug_positions,
        })
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn leds(&self) -> &[LedInfo] {
        &self.leds
    }

    pub fn led_count(&self) -> usize {
        self.leds.len()
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn coordinate_bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// True when every strip is the simulated driver, whether requested or
    /// fallen back to.
    pub fn is_simulated(&self) -> bool {
        !self.strips.is_empty() && self.strips.iter().all(|s| s.is_simulated())
    }

    fn strip(&self, address: LedAddress) -> Result<&dyn PixelStrip> {
        self.strips
            .get(address.strip)
            .map(|s| s.as_ref())
            .ok_or_else(|| no_such_strip(address.strip, self.strips.len()))
    }

    fn write(&mut self, address: LedAddress, color: Color) -> Result<()> {
        let count = self.strips.len();
        let strip = self
            .strips
            .get_mut(address.strip)
            .ok_or_else(|| no_such_strip(address.strip, count))?;
        strip.set_pixel_color(address.index, color.packed())?;
        Ok(())
    }

    /// Visit every LED in cached order and write whatever color `visit`
    /// returns. `None` leaves the LED untouched.
    pub fn map_leds<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&LedInfo) -> Option<Color>,
    {
        for i in 0..self.leds.len() {
            if let Some(color) = visit(&self.leds[i]) {
                let address = self.leds[i].address;
                self.write(address, color)?;
            }
        }
        Ok(())
    }

    pub fn map_coordinates<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(f64, f64, LedAddress) -> Option<Color>,
    {
        self.map_leds(|led| visit(led.x, led.y, led.address))
    }

    pub fn map_distance<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(f64, LedAddress) -> Option<Color>,
    {
        self.map_leds(|led| visit(led.distance, led.address))
    }

    pub fn map_angle<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(f64, LedAddress) -> Option<Color>,
    {
        self.map_leds(|led| visit(led.angle, led.address))
    }

    /// Distance normalised by the farthest LED, in [0, 1].
    pub fn map_scaled_distance<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(f64, LedAddress) -> Option<Color>,
    {
        let max = self.max_distance;
        self.map_leds(|led| {
            let scaled = if max > 0.0 { led.distance / max } else { 0.0 };
            visit(scaled, led.address)
        })
    }

    /// Coordinates normalised by the layout bounds. With `force_positive`
    /// each axis is re-based to [0, 1]; otherwise it is divided by its
    /// largest absolute extent, giving [-1, 1].
    pub fn map_scaled_coordinates<F>(&mut self, force_positive: bool, mut visit: F) -> Result<()>
    where
        F: FnMut(f64, f64, LedAddress) -> Option<Color>,
    {
        let b = self.bounds;
        self.map_leds(|led| {
            let x = normalize(led.x, b.min_x, b.max_x, force_positive);
            let y = normalize(led.y, b.min_y, b.max_y, force_positive);
            visit(x, y, led.address)
        })
    }

    /// Flood every LED.
    pub fn set_color(&mut self, color: Color) -> Result<()> {
        self.map_leds(|_| Some(color))
    }

    pub fn set_panel_color(&mut self, panel: usize, color: Color) -> Result<()> {
        let Some(range) = self.panels.get(panel).cloned() else {
            return Ok(());
        };
        for i in range {
            let address = self.leds[i].address;
            self.write(address, color)?;
        }
        Ok(())
    }

    pub fn set_pixel_color(&mut self, address: LedAddress, color: Color) -> Result<()> {
        self.write(address, color)
    }

    pub fn pixel_color(&self, address: LedAddress) -> Result<Color> {
        Ok(Color::from_packed(self.strip(address)?.pixel_color(address.index)?))
    }

    /// Global brightness in [0, 1], applied to every strip.
    pub fn set_brightness(&mut self, brightness: f64) {
        let level = if brightness.is_nan() {
            0
        } else {
            (brightness.clamp(0.0, 1.0) * 255.0).round() as u8
        };
        for strip in &mut self.strips {
            strip.set_brightness(level);
        }
    }

    pub fn brightness(&self) -> u8 {
        self.strips.first().map(|s| s.brightness()).unwrap_or(0)
    }

    pub fn show(&mut self) -> Result<()> {
        for strip in &mut self.strips {
            strip.show()?;
        }
        Ok(())
    }

    /// Reverse lookup from a driver address to its coordinate.
    pub fn get_coordinates(&self, strip: usize, index: usize) -> Option<(f64, f64)> {
        self.lookup
            .get(&LedAddress { strip, index })
            .map(|&i| (self.leds[i].x, self.leds[i].y))
    }

    /// Current pending pixel state of every strip.
    pub fn json(&self) -> FrameSnapshot {
        self.strips
            .iter()
            .enumerate()
            .map(|(s, strip)| {
                let brightness = strip.brightness();
                (0..strip.num_pixels())
                    .map(|i| {
                        let color = strip
                            .pixel_color(i)
                            .map(Color::from_packed)
                            .unwrap_or_default();
                        let position = if self.debug_positions {
                            self.get_coordinates(s, i)
                        } else {
                            None
                        };
                        PixelState {
                            r: color.r,
                            g: color.g,
                            b: color.b,
                            w: color.w,
                            brightness,
                            x: position.map(|p| p.0),
                            y: position.map(|p| p.1),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    pub fn visualizer_config(&self) -> &VisualizerConfig {
        &self.visualizer
    }
}

fn no_such_strip(strip: usize, count: usize) -> ScalesError {
    ScalesError::Configuration(format!("strip {} does not exist ({} strips)", strip, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{HexConfig, ScaleConfig};

    fn small_scale() -> Controller {
        Controller::simulated(&LayoutConfig::Scale(ScaleConfig {
            x_count: 2,
            y_count: 2,
            panel_count: 1,
            ..ScaleConfig::default()
        }))
        .unwrap()
    }

    #[test]
    fn angle_is_normalised_and_origin_safe() {
        assert_eq!(angle(0.0, 0.0), 0.0);
        assert!((angle(0.0, -1.0) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(angle(1.0, -0.0), 0.0);
        assert_eq!(distance(3.0, 4.0), 5.0);
    }

    #[test]
    fn scaled_distance_spans_unit_interval() {
        for layout in [
            LayoutConfig::Scale(ScaleConfig::default()),
            LayoutConfig::Hex(HexConfig::default()),
        ] {
            let mut controller = Controller::simulated(&layout).unwrap();
            let mut seen = Vec::new();
            controller
                .map_scaled_distance(|d, _| {
                    seen.push(d);
                    None
                })
                .unwrap();
            assert_eq!(seen.len(), controller.led_count());
            assert!(seen.iter().all(|d| (0.0..=1.0).contains(d)));
            assert!(seen.iter().any(|d| *d == 1.0));
        }
    }

    #[test]
    fn scaled_coordinates_respect_force_positive() {
        let mut controller = small_scale();
        let mut positive = Vec::new();
        controller
            .map_scaled_coordinates(true, |x, y, _| {
                positive.push((x, y));
                None
            })
            .unwrap();
        assert!(positive
            .iter()
            .all(|(x, y)| (0.0..=1.0).contains(x) && (0.0..=1.0).contains(y)));
        assert!(positive.iter().any(|(x, _)| *x == 0.0));
        assert!(positive.iter().any(|(x, _)| *x == 1.0));

        let mut signed = Vec::new();
        controller
            .map_scaled_coordinates(false, |x, y, _| {
                signed.push((x, y));
                None
            })
            .unwrap();
        assert!(signed.iter().any(|(x, _)| *x < 0.0));
        assert!(signed
            .iter()
            .all(|(x, y)| (-1.0..=1.0).contains(x) && (-1.0..=1.0).contains(y)));
    }

    #[test]
    fn none_leaves_pixels_untouched() {
        let mut controller = small_scale();
        controller.set_color(Color::rgb(1, 2, 3)).unwrap();
        controller
            .map_coordinates(|x, _, _| (x > 0.0).then_some(Color::rgb(9, 9, 9)))
            .unwrap();
        let first = LedAddress { strip: 0, index: 0 };
        let last = LedAddress { strip: 0, index: 5 };
        assert_eq!(controller.pixel_color(first).unwrap(), Color::rgb(1, 2, 3));
        assert_eq!(controller.pixel_color(last).unwrap(), Color::rgb(9, 9, 9));
    }

    #[test]
    fn reverse_lookup_matches_placements() {
        let controller = small_scale();
        assert_eq!(controller.get_coordinates(0, 2), Some((0.0, -0.5)));
        assert_eq!(controller.get_coordinates(0, 6), None);
        assert_eq!(controller.get_coordinates(1, 0), None);
    }

    #[test]
    fn panel_fill_only_touches_that_hexagon() {
        let mut controller = Controller::simulated(&LayoutConfig::Hex(HexConfig::default())).unwrap();
        assert_eq!(controller.panel_count(), 7);
        controller.set_panel_color(1, Color::rgb(0, 255, 0)).unwrap();
        let lit = controller
            .json()
            .into_iter()
            .flatten()
            .filter(|p| p.g == 255)
            .count();
        assert_eq!(lit, 6);
    }

    #[test]
    fn snapshot_includes_positions_only_when_debugging() {
        let layout = LayoutConfig::Scale(ScaleConfig {
            x_count: 2,
            y_count: 2,
            panel_count: 1,
            ..ScaleConfig::default()
        });
        let plain = Controller::simulated(&layout).unwrap().json();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].len(), 6);
        assert!(plain[0][0].x.is_none());

        let debug = Controller::new(&layout, DriverPreference::Simulated, None, true)
            .unwrap()
            .json();
        assert_eq!(debug[0][0].x, Some(-0.5));
        assert_eq!(debug[0][0].y, Some(0.0));
    }

    #[test]
    fn brightness_maps_to_driver_range() {
        let mut controller = small_scale();
        controller.set_brightness(0.5);
        assert_eq!(controller.brightness(), 128);
        controller.set_brightness(3.0);
        assert_eq!(controller.brightness(), 255);
        controller.set_brightness(-1.0);
        assert_eq!(controller.brightness(), 0);
    }

    #[test]
    fn bounds_and_reach_of_small_scale() {
        let controller = small_scale();
        assert_eq!(
            controller.coordinate_bounds(),
            Bounds {
                min_x: -0.5,
                max_x: 0.5,
                min_y: -1.0,
                max_y: 0.5,
            }
        );
        let farthest = controller
            .leds()
            .iter()
            .map(|l| distance(l.x, l.y))
            .fold(0.0, f64::max);
        assert_eq!(controller.max_distance(), farthest);
        assert_eq!(controller.max_distance(), 0.5f64.hypot(1.0));
    }

    #[test]
    fn angle_and_distance_reach_each_led() {
        let mut controller = small_scale();
        let mut angles = HashMap::new();
        controller
            .map_angle(|a, address| {
                angles.insert(address.index, a);
                None
            })
            .unwrap();
        assert!((angles[&3] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((angles[&2] - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(angles[&4], 0.0);

        let mut distances = Vec::new();
        controller
            .map_distance(|d, _| {
                distances.push(d);
                None
            })
            .unwrap();
        let max = controller.max_distance();
        assert_eq!(distances.len(), 6);
        assert!(distances.iter().all(|d| (0.0..=1.0).contains(&(d / max))));
        assert!(distances.iter().any(|d| *d == max));
        assert_eq!(distances[3], 0.5);
    }

    #[test]
    fn unknown_strip_is_an_error() {
        let mut controller = small_scale();
        let address = LedAddress { strip: 3, index: 0 };
        assert!(matches!(
            controller.set_pixel_color(address, Color::rgb(1, 1, 1)),
            Err(ScalesError::Configuration(_))
        ));
        assert!(controller.pixel_color(address).is_err());
    }

    #[test]
    fn hardware_fallback_reports_simulated() {
        let layout = LayoutConfig::Scale(ScaleConfig::default());
        assert!(small_scale().is_simulated());
        let controller = Controller::new(&layout, DriverPreference::Hardware, None, false).unwrap();
        assert!(controller.is_simulated());
    }
}
