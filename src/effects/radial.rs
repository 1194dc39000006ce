//! Effects driven by each LED's normalised distance from the centre.
//!
//! Patterns are sampled at `distance - offset`, so a positive offset (the
//! "out" direction) moves them away from the centre.

use super::{direction, direction_parameter, interpolation_parameter, speed_parameter, time_offset};
use super::{Effect, Parameter, ParameterSet, RED};
use crate::color::{interpolate, rainbow, Color};
use crate::controller::Controller;
use crate::error::Result;

pub struct RainbowRadial {
    parameters: ParameterSet,
}

impl RainbowRadial {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("direction", direction_parameter()),
        }
    }
}

impl Effect for RainbowRadial {
    fn name(&self) -> &'static str {
        "Rainbow Radial"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let offset = time_offset(
            elapsed_ms,
            self.parameters.float("speed")?,
            direction(&self.parameters)?,
        );
        controller.map_scaled_distance(|d, _| Some(rainbow(d - offset)))
    }
}

/// Breathing ring: a triangular brightness envelope over the wrapped
/// distance, between `lower_bound` and full brightness.
pub struct SingleColorRadial {
    parameters: ParameterSet,
}

impl SingleColorRadial {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("color", Parameter::color(RED, "Color of the effect"))
                .with("speed", speed_parameter())
                .with("direction", direction_parameter())
                .with(
                    "lower_bound",
                    Parameter::float(0.1, "Minimum brightness of the ring (0-1)"),
                ),
        }
    }

    pub fn envelope(d: f64, lower_bound: f64) -> f64 {
        let folded = 2.0 * d.min(1.0 - d);
        lower_bound + (1.0 - lower_bound) * folded
    }
}

impl Effect for SingleColorRadial {
    fn name(&self) -> &'static str {
        "Single Color Radial"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let color = self.parameters.color("color")?;
        let lower_bound = self.parameters.float("lower_bound")?;
        let offset = time_offset(
            elapsed_ms,
            self.parameters.float("speed")?,
            direction(&self.parameters)?,
        );
        controller.map_scaled_distance(|d, _| {
            let d = (d - offset).rem_euclid(1.0);
            Some(color.scaled(Self::envelope(d, lower_bound)))
        })
    }
}

/// Bands of an ordered color list, blended and wrapping around.
pub struct MultiColorRadial {
    parameters: ParameterSet,
}

impl MultiColorRadial {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with(
                    "colors",
                    Parameter::color_list(
                        vec![RED, Color::rgb(0, 255, 0), Color::rgb(0, 0, 255)],
                        "Colors of the bands, from the centre outwards",
                    ),
                )
                .with("speed", speed_parameter())
                .with("direction", direction_parameter())
                .with("interpolation", interpolation_parameter()),
        }
    }
}

impl Effect for MultiColorRadial {
    fn name(&self) -> &'static str {
        "Multi Color Radial"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let mode = self.parameters.interpolation("interpolation")?;
        let offset = time_offset(
            elapsed_ms,
            self.parameters.float("speed")?,
            direction(&self.parameters)?,
        );
        let colors = self.parameters.colors("colors")?;
        controller.map_scaled_distance(|d, _| Some(band_color(colors, (d - offset).rem_euclid(1.0), mode)))
    }
}

/// Color at `position` in [0, 1) along a circular list of colors.
pub fn band_color(colors: &[Color], position: f64, mode: crate::color::Interpolation) -> Color {
    if colors.is_empty() {
        return Color::BLACK;
    }
    let index = position * colors.len() as f64;
    let lower = index.floor();
    let t = index - lower;
    let lo = (lower as usize) % colors.len();
    let hi = (lo + 1) % colors.len();
    interpolate(colors[lo], colors[hi], t, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Interpolation;
    use crate::layout::{LayoutConfig, ScaleConfig};
    use serde_json::json;

    fn controller() -> Controller {
        Controller::simulated(&LayoutConfig::Scale(ScaleConfig::default())).unwrap()
    }

    #[test]
    fn envelope_is_triangular() {
        assert_eq!(SingleColorRadial::envelope(0.0, 0.2), 0.2);
        assert_eq!(SingleColorRadial::envelope(0.5, 0.2), 1.0);
        assert!((SingleColorRadial::envelope(0.25, 0.0) - 0.5).abs() < 1e-12);
        assert!((SingleColorRadial::envelope(0.75, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn bands_wrap_back_to_the_first_color() {
        let colors = [Color::rgb(255, 0, 0), Color::rgb(0, 0, 255)];
        assert_eq!(band_color(&colors, 0.0, Interpolation::Linear), colors[0]);
        assert_eq!(band_color(&colors, 0.5, Interpolation::Linear), colors[1]);
        assert_eq!(
            band_color(&colors, 0.75, Interpolation::Linear),
            Color::rgb(128, 0, 128)
        );
        assert_eq!(band_color(&[Color::rgb(1, 2, 3)], 0.9, Interpolation::Hsv), Color::rgb(1, 2, 3));
    }

    #[test]
    fn rainbow_radial_farthest_led_wraps_to_start_hue() {
        let mut controller = controller();
        let mut effect = RainbowRadial::new();
        effect.run(0, &mut controller).unwrap();

        // The farthest LED has scaled distance 1 and so shows rainbow(1) == red.
        let far = controller
            .leds()
            .iter()
            .max_by(|a, b| a.distance.total_cmp(&b.distance))
            .unwrap()
            .address;
        assert_eq!(controller.pixel_color(far).unwrap(), rainbow(0.0));
    }

    #[test]
    fn ring_peak_reaches_the_edge_after_half_a_period() {
        let mut effect = SingleColorRadial::new();
        effect
            .parameters_mut()
            .apply(json!({"speed": 1.0, "lower_bound": 0.0}).as_object().unwrap())
            .unwrap();
        let mut controller = controller();
        let far = controller
            .leds()
            .iter()
            .max_by(|a, b| a.distance.total_cmp(&b.distance))
            .unwrap()
            .address;

        // 100 ms period at full speed: half a period puts the peak on the
        // farthest LED whichever way it travels.
        effect.run(50, &mut controller).unwrap();
        assert_eq!(controller.pixel_color(far).unwrap().r, 255);

        effect
            .parameters_mut()
            .set("direction", &json!("in"))
            .unwrap();
        effect.run(50, &mut controller).unwrap();
        assert_eq!(controller.pixel_color(far).unwrap().r, 255);
        effect.run(25, &mut controller).unwrap();
        assert!(controller.pixel_color(far).unwrap().r < 255);
    }

    #[test]
    fn single_color_radial_never_exceeds_the_color() {
        let mut controller = controller();
        let mut effect = SingleColorRadial::new();
        effect.run(1234, &mut controller).unwrap();
        for p in controller.json().into_iter().flatten() {
            assert!(p.r >= 25 && p.g == 0 && p.b == 0);
        }
    }
}
