//! Effect registry and the shared timing model.

pub mod ambient;
pub mod migration;
pub mod parameters;
pub mod radial;
pub mod sweep;

pub use migration::ColorMigration;
pub use parameters::{Parameter, ParameterSet, ParameterValue};

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::{Map, Value};

use crate::color::Color;
use crate::controller::Controller;
use crate::error::{Result, ScalesError};
use crate::layout::LayoutKind;
use crate::models::effects::ParameterDescriptor;

/// Shortest cycle, at speed 1.
pub const MIN_PERIOD_MS: f64 = 100.0;
/// Longest cycle, at speed 0.
pub const MAX_PERIOD_MS: f64 = 300_000.0;

pub const DEFAULT_SPEED: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub const VALUES: &'static [&'static str] = &["in", "out"];

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(ScalesError::invalid("direction", format!("unknown direction '{}'", other))),
        }
    }
}

/// Cycle length for a speed knob. Exponential, so equal knob steps feel
/// equally large. Never shorter than one millisecond.
pub fn period_ms(speed: f64) -> f64 {
    let period = MIN_PERIOD_MS * (MAX_PERIOD_MS / MIN_PERIOD_MS).powf(1.0 - speed);
    if period.is_finite() {
        period.max(1.0)
    } else if period.is_nan() {
        MAX_PERIOD_MS
    } else {
        f64::MAX
    }
}

/// Wrapped phase in [0, 1), negated for `Direction::In`.
pub fn time_offset(elapsed_ms: u64, speed: f64, direction: Direction) -> f64 {
    let period = period_ms(speed);
    let offset = (elapsed_ms as f64 % period) / period;
    match direction {
        Direction::In => -offset,
        Direction::Out => offset,
    }
}

/// Unwrapped, monotonically increasing phase.
pub fn phase(elapsed_ms: u64, speed: f64) -> f64 {
    elapsed_ms as f64 / period_ms(speed)
}

pub(crate) fn speed_parameter() -> Parameter {
    Parameter::float(DEFAULT_SPEED, "Speed of the effect (0-1)")
}

pub(crate) fn direction_parameter() -> Parameter {
    Parameter::enumeration("out", Direction::VALUES, "Direction of the effect")
}

pub(crate) fn interpolation_parameter() -> Parameter {
    Parameter::enumeration("linear", &["linear", "hsv"], "Color interpolation of the effect")
}

pub(crate) fn direction(parameters: &ParameterSet) -> Result<Direction> {
    Direction::from_name(parameters.choice("direction")?)
}

/// An animation. `run` draws one frame through the controller's mapping
/// primitives; it never calls `show`.
pub trait Effect: Send {
    /// Human readable name.
    fn name(&self) -> &'static str;

    fn parameters(&self) -> &ParameterSet;

    fn parameters_mut(&mut self) -> &mut ParameterSet;

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()>;
}

struct Entry {
    key: &'static str,
    effect: Box<dyn Effect>,
}

/// Effects in registration order, built once for a controller.
pub struct EffectRegistry {
    entries: Vec<Entry>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Full catalogue for a controller. Hex-only effects are added only when
    /// the controller drives a hex layout.
    pub fn for_controller(controller: &Controller) -> Self {
        Self::seeded(controller, StdRng::from_entropy().next_u64())
    }

    /// As `for_controller`, with reproducible color migrations.
    pub fn seeded(controller: &Controller, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut registry = Self::new()
            .with("rainbow_radial", Box::new(radial::RainbowRadial::new()))
            .with("single_color", Box::new(ambient::SingleColor::new()))
            .with(
                "single_color_radial",
                Box::new(radial::SingleColorRadial::new()),
            )
            .with(
                "multi_color_radial",
                Box::new(radial::MultiColorRadial::new()),
            )
            .with(
                "random_color_single",
                Box::new(ambient::RandomColorSingle::new(&mut rng)),
            )
            .with(
                "random_color_dual",
                Box::new(ambient::RandomColorDual::new(&mut rng)),
            )
            .with("rainbow", Box::new(sweep::Rainbow::new()));

        if controller.kind() == LayoutKind::Hex {
            registry = registry
                .with(
                    "random_color_hex",
                    Box::new(ambient::RandomColorHex::new(controller, &mut rng)),
                )
                .with("rainbow_spin", Box::new(sweep::RainbowSpin::new()));
        }
        registry
    }

    pub fn with(mut self, key: &'static str, effect: Box<dyn Effect>) -> Self {
        self.entries.push(Entry { key, effect });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn key(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|e| e.key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.key).collect()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Effect> {
        self.entries.get(index).map(|e| e.effect.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Effect + 'static)> {
        self.entries.get_mut(index).map(|e| e.effect.as_mut())
    }

    /// Resolve a key, failing with `UnknownEffect`.
    pub fn resolve(&self, key: &str) -> Result<usize> {
        self.index_of(key)
            .ok_or_else(|| ScalesError::UnknownEffect(key.to_string()))
    }

    pub fn validate_parameters(&self, index: usize, updates: &Map<String, Value>) -> Result<()> {
        match self.get(index) {
            Some(effect) => effect.parameters().validate(updates),
            None => Err(ScalesError::UnknownEffect(index.to_string())),
        }
    }

    pub fn apply_parameters(&mut self, index: usize, updates: &Map<String, Value>) -> Result<()> {
        match self.get_mut(index) {
            Some(effect) => effect.parameters_mut().apply(updates),
            None => Err(ScalesError::UnknownEffect(index.to_string())),
        }
    }

    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.key.to_string(), e.effect.name().to_string()))
            .collect()
    }

    pub fn describe(&self) -> BTreeMap<String, BTreeMap<String, ParameterDescriptor>> {
        self.entries
            .iter()
            .map(|e| {
                let described = e
                    .effect
                    .parameters()
                    .describe()
                    .into_iter()
                    .map(|(name, d)| (name.to_string(), d))
                    .collect();
                (e.key.to_string(), described)
            })
            .collect()
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) const RED: Color = Color::rgb(255, 0, 0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{HexConfig, LayoutConfig, ScaleConfig};

    #[test]
    fn period_spans_the_speed_range() {
        assert!((period_ms(1.0) - MIN_PERIOD_MS).abs() < 1e-9);
        assert!((period_ms(0.0) - MAX_PERIOD_MS).abs() < 1e-6);
        assert!(period_ms(0.5) > MIN_PERIOD_MS && period_ms(0.5) < MAX_PERIOD_MS);
        assert_eq!(period_ms(50.0), 1.0);
    }

    #[test]
    fn offset_wraps_and_flips_with_direction() {
        assert_eq!(time_offset(50, 1.0, Direction::Out), 0.5);
        assert_eq!(time_offset(150, 1.0, Direction::Out), 0.5);
        assert_eq!(time_offset(150, 1.0, Direction::In), -0.5);
        assert_eq!(phase(250, 1.0), 2.5);
    }

    #[test]
    fn scale_registry_has_no_hex_effects() {
        let controller = Controller::simulated(&LayoutConfig::Scale(ScaleConfig::default())).unwrap();
        let registry = EffectRegistry::seeded(&controller, 1);
        assert_eq!(registry.key(0), Some("rainbow_radial"));
        assert!(registry.index_of("rainbow_spin").is_none());
        assert!(registry.index_of("random_color_hex").is_none());
        assert!(matches!(
            registry.resolve("rainbow_spin"),
            Err(ScalesError::UnknownEffect(_))
        ));
    }

    #[test]
    fn hex_registry_adds_hex_effects() {
        let controller = Controller::simulated(&LayoutConfig::Hex(HexConfig::default())).unwrap();
        let registry = EffectRegistry::seeded(&controller, 1);
        assert_eq!(registry.len(), 9);
        assert!(registry.index_of("rainbow_spin").is_some());
        assert_eq!(
            registry.display_names().get("rainbow_spin").map(String::as_str),
            Some("Rainbow Spin")
        );
    }

    #[test]
    fn every_effect_renders_every_led() {
        for layout in [
            LayoutConfig::Scale(ScaleConfig::default()),
            LayoutConfig::Hex(HexConfig::default()),
        ] {
            let mut controller = Controller::simulated(&layout).unwrap();
            let mut registry = EffectRegistry::seeded(&controller, 7);
            for index in 0..registry.len() {
                let key = registry.key(index).unwrap();
                controller.set_color(Color::new(1, 1, 1, 1)).unwrap();
                let effect = registry.get_mut(index).unwrap();
                for t in [0u64, 16, 5_000, 60_000] {
                    effect.run(t, &mut controller).unwrap();
                }
                let untouched = controller
                    .json()
                    .into_iter()
                    .flatten()
                    .filter(|p| (p.r, p.g, p.b, p.w) == (1, 1, 1, 1))
                    .count();
                assert_eq!(untouched, 0, "{} left pixels unwritten", key);
            }
        }
    }
}
