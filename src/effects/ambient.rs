//! Solid and slowly drifting colors.

use rand::RngCore;

use super::{interpolation_parameter, phase, speed_parameter};
use super::{ColorMigration, Effect, Parameter, ParameterSet, RED};
use crate::color::interpolate;
use crate::controller::Controller;
use crate::error::{Result, ScalesError};

pub struct SingleColor {
    parameters: ParameterSet,
}

impl SingleColor {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("color", Parameter::color(RED, "Color of the effect")),
        }
    }
}

impl Effect for SingleColor {
    fn name(&self) -> &'static str {
        "Single Color"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, _elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        controller.set_color(self.parameters.color("color")?)
    }
}

pub struct RandomColorSingle {
    parameters: ParameterSet,
    migration: ColorMigration,
}

impl RandomColorSingle {
    pub fn new(rng: &mut impl RngCore) -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("interpolation", interpolation_parameter()),
            migration: ColorMigration::new(rng),
        }
    }
}

impl Effect for RandomColorSingle {
    fn name(&self) -> &'static str {
        "Random Color Single"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let mode = self.parameters.interpolation("interpolation")?;
        let p = phase(elapsed_ms, self.parameters.float("speed")?).abs();
        controller.set_color(self.migration.run(p, mode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
    Radial,
}

impl Orientation {
    pub const VALUES: &'static [&'static str] = &["horizontal", "vertical", "radial"];

    fn from_name(name: &str) -> Result<Self> {
        match name {
            "horizontal" => Ok(Orientation::Horizontal),
            "vertical" => Ok(Orientation::Vertical),
            "radial" => Ok(Orientation::Radial),
            other => Err(ScalesError::invalid(
                "orientation",
                format!("unknown orientation '{}'", other),
            )),
        }
    }
}

/// Two independent drifts blended across the layout.
pub struct RandomColorDual {
    parameters: ParameterSet,
    first: ColorMigration,
    second: ColorMigration,
}

impl RandomColorDual {
    pub fn new(rng: &mut impl RngCore) -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("interpolation", interpolation_parameter())
                .with(
                    "orientation",
                    Parameter::enumeration(
                        "horizontal",
                        Orientation::VALUES,
                        "Orientation of the effect",
                    ),
                ),
            first: ColorMigration::new(rng),
            second: ColorMigration::new(rng),
        }
    }
}

impl Effect for RandomColorDual {
    fn name(&self) -> &'static str {
        "Random Color Dual"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let mode = self.parameters.interpolation("interpolation")?;
        let orientation = Orientation::from_name(self.parameters.choice("orientation")?)?;
        let p = phase(elapsed_ms, self.parameters.float("speed")?).abs();
        let a = self.first.run(p, mode);
        let b = self.second.run(p, mode);

        match orientation {
            Orientation::Horizontal => {
                controller.map_scaled_coordinates(true, |x, _, _| Some(interpolate(a, b, x, mode)))
            }
            Orientation::Vertical => {
                controller.map_scaled_coordinates(true, |_, y, _| Some(interpolate(a, b, y, mode)))
            }
            Orientation::Radial => {
                controller.map_scaled_distance(|d, _| Some(interpolate(a, b, d, mode)))
            }
        }
    }
}

/// One drift per hexagon, each hexagon filled with its own color.
pub struct RandomColorHex {
    parameters: ParameterSet,
    migrations: Vec<ColorMigration>,
}

impl RandomColorHex {
    pub fn new(controller: &Controller, rng: &mut impl RngCore) -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("interpolation", interpolation_parameter()),
            migrations: (0..controller.panel_count())
                .map(|_| ColorMigration::new(rng))
                .collect(),
        }
    }
}

impl Effect for RandomColorHex {
    fn name(&self) -> &'static str {
        "Random Color Hex"
    }

    fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    fn run(&mut self, elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
        let mode = self.parameters.interpolation("interpolation")?;
        let p = phase(elapsed_ms, self.parameters.float("speed")?).abs();
        for (panel, migration) in self.migrations.iter_mut().enumerate() {
            controller.set_panel_color(panel, migration.run(p, mode))?;
        }
        Ok(())
    }
}
