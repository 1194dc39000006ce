//! Hue sweeps along strip order (every layout) or around each ring (hex).

use super::{direction, direction_parameter, speed_parameter, time_offset};
use super::{Effect, ParameterSet};
use crate::color::rainbow;
use crate::controller::Controller;
use crate::error::Result;

pub struct Rainbow {
    parameters: ParameterSet,
}

impl Rainbow {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("direction", direction_parameter()),
        }
    }
}

impl Effect for Rainbow {
    fn name(&self) -> &'static str {
        "Rainbow"
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
        controller.map_leds(|led| {
            let position = led.address.index as f64 / led.strip_len.max(1) as f64;
            Some(rainbow(position - offset))
        })
    }
}

pub struct RainbowSpin {
    parameters: ParameterSet,
}

impl RainbowSpin {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSet::new()
                .with("speed", speed_parameter())
                .with("direction", direction_parameter()),
        }
    }
}

impl Effect for RainbowSpin {
    fn name(&self) -> &'static str {
        "Rainbow Spin"
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
        controller.map_leds(|led| {
            let position = led.ring_position.unwrap_or(led.angle / std::f64::consts::TAU);
            Some(rainbow(position - offset))
        })
    }
}
