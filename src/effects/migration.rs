use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::color::{interpolate, Color, Interpolation};

/// Open-ended drift between random fully saturated colors.
///
/// Driven by an unwrapped phase: each leg blends `from` towards `to` over one
/// unit of phase after a random hold of up to half a unit, then rolls a new
/// target.
#[derive(Debug, Clone)]
pub struct ColorMigration {
    from: Color,
    to: Color,
    random_offset: f64,
    base_offset: f64,
    rng: StdRng,
}

impl ColorMigration {
    pub fn new(rng: &mut impl RngCore) -> Self {
        let mut rng = StdRng::seed_from_u64(rng.next_u64());
        let to = Self::random_color(&mut rng);
        let mut migration = Self {
            from: to,
            to,
            random_offset: 0.0,
            base_offset: 0.0,
            rng,
        };
        migration.re_init(0.0);
        migration
    }

    fn random_color(rng: &mut StdRng) -> Color {
        Color::from_hsv(rng.gen_range(0.0..360.0), 1.0, 1.0)
    }

    fn re_init(&mut self, phase: f64) {
        self.from = self.to;
        self.to = Self::random_color(&mut self.rng);
        self.random_offset = self.rng.gen_range(0.0..0.5);
        self.base_offset = phase;
    }

    /// Color at `phase`.
    pub fn run(&mut self, phase: f64, mode: Interpolation) -> Color {
        if !phase.is_finite() {
            return self.from;
        }
        // A speed change can move the phase backwards.
        if phase < self.base_offset {
            self.base_offset = phase;
        }
        let progress = phase - (self.base_offset + self.random_offset);
        let color = interpolate(self.from, self.to, progress, mode);
        if progress >= 1.0 {
            self.re_init(phase);
        }
        color
    }

    pub fn target(&self) -> Color {
        self.to
    }
}
