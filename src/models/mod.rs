pub mod config;
pub mod effects;
pub mod frame;
pub mod performance;
pub mod presets;
pub mod state;
