use std::path::{Path, PathBuf};

use pixel_strip::DriverPreference;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScalesError};
use crate::layout::{HexConfig, LayoutConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Simulated,
    Hardware,
}

impl From<DriverKind> for DriverPreference {
    fn from(kind: DriverKind) -> Self {
        match kind {
            DriverKind::Simulated => DriverPreference::Simulated,
            DriverKind::Hardware => DriverPreference::Hardware,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub layout: LayoutConfig,
    pub driver: DriverKind,
    /// Include LED coordinates in pushed frames.
    pub debug_positions: bool,
    pub fade_duration_ms: u64,
    pub frame_interval_simulated_ms: u64,
    pub frame_interval_hardware_ms: u64,
    pub http_address: String,
    /// Persisted state document. `None` means `~/.led_config.json`.
    pub state_path: Option<PathBuf>,
    /// Frames between observer-count reconciliations.
    pub observer_check_interval: u64,
    pub slow_frame_warning_ms: f64,
    /// Frames between performance summaries.
    pub performance_log_interval: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            driver: DriverKind::Hardware,
            debug_positions: false,
            fade_duration_ms: 300,
            frame_interval_simulated_ms: 33,
            frame_interval_hardware_ms: 16,
            http_address: "0.0.0.0:5001".to_string(),
            state_path: None,
            observer_check_interval: 30,
            slow_frame_warning_ms: 50.0,
            performance_log_interval: 1000,
        }
    }
}

impl AppSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            ScalesError::Configuration(format!("{}: {}", path.display(), e))
        })
    }

    /// Settings from command-line arguments: `--config <path>` loads a file,
    /// `--mock` forces the simulated driver, `--hex` selects the default hex
    /// layout.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config_path = None;
        let mut mock = false;
        let mut hex = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--mock" => mock = true,
                "--hex" => hex = true,
                "--config" => {
                    config_path = Some(args.next().ok_or_else(|| {
                        ScalesError::Configuration("--config needs a path".into())
                    })?)
                }
                other => {
                    return Err(ScalesError::Configuration(format!(
                        "unknown argument '{}'",
                        other
                    )))
                }
            }
        }

        let mut settings = match config_path {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if mock {
            settings.driver = DriverKind::Simulated;
        }
        if hex {
            settings.layout = LayoutConfig::Hex(HexConfig::default());
        }
        Ok(settings)
    }

    /// Sleep between frames for the driver actually opened, which may be the
    /// simulated one even when hardware was requested.
    pub fn frame_interval_ms(&self, simulated: bool) -> u64 {
        if simulated {
            self.frame_interval_simulated_ms
        } else {
            self.frame_interval_hardware_ms
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".led_config.json")
        })
    }
}
