use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "state.ts")]
pub enum PowerPhase {
    Off,
    FadingIn,
    On,
    FadingOut,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "state.ts")]
pub struct StateResponse {
    pub power_state: bool,
    pub target_power_state: bool,
    pub brightness: f64,
    pub phase: PowerPhase,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "state.ts")]
pub struct StateUpdateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub state: StateResponse,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default)]
#[ts(export, export_to = "state.ts")]
pub struct StateRequest {
    #[serde(default)]
    #[ts(optional)]
    pub power_state: Option<bool>,
    #[serde(default)]
    #[ts(optional)]
    pub brightness: Option<f64>,
}
