use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "presets.ts")]
pub struct Preset {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub effect: String,
    pub brightness: f64,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub parameters: Map<String, Value>,
}

/// Body of `POST /presets`. A missing id creates a new preset.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default)]
#[ts(export, export_to = "presets.ts")]
pub struct PresetInput {
    #[serde(default)]
    #[ts(type = "number | null")]
    pub id: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub effect: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub brightness: Option<f64>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub parameters: Option<Map<String, Value>>,
}

/// Body of `POST /presets/apply`: either an inline bundle or the id of a
/// stored preset.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default)]
#[ts(export, export_to = "presets.ts")]
pub struct ApplyPresetRequest {
    #[serde(default)]
    #[ts(type = "number | null")]
    pub id: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub effect: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub brightness: Option<f64>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub parameters: Option<Map<String, Value>>,
}
