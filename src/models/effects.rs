use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "effects.ts")]
pub enum ParameterType {
    Float,
    Enum,
    Color,
    ColorList,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "effects.ts")]
pub struct ParameterDescriptor {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
    #[ts(type = "unknown")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enum_values: Option<Vec<String>>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug)]
#[ts(export, export_to = "effects.ts")]
pub struct EffectsResponse {
    /// Effect key -> parameter name -> descriptor.
    pub effect_parameters: BTreeMap<String, BTreeMap<String, ParameterDescriptor>>,
    /// Effect key -> display name.
    pub effect_names: BTreeMap<String, String>,
    /// Effect keys in registry order.
    pub effect_order: Vec<String>,
    pub current_effect: String,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default)]
#[ts(export, export_to = "effects.ts")]
pub struct SetEffectRequest {
    #[serde(default)]
    #[ts(optional)]
    pub effect_name: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub parameters: Option<Map<String, Value>>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "effects.ts")]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "effects.ts")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
