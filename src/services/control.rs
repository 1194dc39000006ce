//! Business logic behind the control surface.
//!
//! Every mutating operation goes through the render engine and then
//! rewrites the persisted state document in the background.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Map;

use crate::error::{Result, ScalesError};
use crate::models::config::VisualizerConfig;
use crate::models::effects::{EffectsResponse, SetEffectRequest, SuccessResponse};
use crate::models::performance::PerformanceResponse;
use crate::models::presets::{ApplyPresetRequest, Preset, PresetInput};
use crate::models::state::{StateRequest, StateResponse, StateUpdateResponse};
use crate::persistence::{PersistedState, StateStore};
use crate::render_engine::RenderEngine;

#[derive(Clone)]
pub struct ControlService {
    engine: RenderEngine,
    store: StateStore,
    presets: Arc<Mutex<Vec<Preset>>>,
}

impl ControlService {
    pub fn new(engine: RenderEngine, store: StateStore, presets: Vec<Preset>) -> Self {
        Self {
            engine,
            store,
            presets: Arc::new(Mutex::new(presets)),
        }
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    pub fn config(&self) -> VisualizerConfig {
        self.engine.visualizer_config()
    }

    pub fn effects(&self) -> EffectsResponse {
        self.engine.effects()
    }

    pub fn set_effect(&self, request: SetEffectRequest) -> Result<SuccessResponse> {
        let name = request
            .effect_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ScalesError::bad_request("No effect name provided"))?;
        self.engine
            .select_effect(&name, request.parameters.as_ref())?;
        self.persist();
        Ok(SuccessResponse::ok())
    }

    pub fn state(&self) -> StateResponse {
        self.engine.state()
    }

    pub fn set_state(&self, request: StateRequest) -> Result<StateUpdateResponse> {
        if let Some(brightness) = request.brightness {
            if !brightness.is_finite() {
                return Err(ScalesError::invalid("brightness", "must be a number"));
            }
            self.engine.set_brightness(brightness);
        }
        if let Some(on) = request.power_state {
            self.engine.set_power(on);
        }
        self.persist();
        Ok(StateUpdateResponse {
            success: true,
            state: self.engine.state(),
        })
    }

    pub fn presets(&self) -> Vec<Preset> {
        self.presets.lock().expect("presets poisoned").clone()
    }

    /// Insert or replace by id. Fields left out are taken from the live
    /// state: the current effect, its parameters and the user brightness.
    pub fn save_preset(&self, input: PresetInput) -> Result<Preset> {
        let name = input
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ScalesError::bad_request("Invalid preset data"))?;
        let effect = input
            .effect
            .unwrap_or_else(|| self.engine.current_effect().to_string());
        if !self.engine.has_effect(&effect) {
            return Err(ScalesError::UnknownEffect(effect));
        }
        let parameters = match input.parameters {
            Some(parameters) => parameters,
            None => self.engine.effect_parameters(&effect)?,
        };
        let brightness = input
            .brightness
            .unwrap_or_else(|| self.engine.state().brightness);

        let preset = Preset {
            id: input.id.unwrap_or_else(|| Utc::now().timestamp_millis()),
            name,
            effect,
            brightness,
            parameters,
        };
        {
            let mut presets = self.presets.lock().expect("presets poisoned");
            match presets.iter_mut().find(|p| p.id == preset.id) {
                Some(existing) => *existing = preset.clone(),
                None => presets.push(preset.clone()),
            }
        }
        self.persist();
        Ok(preset)
    }

    /// Removing an id that does not exist still succeeds.
    pub fn delete_preset(&self, id: i64) -> SuccessResponse {
        self.presets
            .lock()
            .expect("presets poisoned")
            .retain(|p| p.id != id);
        self.persist();
        SuccessResponse::ok()
    }

    /// Apply an inline bundle, or the stored preset named by `id`. Inline
    /// fields override the stored ones.
    pub fn apply_preset(&self, request: ApplyPresetRequest) -> Result<SuccessResponse> {
        let stored = match request.id {
            Some(id) => Some(
                self.presets()
                    .into_iter()
                    .find(|p| p.id == id)
                    .ok_or(ScalesError::UnknownPreset(id))?,
            ),
            None => None,
        };

        let effect = request
            .effect
            .or_else(|| stored.as_ref().map(|p| p.effect.clone()))
            .ok_or_else(|| ScalesError::bad_request("No preset data provided"))?;
        let parameters: Option<Map<_, _>> = request
            .parameters
            .or_else(|| stored.as_ref().map(|p| p.parameters.clone()));
        let brightness = request
            .brightness
            .or_else(|| stored.as_ref().map(|p| p.brightness));

        if let Some(brightness) = brightness {
            if !brightness.is_finite() {
                return Err(ScalesError::invalid("brightness", "must be a number"));
            }
        }
        self.engine.select_effect(&effect, parameters.as_ref())?;
        if let Some(brightness) = brightness {
            self.engine.set_brightness(brightness);
        }
        self.persist();
        Ok(SuccessResponse::ok())
    }

    pub fn performance(&self) -> PerformanceResponse {
        self.engine.performance()
    }

    fn persisted_state(&self) -> PersistedState {
        let state = self.engine.state();
        PersistedState {
            power_state: state.target_power_state,
            effect_name: Some(self.engine.current_effect().to_string()),
            brightness: state.brightness,
            presets: self.presets(),
        }
    }

    fn persist(&self) {
        self.store.save_detached_with(|| self.persisted_state());
    }
}
