//! Transport-agnostic control surface: method + path + JSON body in,
//! status + JSON body out.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, ScalesError};
use crate::models::effects::ErrorResponse;
use crate::services::ControlService;

/// Path of the push channel. Served by the transport, not by `dispatch`.
pub const EVENTS_PATH: &str = "/events";

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::to_value(ErrorResponse::new(message)).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Config,
    Effects,
    State,
    Presets,
    Preset(i64),
    ApplyPreset,
    Performance,
}

fn route(path: &str) -> Option<Route> {
    let path = path.split('?').next().unwrap_or_default();
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    match path {
        "/config" => Some(Route::Config),
        "/effects" => Some(Route::Effects),
        "/state" => Some(Route::State),
        "/presets" => Some(Route::Presets),
        "/presets/apply" => Some(Route::ApplyPreset),
        "/performance" => Some(Route::Performance),
        other => other
            .strip_prefix("/presets/")
            .and_then(|id| id.parse().ok())
            .map(Route::Preset),
    }
}

/// An empty body reads as `{}`.
fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

fn json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn dispatch(service: &ControlService, method: &str, path: &str, body: &[u8]) -> Reply {
    let Some(route) = route(path) else {
        return Reply::error(404, format!("No route for {}", path));
    };

    let result = match (method, route) {
        ("GET", Route::Config) => json(service.config()),
        ("GET", Route::Effects) => json(service.effects()),
        ("POST", Route::Effects) => parse(body).and_then(|req| json(service.set_effect(req)?)),
        ("GET", Route::State) => json(service.state()),
        ("POST", Route::State) => parse(body).and_then(|req| json(service.set_state(req)?)),
        ("GET", Route::Presets) => json(service.presets()),
        ("POST", Route::Presets) => parse(body).and_then(|req| json(service.save_preset(req)?)),
        ("DELETE", Route::Preset(id)) => json(service.delete_preset(id)),
        ("POST", Route::ApplyPreset) => {
            parse(body).and_then(|req| json(service.apply_preset(req)?))
        }
        ("GET", Route::Performance) => json(service.performance()),
        _ => return Reply::error(405, format!("{} not allowed on {}", method, path)),
    };

    match result {
        Ok(body) => Reply::ok(body),
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                log::error!("[http] {} {} failed: {}", method, path, e);
            } else {
                log::debug!("[http] {} {} rejected: {}", method, path, e);
            }
            Reply::error(status, error_message(&e))
        }
    }
}

fn error_message(error: &ScalesError) -> String {
    match error {
        ScalesError::UnknownEffect(name) => format!("Effect {} not found", name),
        ScalesError::BadRequest(message) => message.clone(),
        other => other.to_string(),
    }
}
