pub mod broadcast;
pub mod color;
pub mod commands;
pub mod controller;
pub mod effects;
pub mod error;
pub mod http;
pub mod layout;
pub mod models;
pub mod persistence;
pub mod render_engine;
pub mod services;
pub mod settings;

use tokio::net::TcpListener;

use crate::controller::Controller;
use crate::effects::EffectRegistry;
use crate::error::Result;
use crate::persistence::StateStore;
use crate::render_engine::RenderEngine;
use crate::services::ControlService;
use crate::settings::AppSettings;

/// Build everything from `settings` and serve until Ctrl-C or a render
/// failure. The strips are dark when this returns.
pub async fn run_with(settings: AppSettings) -> Result<()> {
    let controller = Controller::new(
        &settings.layout,
        settings.driver.into(),
        None,
        settings.debug_positions,
    )?;
    log::info!(
        "[render] {} LEDs on {} panels",
        controller.led_count(),
        controller.panel_count()
    );
    let registry = EffectRegistry::for_controller(&controller);

    let store = StateStore::new(settings.state_path());
    let persisted = store.load();
    let engine = RenderEngine::new(controller, registry, &settings, &persisted)?;
    let service = ControlService::new(engine.clone(), store, persisted.presets);

    let listener = TcpListener::bind(&settings.http_address).await?;
    let mut render = engine.spawn_render_loop();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("[http] Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Shutting down");
    };

    let outcome = tokio::select! {
        served = http::serve(listener, service, shutdown) => served,
        rendered = &mut render => {
            // The loop only ends on its own when a frame failed.
            return flatten(rendered);
        }
    };

    engine.stop();
    let rendered = flatten(render.await);
    outcome.and(rendered)
}

/// Entry point for the binary: logging, settings from argv, then `run_with`.
pub async fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let settings = AppSettings::from_args(std::env::args().skip(1))?;
    run_with(settings).await
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(error::ScalesError::RenderTask(e.to_string())),
    }
}
