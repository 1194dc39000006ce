//! Render Engine
//!
//! Owns the controller, the effect registry and the power/brightness state.
//! One background task renders frames; request handlers mutate the shared
//! state between frames through the same lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::broadcast::Broadcaster;
use crate::color::Color;
use crate::controller::Controller;
use crate::effects::EffectRegistry;
use crate::error::{Result, ScalesError};
use crate::models::config::VisualizerConfig;
use crate::models::effects::EffectsResponse;
use crate::models::frame::FrameSnapshot;
use crate::models::performance::{FrameTiming, PerformanceResponse};
use crate::models::state::{PowerPhase, StateResponse};
use crate::persistence::PersistedState;
use crate::settings::AppSettings;

/// Power state machine. Every query is a pure function of the current time.
#[derive(Debug, Clone)]
struct FadeState {
    /// Actual state; changes only when a fade completes.
    power_state: bool,
    target: bool,
    fading: bool,
    fade_start_ms: u64,
    duration_ms: u64,
    /// Level the current fade started from.
    start_level: f64,
}

impl FadeState {
    fn new(power_state: bool, duration_ms: u64) -> Self {
        Self {
            power_state,
            target: power_state,
            fading: false,
            fade_start_ms: 0,
            duration_ms,
            start_level: if power_state { 1.0 } else { 0.0 },
        }
    }

    fn progress(&self, now_ms: u64) -> f64 {
        if !self.fading || self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.fade_start_ms) as f64;
        (elapsed / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    /// Fade multiplier in [0, 1].
    fn level(&self, now_ms: u64) -> f64 {
        if !self.fading {
            return if self.power_state { 1.0 } else { 0.0 };
        }
        let p = self.progress(now_ms);
        if self.target {
            self.start_level + (1.0 - self.start_level) * p
        } else {
            self.start_level * (1.0 - p)
        }
    }

    fn phase(&self) -> PowerPhase {
        match (self.fading, self.target, self.power_state) {
            (true, true, _) => PowerPhase::FadingIn,
            (true, false, _) => PowerPhase::FadingOut,
            (false, _, true) => PowerPhase::On,
            (false, _, false) => PowerPhase::Off,
        }
    }

    fn tick(&mut self, now_ms: u64) {
        if self.fading && self.progress(now_ms) >= 1.0 {
            self.fading = false;
            self.power_state = self.target;
        }
    }

    /// Returns false when `on` is already the target.
    fn request(&mut self, on: bool, now_ms: u64) -> bool {
        if on == self.target {
            return false;
        }
        self.start_level = self.level(now_ms);
        self.target = on;
        self.fading = true;
        self.fade_start_ms = now_ms;
        true
    }
}

/// Rolling frame timing, cleared after every summary.
struct FrameStats {
    frames_rendered: u64,
    window_frames: u64,
    window_total_ms: f64,
    window_max_ms: f64,
    window_start: Instant,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            frames_rendered: 0,
            window_frames: 0,
            window_total_ms: 0.0,
            window_max_ms: 0.0,
            window_start: Instant::now(),
        }
    }

    fn record(&mut self, frame_ms: f64) {
        self.frames_rendered += 1;
        self.window_frames += 1;
        self.window_total_ms += frame_ms;
        self.window_max_ms = self.window_max_ms.max(frame_ms);
    }

    fn timing(&self) -> FrameTiming {
        let window_secs = self.window_start.elapsed().as_secs_f64();
        FrameTiming {
            frames_rendered: self.frames_rendered,
            window_frames: self.window_frames,
            average_frame_ms: if self.window_frames > 0 {
                self.window_total_ms / self.window_frames as f64
            } else {
                0.0
            },
            max_frame_ms: self.window_max_ms,
            fps: if window_secs > 0.0 {
                self.window_frames as f64 / window_secs
            } else {
                0.0
            },
        }
    }

    fn reset_window(&mut self) {
        self.window_frames = 0;
        self.window_total_ms = 0.0;
        self.window_max_ms = 0.0;
        self.window_start = Instant::now();
    }
}

#[derive(Clone)]
pub struct RenderEngine {
    inner: Arc<Mutex<RenderEngineInner>>,
    running: Arc<AtomicBool>,
    broadcaster: Broadcaster,
    started: Instant,
    frame_interval: Duration,
    slow_frame_warning_ms: f64,
    performance_log_interval: u64,
}

struct RenderEngineInner {
    controller: Controller,
    registry: EffectRegistry,
    current: usize,
    fade: FadeState,
    /// User brightness in [0, 1].
    brightness: f64,
    stats: FrameStats,
}

impl RenderEngine {
    /// Restores effect, power and brightness from `initial`. An unknown
    /// stored effect falls back to the first registered one.
    pub fn new(
        controller: Controller,
        registry: EffectRegistry,
        settings: &AppSettings,
        initial: &PersistedState,
    ) -> Result<Self> {
        if registry.is_empty() {
            return Err(ScalesError::Configuration(
                "no effects registered".to_string(),
            ));
        }
        let current = match initial.effect_name.as_deref() {
            Some(name) => registry.index_of(name).unwrap_or_else(|| {
                log::warn!(
                    "[render] Stored effect '{}' is not available, using '{}'",
                    name,
                    registry.key(0).unwrap_or_default()
                );
                0
            }),
            None => 0,
        };
        let broadcaster = Broadcaster::new(settings.observer_check_interval, controller.led_count());
        let frame_interval = settings.frame_interval_ms(controller.is_simulated()).max(1);

        Ok(Self {
            inner: Arc::new(Mutex::new(RenderEngineInner {
                controller,
                registry,
                current,
                fade: FadeState::new(initial.power_state, settings.fade_duration_ms),
                brightness: clamp_brightness(initial.brightness),
                stats: FrameStats::new(),
            })),
            running: Arc::new(AtomicBool::new(false)),
            broadcaster,
            started: Instant::now(),
            frame_interval: Duration::from_millis(frame_interval),
            slow_frame_warning_ms: settings.slow_frame_warning_ms,
            performance_log_interval: settings.performance_log_interval.max(1),
        })
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Milliseconds since the engine was built. Effects animate on this clock.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Render one frame at `now_ms` and push it to observers if due.
    pub fn render_frame(&self, now_ms: u64) -> Result<()> {
        let frame_start = Instant::now();
        let snapshot = {
            let mut guard = self.inner.lock().expect("render engine poisoned");
            let inner = &mut *guard;

            inner.fade.tick(now_ms);
            let drawn = if inner.fade.phase() == PowerPhase::Off {
                blackout(&mut inner.controller)
            } else {
                draw(inner, now_ms)
            };
            if let Err(e) = drawn {
                // Leave the strips dark rather than half drawn.
                if let Err(dark) = blackout(&mut inner.controller) {
                    log::warn!("[render] Blackout after failed frame also failed: {}", dark);
                }
                return Err(e);
            }

            let frame_ms = frame_start.elapsed().as_secs_f64() * 1000.0;
            inner.stats.record(frame_ms);
            if frame_ms > self.slow_frame_warning_ms {
                log::warn!("[render] Slow frame: {:.1} ms", frame_ms);
            }
            if inner.stats.frames_rendered % self.performance_log_interval == 0 {
                let timing = inner.stats.timing();
                log::info!(
                    "[render] {} frames, avg {:.2} ms, max {:.2} ms, {:.1} fps",
                    timing.frames_rendered,
                    timing.average_frame_ms,
                    timing.max_frame_ms,
                    timing.fps
                );
                inner.stats.reset_window();
            }

            if self.broadcaster.should_emit() {
                Some(inner.controller.json())
            } else {
                None
            }
        };

        if let Some(frame) = snapshot {
            let payload = serde_json::to_string(&frame)?;
            self.broadcaster.send(Arc::from(payload));
        }
        Ok(())
    }

    /// Spawn the render loop. It runs until `stop` is called or a frame
    /// fails, and always leaves the strips dark on exit.
    pub fn spawn_render_loop(&self) -> JoinHandle<Result<()>> {
        let engine = self.clone();
        self.running.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            log::info!(
                "[render] Render loop started ({} ms per frame)",
                engine.frame_interval.as_millis()
            );
            let outcome = loop {
                if !engine.running.load(Ordering::SeqCst) {
                    break Ok(());
                }
                if let Err(e) = engine.render_frame(engine.now_ms()) {
                    log::error!("[render] Frame failed, stopping: {}", e);
                    break Err(e);
                }
                sleep(engine.frame_interval).await;
            };
            engine.running.store(false, Ordering::SeqCst);
            let dark = engine.blackout();
            log::info!("[render] Render loop stopped");
            outcome.and(dark)
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Flood black and show.
    pub fn blackout(&self) -> Result<()> {
        let mut guard = self.inner.lock().expect("render engine poisoned");
        blackout(&mut guard.controller)
    }

    /// Switch the active effect, applying `parameters` first. Nothing changes
    /// unless every parameter is valid.
    pub fn select_effect(&self, key: &str, parameters: Option<&Map<String, Value>>) -> Result<()> {
        let mut guard = self.inner.lock().expect("render engine poisoned");
        let index = guard.registry.resolve(key)?;
        if let Some(parameters) = parameters {
            guard.registry.validate_parameters(index, parameters)?;
            guard.registry.apply_parameters(index, parameters)?;
        }
        if guard.current != index {
            log::info!("[render] Effect -> {}", key);
        }
        guard.current = index;
        Ok(())
    }

    pub fn current_effect(&self) -> &'static str {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.registry.key(guard.current).unwrap_or_default()
    }

    pub fn has_effect(&self, key: &str) -> bool {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.registry.index_of(key).is_some()
    }

    /// Current parameter values of an effect.
    pub fn effect_parameters(&self, key: &str) -> Result<Map<String, Value>> {
        let guard = self.inner.lock().expect("render engine poisoned");
        let index = guard.registry.resolve(key)?;
        Ok(guard
            .registry
            .get(index)
            .map(|effect| effect.parameters().to_json())
            .unwrap_or_default())
    }

    pub fn effects(&self) -> EffectsResponse {
        let guard = self.inner.lock().expect("render engine poisoned");
        EffectsResponse {
            effect_parameters: guard.registry.describe(),
            effect_names: guard.registry.display_names(),
            effect_order: guard.registry.keys().into_iter().map(String::from).collect(),
            current_effect: guard
                .registry
                .key(guard.current)
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn set_power(&self, on: bool) -> bool {
        self.set_power_at(on, self.now_ms())
    }

    /// Start a fade towards `on`. Returns false when already heading there.
    pub fn set_power_at(&self, on: bool, now_ms: u64) -> bool {
        let mut guard = self.inner.lock().expect("render engine poisoned");
        let changed = guard.fade.request(on, now_ms);
        if changed {
            log::info!("[render] Power -> {}", if on { "on" } else { "off" });
        }
        changed
    }

    /// Clamped to [0, 1].
    pub fn set_brightness(&self, brightness: f64) {
        let mut guard = self.inner.lock().expect("render engine poisoned");
        guard.brightness = clamp_brightness(brightness);
    }

    pub fn state(&self) -> StateResponse {
        self.state_at(self.now_ms())
    }

    pub fn state_at(&self, now_ms: u64) -> StateResponse {
        let mut guard = self.inner.lock().expect("render engine poisoned");
        guard.fade.tick(now_ms);
        StateResponse {
            power_state: guard.fade.power_state,
            target_power_state: guard.fade.target,
            brightness: guard.brightness,
            phase: guard.fade.phase(),
        }
    }

    /// Fade level times user brightness.
    pub fn effective_brightness_at(&self, now_ms: u64) -> f64 {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.fade.level(now_ms) * guard.brightness
    }

    pub fn visualizer_config(&self) -> VisualizerConfig {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.controller.visualizer_config().clone()
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.controller.json()
    }

    pub fn timing(&self) -> FrameTiming {
        let guard = self.inner.lock().expect("render engine poisoned");
        guard.stats.timing()
    }

    pub fn performance(&self) -> PerformanceResponse {
        PerformanceResponse {
            websocket: self.broadcaster.stats(),
            render: self.timing(),
        }
    }

    /// Run `f` against the controller between frames.
    pub fn with_controller<R>(&self, f: impl FnOnce(&Controller) -> R) -> R {
        let guard = self.inner.lock().expect("render engine poisoned");
        f(&guard.controller)
    }
}

fn clamp_brightness(brightness: f64) -> f64 {
    if brightness.is_nan() {
        0.0
    } else {
        brightness.clamp(0.0, 1.0)
    }
}

fn draw(inner: &mut RenderEngineInner, now_ms: u64) -> Result<()> {
    let level = inner.fade.level(now_ms) * inner.brightness;
    let effect = inner
        .registry
        .get_mut(inner.current)
        .ok_or_else(|| ScalesError::UnknownEffect(inner.current.to_string()))?;
    effect.run(now_ms, &mut inner.controller)?;
    inner.controller.set_brightness(level);
    inner.controller.show()
}

fn blackout(controller: &mut Controller) -> Result<()> {
    controller.set_color(Color::BLACK)?;
    controller.show()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, ScaleConfig};

    fn engine_with(initial: PersistedState) -> RenderEngine {
        let controller = Controller::simulated(&LayoutConfig::Scale(ScaleConfig {
            x_count: 2,
            y_count: 2,
            panel_count: 1,
            ..ScaleConfig::default()
        }))
        .unwrap();
        let registry = EffectRegistry::seeded(&controller, 7);
        RenderEngine::new(controller, registry, &AppSettings::default(), &initial).unwrap()
    }

    fn engine() -> RenderEngine {
        engine_with(PersistedState::default())
    }

    struct Broken {
        parameters: crate::effects::ParameterSet,
    }

    impl crate::effects::Effect for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        fn parameters(&self) -> &crate::effects::ParameterSet {
            &self.parameters
        }

        fn parameters_mut(&mut self) -> &mut crate::effects::ParameterSet {
            &mut self.parameters
        }

        fn run(&mut self, _elapsed_ms: u64, controller: &mut Controller) -> Result<()> {
            controller.set_color(Color::rgb(200, 10, 10))?;
            Err(ScalesError::RenderTask("effect gave up".into()))
        }
    }

    #[test]
    fn failed_frame_leaves_strips_dark() {
        let controller = Controller::simulated(&LayoutConfig::Scale(ScaleConfig {
            x_count: 2,
            y_count: 2,
            panel_count: 1,
            ..ScaleConfig::default()
        }))
        .unwrap();
        let registry = EffectRegistry::new().with(
            "broken",
            Box::new(Broken {
                parameters: crate::effects::ParameterSet::new(),
            }),
        );
        let initial = PersistedState {
            power_state: true,
            ..PersistedState::default()
        };
        let engine =
            RenderEngine::new(controller, registry, &AppSettings::default(), &initial).unwrap();
        assert!(matches!(engine.render_frame(10), Err(ScalesError::RenderTask(_))));
        assert!(all_dark(&engine));
    }

    #[test]
    fn frame_interval_follows_the_opened_driver() {
        let settings = AppSettings::default();
        let controller = Controller::new(
            &LayoutConfig::Scale(ScaleConfig::default()),
            pixel_strip::DriverPreference::Hardware,
            None,
            false,
        )
        .unwrap();
        let registry = EffectRegistry::seeded(&controller, 7);
        let engine =
            RenderEngine::new(controller, registry, &settings, &PersistedState::default()).unwrap();
        assert_eq!(
            engine.frame_interval(),
            Duration::from_millis(settings.frame_interval_simulated_ms)
        );
        assert_eq!(engine.frame_interval(), Duration::from_millis(33));
    }

    fn all_dark(engine: &RenderEngine) -> bool {
        engine.with_controller(|c| {
            c.leds()
                .iter()
                .all(|led| c.pixel_color(led.address).unwrap() == Color::BLACK)
        })
    }

    #[test]
    fn fade_in_is_monotone_and_lands_on_user_brightness() {
        let engine = engine_with(PersistedState {
            power_state: false,
            brightness: 0.8,
            ..PersistedState::default()
        });
        assert!(engine.set_power_at(true, 1000));

        let mut last = 0.0;
        for t in (1000..=1400).step_by(10) {
            engine.render_frame(t).unwrap();
            let level = engine.effective_brightness_at(t);
            assert!(level >= last, "brightness dropped at {}", t);
            last = level;
        }
        assert_eq!(engine.effective_brightness_at(1300), 0.8);
        let state = engine.state_at(1400);
        assert!(state.power_state);
        assert_eq!(state.phase, PowerPhase::On);
    }

    #[test]
    fn fade_out_darkens_then_stops_drawing() {
        let engine = engine();
        engine.render_frame(0).unwrap();
        assert!(!all_dark(&engine));

        engine.set_power_at(false, 100);
        engine.render_frame(250).unwrap();
        assert_eq!(engine.state_at(250).phase, PowerPhase::FadingOut);
        assert!(engine.effective_brightness_at(250) < 1.0);

        engine.render_frame(400).unwrap();
        assert_eq!(engine.state_at(400).phase, PowerPhase::Off);
        assert!(all_dark(&engine));
    }

    #[test]
    fn repeated_power_request_is_a_no_op() {
        let engine = engine();
        assert!(!engine.set_power_at(true, 0));
        assert!(engine.set_power_at(false, 0));
        assert!(!engine.set_power_at(false, 50));
    }

    #[test]
    fn reversing_mid_fade_continues_from_current_level() {
        let engine = engine();
        engine.set_power_at(false, 0);
        let midway = engine.effective_brightness_at(150);
        assert!((midway - 0.5).abs() < 1e-9);

        engine.set_power_at(true, 150);
        assert!((engine.effective_brightness_at(150) - midway).abs() < 1e-9);
        assert!(engine.effective_brightness_at(300) > midway);
        assert_eq!(engine.effective_brightness_at(450), 1.0);
    }

    #[test]
    fn brightness_is_clamped() {
        let engine = engine();
        engine.set_brightness(3.0);
        assert_eq!(engine.state().brightness, 1.0);
        engine.set_brightness(-1.0);
        assert_eq!(engine.state().brightness, 0.0);
    }

    #[test]
    fn unknown_stored_effect_falls_back_to_first() {
        let engine = engine_with(PersistedState {
            effect_name: Some("strobe".to_string()),
            ..PersistedState::default()
        });
        assert_eq!(engine.current_effect(), "rainbow_radial");
    }

    #[test]
    fn invalid_parameters_leave_the_effect_unchanged() {
        let engine = engine();
        let mut parameters = Map::new();
        parameters.insert("direction".into(), Value::from("sideways"));
        let err = engine
            .select_effect("single_color_radial", Some(&parameters))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(engine.current_effect(), "rainbow_radial");

        assert_eq!(
            engine.select_effect("strobe", None).unwrap_err().status_code(),
            404
        );
    }

    #[test]
    fn selected_parameters_are_applied() {
        let engine = engine();
        let mut parameters = Map::new();
        parameters.insert("direction".into(), Value::from("in"));
        engine
            .select_effect("single_color_radial", Some(&parameters))
            .unwrap();
        assert_eq!(engine.current_effect(), "single_color_radial");
        let stored = engine.effect_parameters("single_color_radial").unwrap();
        assert_eq!(stored["direction"], Value::from("in"));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_the_loop_leaves_strips_dark() {
        let engine = engine();
        let handle = engine.spawn_render_loop();
        sleep(Duration::from_millis(200)).await;
        assert!(engine.is_running());
        assert!(engine.timing().frames_rendered > 0);

        engine.stop();
        handle.await.unwrap().unwrap();
        assert!(!engine.is_running());
        assert!(all_dark(&engine));
    }

    #[tokio::test]
    async fn observers_receive_frames() {
        let engine = engine();
        let mut observer = engine.broadcaster().subscribe();
        engine.render_frame(0).unwrap();
        engine.render_frame(16).unwrap();
        let frame = observer.next().await.unwrap();
        let parsed: FrameSnapshot = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 6);
    }
}
