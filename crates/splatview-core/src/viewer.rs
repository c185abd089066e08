//! Viewer lifecycle manager
//!
//! Owns the single renderer handle and sequences the `Empty -> Loading ->
//! Active` lifecycle: scene streaming, deferred settings application once
//! the mesh is available, splat-count polling, telemetry, and teardown.
//! Driven by the presentation shell, which calls [`ViewerManager::tick`]
//! once per rendered frame and forwards user intents through the other
//! operations.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::format::SceneFormat;
use crate::orbit::AutoRotateDriver;
use crate::renderer::{
    LoadStatus, RendererFactory, RendererOptions, SceneError, SceneRequest, SceneSource,
    SplatRenderer,
};
use crate::settings::{SettingsUpdate, ViewerSettings};
use crate::state::{group_digits, ViewerState};
use crate::telemetry::{format_bytes, FpsCounter, HeapProbe, MemoryProbe};

/// The one user-facing message for any load failure; causes go to the log
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load file. Please check the format.";

/// Per-axis scale applied to every scene at load time (flips Y into the
/// renderer's convention)
pub const SCENE_SCALE: [f32; 3] = [2.0, -2.0, 2.0];

/// Cadence of the splat-count poll after a scene becomes active
const SPLAT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sequences scene loading, settings application, and teardown against the
/// external renderer.
///
/// The manager exclusively owns the renderer handle; the raw handle is
/// never exposed. A second `load_scene` while one is already streaming is
/// rejected, so the lifecycle is race-free even though everything runs on
/// the frame loop.
pub struct ViewerManager<F: RendererFactory> {
    factory: F,
    renderer: Option<F::Renderer>,
    settings: ViewerSettings,
    state: ViewerState,
    orbit: AutoRotateDriver,
    fps: FpsCounter,
    heap: Box<dyn MemoryProbe + Send + Sync>,
    pending_filename: Option<String>,
    /// Armed when a scene becomes active; settings are pushed to the
    /// renderer once its mesh handle exists
    apply_settings_when_ready: bool,
    /// Next splat-count poll, re-armed until the count becomes positive
    splat_poll_at: Option<Duration>,
}

impl<F: RendererFactory> ViewerManager<F> {
    pub fn new(factory: F) -> Self {
        Self::with_memory_probe(factory, Box::new(HeapProbe))
    }

    /// Construct with a specific host memory probe (tests, other platforms)
    pub fn with_memory_probe(factory: F, heap: Box<dyn MemoryProbe + Send + Sync>) -> Self {
        Self {
            factory,
            renderer: None,
            settings: ViewerSettings::default(),
            state: ViewerState::default(),
            orbit: AutoRotateDriver::new(),
            fps: FpsCounter::new(),
            heap,
            pending_filename: None,
            apply_settings_when_ready: false,
            splat_poll_at: None,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Begin streaming a scene, tearing down any active one first.
    ///
    /// Rejected while another load is in flight; the caller keeps the UI
    /// affordances hidden during a load, but the guard makes the race
    /// well-defined regardless.
    pub fn load_scene(&mut self, source: SceneSource) {
        if self.state.is_loading {
            warn!("load requested while another load is in flight; rejected");
            return;
        }

        self.teardown_session();
        self.state = ViewerState {
            is_loading: true,
            ..ViewerState::default()
        };

        let filename = source.display_name();
        let format = SceneFormat::from_filename(&filename);
        info!(filename = %filename, ?format, "loading scene");

        let request = SceneRequest {
            source,
            format,
            scale: SCENE_SCALE,
            progressive_load: true,
        };

        let mut renderer = match self.factory.create(&RendererOptions::default()) {
            Ok(renderer) => renderer,
            Err(cause) => {
                self.fail_load(&cause);
                return;
            }
        };
        if let Err(cause) = renderer.begin_scene(&request) {
            renderer.dispose();
            self.fail_load(&cause);
            return;
        }

        self.renderer = Some(renderer);
        self.pending_filename = Some(filename);
    }

    /// Per-frame pump; `now` is a monotonic clock since shell startup
    pub fn tick(&mut self, now: Duration) {
        if self.state.is_loading {
            self.pump_load(now);
        } else if self.state.is_viewer_active {
            self.pump_active(now);
        }
    }

    /// Merge a partial settings update, then push only the changed fields
    /// to the live renderer. Without a renderer the settings still persist
    /// for the next load.
    pub fn update_settings(&mut self, update: SettingsUpdate) {
        let previous = self.settings;
        self.settings = previous.merged(&update);
        let current = self.settings;

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if current.resolved_background() != previous.resolved_background() {
            renderer.set_clear_color(current.resolved_background());
        }
        if current.point_cloud_mode != previous.point_cloud_mode {
            renderer.set_point_cloud_mode(current.point_cloud_mode);
        }
        if current.point_size != previous.point_size {
            renderer.set_splat_scale(current.point_size);
        }
        if current.auto_rotate != previous.auto_rotate {
            if current.auto_rotate {
                self.orbit.start(renderer.camera_pose(), current.auto_rotate_speed);
            } else {
                self.orbit.stop();
            }
        } else if current.auto_rotate && current.auto_rotate_speed != previous.auto_rotate_speed {
            // Restart the orbit at the new speed from the current placement.
            self.orbit.start(renderer.camera_pose(), current.auto_rotate_speed);
        }
    }

    /// Restore the camera to its initial pose and zero the orbit angle.
    /// No-op without a renderer.
    pub fn reset_camera(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        renderer.reset_camera();
        self.orbit.reset_angle();
    }

    /// Tear everything down and return to the empty state. Idempotent.
    pub fn reset_viewer(&mut self) {
        self.teardown_session();
        self.state = ViewerState::default();
    }

    /// Shell-teardown cleanup; the `Option` teardown makes repeated calls
    /// free nothing twice.
    pub fn dispose(&mut self) {
        self.reset_viewer();
    }

    /// Clear the user-facing error (banner dismissed)
    pub fn dismiss_error(&mut self) {
        self.state.error = None;
    }

    fn pump_load(&mut self, now: Duration) {
        let status = match self.renderer.as_mut() {
            Some(renderer) => renderer.poll_load(),
            None => return,
        };
        match status {
            LoadStatus::Streaming(fraction) => {
                let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
                // Monotonic within one load even if the source re-reports.
                if percent > self.state.progress {
                    self.state.progress = percent;
                }
            }
            LoadStatus::Ready => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.start();
                }
                self.state.progress = 100;
                self.state.is_loading = false;
                self.state.is_viewer_active = true;
                self.state.filename = self
                    .pending_filename
                    .take()
                    .unwrap_or_else(|| ViewerState::default().filename);
                self.apply_settings_when_ready = true;
                self.splat_poll_at = Some(now + SPLAT_POLL_INTERVAL);
                self.fps.restart(now);
                info!(filename = %self.state.filename, "scene active");
            }
            LoadStatus::Failed(cause) => {
                self.fail_load(&SceneError::Stream(cause));
            }
        }
    }

    fn pump_active(&mut self, now: Duration) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        // Deferred settings pass: the mesh handle is not guaranteed to
        // exist right after the load call returns, so the pass waits for
        // the renderer to report one.
        if self.apply_settings_when_ready && renderer.splat_count().is_some() {
            renderer.set_clear_color(self.settings.resolved_background());
            renderer.set_point_cloud_mode(self.settings.point_cloud_mode);
            renderer.set_splat_scale(self.settings.point_size);
            if self.settings.auto_rotate {
                self.orbit
                    .start(renderer.camera_pose(), self.settings.auto_rotate_speed);
            }
            self.apply_settings_when_ready = false;
            debug!("applied settings to fresh scene");
        }

        // The count may stay at zero until internal buffers finish
        // uploading; keep polling until it turns positive.
        if let Some(due) = self.splat_poll_at {
            if now >= due {
                match renderer.splat_count() {
                    Some(count) if count > 0 => {
                        self.state.splat_count = group_digits(count);
                        self.splat_poll_at = None;
                    }
                    _ => self.splat_poll_at = Some(now + SPLAT_POLL_INTERVAL),
                }
            }
        }

        if self.orbit.is_running() {
            let pose = self.orbit.advance();
            renderer.set_camera_pose(pose);
        }

        if let Some(fps) = self.fps.frame(now) {
            self.state.fps = fps;
            self.state.memory_usage = match renderer.gpu_memory_bytes().or_else(|| self.heap.sample())
            {
                Some(bytes) => format_bytes(bytes),
                None => ViewerState::default().memory_usage,
            };
        }
    }

    /// Stop the periodic tasks and dispose the renderer handle, leaving
    /// the published state untouched
    fn teardown_session(&mut self) {
        self.orbit.stop();
        self.fps = FpsCounter::new();
        self.apply_settings_when_ready = false;
        self.splat_poll_at = None;
        self.pending_filename = None;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
    }

    fn fail_load(&mut self, cause: &SceneError) {
        error!(error = %cause, "scene load failed");
        self.teardown_session();
        self.state = ViewerState {
            error: Some(LOAD_FAILURE_MESSAGE.to_string()),
            ..ViewerState::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::CameraPose;
    use crate::settings::BackgroundColor;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Debug)]
    struct MockScene {
        events: Vec<String>,
        load: LoadStatus,
        splat_count: Option<u64>,
        gpu_bytes: Option<u64>,
        camera: CameraPose,
        dispose_calls: u32,
        start_calls: u32,
    }

    impl Default for MockScene {
        fn default() -> Self {
            Self {
                events: Vec::new(),
                load: LoadStatus::Streaming(0.0),
                splat_count: None,
                gpu_bytes: None,
                camera: CameraPose::default(),
                dispose_calls: 0,
                start_calls: 0,
            }
        }
    }

    struct MockRenderer(Rc<RefCell<MockScene>>);

    impl SplatRenderer for MockRenderer {
        fn begin_scene(&mut self, request: &SceneRequest) -> Result<(), SceneError> {
            let name = request.source.display_name();
            self.0.borrow_mut().events.push(format!("begin:{name}"));
            Ok(())
        }

        fn poll_load(&mut self) -> LoadStatus {
            self.0.borrow().load.clone()
        }

        fn start(&mut self) {
            self.0.borrow_mut().start_calls += 1;
        }

        fn dispose(&mut self) {
            self.0.borrow_mut().dispose_calls += 1;
        }

        fn set_clear_color(&mut self, rgb: u32) {
            self.0.borrow_mut().events.push(format!("clear:{rgb:06x}"));
        }

        fn set_point_cloud_mode(&mut self, enabled: bool) {
            self.0.borrow_mut().events.push(format!("points:{enabled}"));
        }

        fn set_splat_scale(&mut self, scale: f32) {
            self.0.borrow_mut().events.push(format!("scale:{scale}"));
        }

        fn splat_count(&self) -> Option<u64> {
            self.0.borrow().splat_count
        }

        fn camera_pose(&self) -> CameraPose {
            self.0.borrow().camera
        }

        fn set_camera_pose(&mut self, pose: CameraPose) {
            self.0.borrow_mut().camera = pose;
        }

        fn reset_camera(&mut self) {
            let mut scene = self.0.borrow_mut();
            scene.camera = CameraPose::default();
            scene.events.push("reset_camera".to_string());
        }

        fn gpu_memory_bytes(&self) -> Option<u64> {
            self.0.borrow().gpu_bytes
        }
    }

    #[derive(Default)]
    struct MockFactory {
        scenes: Rc<RefCell<Vec<Rc<RefCell<MockScene>>>>>,
        fail_next: Rc<RefCell<bool>>,
    }

    impl RendererFactory for MockFactory {
        type Renderer = MockRenderer;

        fn create(&mut self, _options: &RendererOptions) -> Result<MockRenderer, SceneError> {
            if *self.fail_next.borrow() {
                *self.fail_next.borrow_mut() = false;
                return Err(SceneError::SurfaceUnavailable);
            }
            let scene = Rc::new(RefCell::new(MockScene::default()));
            self.scenes.borrow_mut().push(scene.clone());
            Ok(MockRenderer(scene))
        }
    }

    struct NullProbe;

    impl MemoryProbe for NullProbe {
        fn sample(&mut self) -> Option<u64> {
            None
        }
    }

    struct FixedProbe(u64);

    impl MemoryProbe for FixedProbe {
        fn sample(&mut self) -> Option<u64> {
            Some(self.0)
        }
    }

    type Scenes = Rc<RefCell<Vec<Rc<RefCell<MockScene>>>>>;

    fn manager() -> (ViewerManager<MockFactory>, Scenes, Rc<RefCell<bool>>) {
        let factory = MockFactory::default();
        let scenes = factory.scenes.clone();
        let fail_next = factory.fail_next.clone();
        let manager = ViewerManager::with_memory_probe(factory, Box::new(NullProbe));
        (manager, scenes, fail_next)
    }

    fn load_and_activate(
        manager: &mut ViewerManager<MockFactory>,
        scenes: &Scenes,
    ) -> Rc<RefCell<MockScene>> {
        manager.load_scene(SceneSource::File(PathBuf::from("/tmp/garden.ply")));
        let scene = scenes.borrow().last().expect("renderer created").clone();
        scene.borrow_mut().load = LoadStatus::Ready;
        manager.tick(Duration::ZERO);
        assert!(manager.state().is_viewer_active);
        scene
    }

    #[test]
    fn test_load_success_transitions_to_active() {
        let (mut manager, scenes, _) = manager();
        manager.load_scene(SceneSource::File(PathBuf::from("/tmp/garden.ply")));
        assert!(manager.state().is_loading);
        assert!(!manager.state().is_viewer_active);
        assert_eq!(manager.state().progress, 0);

        let scene = scenes.borrow()[0].clone();
        scene.borrow_mut().load = LoadStatus::Streaming(0.42);
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.state().progress, 42);

        scene.borrow_mut().load = LoadStatus::Ready;
        manager.tick(Duration::from_millis(32));
        let state = manager.state();
        assert!(state.is_viewer_active);
        assert!(!state.is_loading);
        assert_eq!(state.progress, 100);
        assert_eq!(state.filename, "garden.ply");
        assert_eq!(scene.borrow().start_calls, 1);
    }

    #[test]
    fn test_progress_is_monotonic_within_one_load() {
        let (mut manager, scenes, _) = manager();
        manager.load_scene(SceneSource::File(PathBuf::from("a.ply")));
        let scene = scenes.borrow()[0].clone();
        scene.borrow_mut().load = LoadStatus::Streaming(0.5);
        manager.tick(Duration::ZERO);
        assert_eq!(manager.state().progress, 50);
        scene.borrow_mut().load = LoadStatus::Streaming(0.3);
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.state().progress, 50);
    }

    #[test]
    fn test_failed_load_collapses_to_fixed_message() {
        let (mut manager, scenes, _) = manager();
        manager.load_scene(SceneSource::File(PathBuf::from("bad.splat")));
        let scene = scenes.borrow()[0].clone();
        scene.borrow_mut().load = LoadStatus::Failed("decode error at byte 12".to_string());
        manager.tick(Duration::ZERO);

        let state = manager.state();
        assert!(!state.is_loading);
        assert!(!state.is_viewer_active);
        assert_eq!(state.error.as_deref(), Some(LOAD_FAILURE_MESSAGE));
        assert_eq!(scene.borrow().dispose_calls, 1);
    }

    #[test]
    fn test_factory_failure_reports_the_fixed_message() {
        let (mut manager, _, fail_next) = manager();
        *fail_next.borrow_mut() = true;
        manager.load_scene(SceneSource::File(PathBuf::from("a.ply")));
        assert_eq!(manager.state().error.as_deref(), Some(LOAD_FAILURE_MESSAGE));
        assert!(!manager.state().is_loading);
    }

    #[test]
    fn test_successful_load_clears_previous_error() {
        let (mut manager, scenes, _) = manager();
        manager.load_scene(SceneSource::File(PathBuf::from("bad.splat")));
        scenes.borrow()[0].borrow_mut().load = LoadStatus::Failed("boom".to_string());
        manager.tick(Duration::ZERO);
        assert!(manager.state().error.is_some());

        let scene = load_and_activate(&mut manager, &scenes);
        assert!(manager.state().error.is_none());
        assert_eq!(scene.borrow().start_calls, 1);
    }

    #[test]
    fn test_concurrent_load_is_rejected() {
        let (mut manager, scenes, _) = manager();
        manager.load_scene(SceneSource::File(PathBuf::from("first.ply")));
        manager.load_scene(SceneSource::File(PathBuf::from("second.ply")));
        assert_eq!(scenes.borrow().len(), 1);

        scenes.borrow()[0].borrow_mut().load = LoadStatus::Ready;
        manager.tick(Duration::ZERO);
        assert_eq!(manager.state().filename, "first.ply");
    }

    #[test]
    fn test_new_load_disposes_previous_renderer_first() {
        let (mut manager, scenes, _) = manager();
        let first = load_and_activate(&mut manager, &scenes);
        manager.load_scene(SceneSource::Url(
            "https://example.com/scenes/statue.ksplat".to_string(),
        ));
        assert_eq!(first.borrow().dispose_calls, 1);
        assert_eq!(scenes.borrow().len(), 2);
        assert!(manager.state().is_loading);
    }

    #[test]
    fn test_reset_viewer_is_idempotent() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        manager.reset_viewer();
        assert_eq!(*manager.state(), ViewerState::default());
        assert_eq!(scene.borrow().dispose_calls, 1);
        manager.reset_viewer();
        assert_eq!(*manager.state(), ViewerState::default());
        assert_eq!(scene.borrow().dispose_calls, 1);
    }

    #[test]
    fn test_dispose_does_not_double_free() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        manager.dispose();
        manager.dispose();
        assert_eq!(scene.borrow().dispose_calls, 1);
    }

    #[test]
    fn test_splat_count_polls_until_positive_then_stops() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        scene.borrow_mut().splat_count = Some(0);

        // First two polls see an empty count and re-arm.
        manager.tick(Duration::from_millis(500));
        manager.tick(Duration::from_millis(1000));
        assert_eq!(manager.state().splat_count, "-");

        scene.borrow_mut().splat_count = Some(12_345);
        manager.tick(Duration::from_millis(1500));
        assert_eq!(manager.state().splat_count, "12,345");

        // Polling stopped: later count changes are not picked up.
        scene.borrow_mut().splat_count = Some(99);
        manager.tick(Duration::from_millis(2000));
        assert_eq!(manager.state().splat_count, "12,345");
    }

    #[test]
    fn test_settings_application_waits_for_mesh() {
        let (mut manager, scenes, _) = manager();
        manager.update_settings(SettingsUpdate {
            background_color: Some(BackgroundColor::White),
            point_cloud_mode: Some(true),
            point_size: Some(2.0),
            ..Default::default()
        });

        let scene = load_and_activate(&mut manager, &scenes);
        manager.tick(Duration::from_millis(16));
        assert!(scene.borrow().events.iter().all(|e| !e.starts_with("clear")));

        scene.borrow_mut().splat_count = Some(0);
        manager.tick(Duration::from_millis(32));
        let events = scene.borrow().events.clone();
        assert!(events.contains(&"clear:ffffff".to_string()));
        assert!(events.contains(&"points:true".to_string()));
        assert!(events.contains(&"scale:2".to_string()));
    }

    #[test]
    fn test_update_settings_pushes_only_changed_fields() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        scene.borrow_mut().events.clear();

        manager.update_settings(SettingsUpdate {
            point_size: Some(1.5),
            ..Default::default()
        });
        let events = scene.borrow().events.clone();
        assert_eq!(events, vec!["scale:1.5".to_string()]);
    }

    #[test]
    fn test_settings_persist_without_a_renderer() {
        let (mut manager, _, _) = manager();
        manager.update_settings(SettingsUpdate {
            point_size: Some(2.5),
            ..Default::default()
        });
        assert_eq!(manager.settings().point_size, 2.5);
        assert_eq!(*manager.state(), ViewerState::default());
    }

    #[test]
    fn test_auto_rotate_drives_the_camera() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        manager.update_settings(SettingsUpdate {
            auto_rotate: Some(true),
            ..Default::default()
        });

        let before = scene.borrow().camera;
        manager.tick(Duration::from_millis(16));
        let after = scene.borrow().camera;
        assert_ne!(before.position, after.position);
        assert_eq!(after.target, before.target);

        manager.update_settings(SettingsUpdate {
            auto_rotate: Some(false),
            ..Default::default()
        });
        let stopped = scene.borrow().camera;
        manager.tick(Duration::from_millis(32));
        assert_eq!(scene.borrow().camera.position, stopped.position);
    }

    #[test]
    fn test_reset_camera_zeroes_the_orbit_angle() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        manager.update_settings(SettingsUpdate {
            auto_rotate: Some(true),
            ..Default::default()
        });
        manager.tick(Duration::from_millis(16));
        manager.reset_camera();
        assert!(scene
            .borrow()
            .events
            .contains(&"reset_camera".to_string()));
        // The next frame orbits from angle zero again.
        manager.tick(Duration::from_millis(32));
        let pose = scene.borrow().camera;
        let expected = 5.0 * (crate::orbit::RADIANS_PER_FRAME).sin();
        assert!((pose.position.x - expected).abs() < 1e-4);
    }

    #[test]
    fn test_reset_camera_without_renderer_is_a_noop() {
        let (mut manager, _, _) = manager();
        manager.reset_camera();
        assert_eq!(*manager.state(), ViewerState::default());
    }

    #[test]
    fn test_telemetry_prefers_gpu_memory() {
        let (mut manager, scenes, _) = manager();
        let scene = load_and_activate(&mut manager, &scenes);
        scene.borrow_mut().gpu_bytes = Some(2048);

        for frame in 1..=70 {
            manager.tick(Duration::from_millis(frame * 16));
        }
        assert!(manager.state().fps > 0);
        assert_eq!(manager.state().memory_usage, "2.0 KB");
    }

    #[test]
    fn test_telemetry_falls_back_to_heap_probe() {
        let factory = MockFactory::default();
        let scenes = factory.scenes.clone();
        let mut manager = ViewerManager::with_memory_probe(factory, Box::new(FixedProbe(1536)));
        load_and_activate(&mut manager, &scenes);

        for frame in 1..=70 {
            manager.tick(Duration::from_millis(frame * 16));
        }
        assert_eq!(manager.state().memory_usage, "1.5 KB");
    }

    #[test]
    fn test_telemetry_reports_unavailable_without_probes() {
        let (mut manager, scenes, _) = manager();
        load_and_activate(&mut manager, &scenes);
        for frame in 1..=70 {
            manager.tick(Duration::from_millis(frame * 16));
        }
        assert!(manager.state().fps > 0);
        assert_eq!(manager.state().memory_usage, "N/A");
    }
}
