//! Engine-backed renderer handle
//!
//! Implements the core's `SplatRenderer` contract on top of the bevy ECS
//! and the `bevy_gaussian_splatting` renderer. The handle held by the
//! lifecycle manager and the engine systems live on opposite sides of the
//! frame loop, so they share one `EngineBridge` cell: the handle enqueues
//! intents and reads back load state, splat counts, and the camera pose,
//! while the systems below apply the intents to the scene entities.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy_gaussian_splatting::{
    CloudSettings, GaussianSplattingPlugin, Planar, PlanarGaussian3d, PlanarGaussian3dHandle,
};
use splatview_core::settings::BACKGROUND_BLACK;
use splatview_core::{
    CameraPose, LoadStatus, RendererFactory, RendererOptions, SceneError, SceneRequest,
    SceneSource, SplatRenderer,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Estimated GPU footprint of one uploaded splat (position, covariance,
/// color, and opacity in the packed planar layout)
const GPU_BYTES_PER_SPLAT: u64 = 64;

/// Share of the progress bar covered by the remote download; the remaining
/// share is the engine decode, which reports no fraction of its own
const FETCH_PROGRESS_SHARE: f32 = 0.9;

/// Footprint multiplier that collapses splats to point-like discs; the
/// engine has no dedicated point primitive
const POINT_MODE_FOOTPRINT: f32 = 0.05;

/// Mesh-level tuning mirrored into the cloud entity every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudTuning {
    pub splat_scale: f32,
    pub point_cloud_mode: bool,
}

impl Default for CloudTuning {
    fn default() -> Self {
        Self {
            splat_scale: 1.0,
            point_cloud_mode: false,
        }
    }
}

/// Streaming state of the current scene, engine side
#[derive(Debug, Clone, PartialEq)]
enum LoadPhase {
    /// Remote download in flight, fraction in [0, 1]
    Fetching(f32),
    /// The engine is decoding and uploading the scene
    Decoding,
    Ready,
    Failed(String),
}

/// Scene waiting to be spawned by [`spawn_pending_scenes`]
#[derive(Debug)]
struct PendingScene {
    path: PathBuf,
}

/// Shared cell between the renderer handle and the engine systems.
///
/// One bridge exists per renderer handle; disposing the handle marks the
/// bridge and the systems tear the scene down on the next frame.
pub struct EngineBridge {
    options: RendererOptions,
    phase: LoadPhase,
    pending_scene: Option<PendingScene>,
    scene_scale: [f32; 3],
    reveal: bool,
    clear_color: u32,
    tuning: CloudTuning,
    splat_count: Option<u64>,
    camera: CameraPose,
    camera_override: Option<CameraPose>,
    reset_camera: bool,
    /// Staged download for remote scenes; at most one per handle, deleted
    /// when the bridge is dropped
    spool: Option<NamedTempFile>,
    disposed: bool,
}

impl EngineBridge {
    fn new(options: &RendererOptions) -> Self {
        Self {
            options: *options,
            phase: LoadPhase::Decoding,
            pending_scene: None,
            scene_scale: [1.0, 1.0, 1.0],
            reveal: false,
            clear_color: BACKGROUND_BLACK,
            tuning: CloudTuning::default(),
            splat_count: None,
            camera: options.camera,
            camera_override: None,
            reset_camera: false,
            spool: None,
            disposed: false,
        }
    }
}

/// The slot the engine systems look at to find the live bridge, if any
pub type BridgeSlot = Arc<Mutex<Option<Arc<Mutex<EngineBridge>>>>>;

/// Set once the camera is spawned; renderer handles cannot be created
/// before the display surface exists
#[derive(Resource, Clone)]
pub struct SurfaceReady(pub Arc<AtomicBool>);

/// Resource wrapper so systems can reach the slot
#[derive(Resource, Clone)]
pub struct RenderBridgeSlot(pub BridgeSlot);

/// Renderer handle owned by the lifecycle manager
pub struct EngineRenderer {
    bridge: Arc<Mutex<EngineBridge>>,
}

impl SplatRenderer for EngineRenderer {
    fn begin_scene(&mut self, request: &SceneRequest) -> Result<(), SceneError> {
        let mut bridge = self.bridge.lock().unwrap();
        bridge.scene_scale = request.scale;
        match &request.source {
            SceneSource::File(path) => {
                std::fs::metadata(path)
                    .map_err(|e| SceneError::Source(format!("{}: {e}", path.display())))?;
                bridge.pending_scene = Some(PendingScene { path: path.clone() });
                bridge.phase = LoadPhase::Decoding;
            }
            SceneSource::Url(url) => {
                bridge.phase = LoadPhase::Fetching(0.0);
                drop(bridge);
                spawn_fetch_worker(
                    self.bridge.clone(),
                    url.clone(),
                    request.format.extension(),
                );
            }
        }
        Ok(())
    }

    fn poll_load(&mut self) -> LoadStatus {
        let bridge = self.bridge.lock().unwrap();
        match &bridge.phase {
            LoadPhase::Fetching(fraction) => LoadStatus::Streaming(fraction * FETCH_PROGRESS_SHARE),
            LoadPhase::Decoding => LoadStatus::Streaming(FETCH_PROGRESS_SHARE),
            LoadPhase::Ready => LoadStatus::Ready,
            LoadPhase::Failed(cause) => LoadStatus::Failed(cause.clone()),
        }
    }

    fn start(&mut self) {
        self.bridge.lock().unwrap().reveal = true;
    }

    fn dispose(&mut self) {
        self.bridge.lock().unwrap().disposed = true;
    }

    fn set_clear_color(&mut self, rgb: u32) {
        self.bridge.lock().unwrap().clear_color = rgb;
    }

    fn set_point_cloud_mode(&mut self, enabled: bool) {
        self.bridge.lock().unwrap().tuning.point_cloud_mode = enabled;
    }

    fn set_splat_scale(&mut self, scale: f32) {
        self.bridge.lock().unwrap().tuning.splat_scale = scale;
    }

    fn splat_count(&self) -> Option<u64> {
        self.bridge.lock().unwrap().splat_count
    }

    fn camera_pose(&self) -> CameraPose {
        self.bridge.lock().unwrap().camera
    }

    fn set_camera_pose(&mut self, pose: CameraPose) {
        self.bridge.lock().unwrap().camera_override = Some(pose);
    }

    fn reset_camera(&mut self) {
        self.bridge.lock().unwrap().reset_camera = true;
    }

    fn gpu_memory_bytes(&self) -> Option<u64> {
        self.bridge
            .lock()
            .unwrap()
            .splat_count
            .map(|count| count * GPU_BYTES_PER_SPLAT)
    }
}

/// Creates [`EngineRenderer`] handles and publishes their bridge in the
/// slot the engine systems watch
pub struct EngineRendererFactory {
    slot: BridgeSlot,
    surface_ready: Arc<AtomicBool>,
}

impl EngineRendererFactory {
    pub fn new(slot: BridgeSlot, surface_ready: Arc<AtomicBool>) -> Self {
        Self {
            slot,
            surface_ready,
        }
    }
}

impl RendererFactory for EngineRendererFactory {
    type Renderer = EngineRenderer;

    fn create(&mut self, options: &RendererOptions) -> Result<EngineRenderer, SceneError> {
        if !self.surface_ready.load(Ordering::Acquire) {
            return Err(SceneError::SurfaceUnavailable);
        }
        let bridge = Arc::new(Mutex::new(EngineBridge::new(options)));
        *self.slot.lock().unwrap() = Some(bridge.clone());
        debug!("renderer handle created");
        Ok(EngineRenderer { bridge })
    }
}

/// Stream a remote scene into a staged temp file, reporting byte-level
/// progress against Content-Length. The worker abandons the download as
/// soon as the bridge is disposed.
fn spawn_fetch_worker(bridge: Arc<Mutex<EngineBridge>>, url: String, extension: &'static str) {
    let worker_bridge = bridge.clone();
    let result = std::thread::Builder::new()
        .name("splatview-fetch".to_string())
        .spawn(move || {
            info!(url = %url, "fetching remote scene");
            match fetch_to_spool(&worker_bridge, &url, extension) {
                Ok(()) => {}
                Err(cause) => {
                    let mut guard = worker_bridge.lock().unwrap();
                    if !guard.disposed {
                        guard.phase = LoadPhase::Failed(cause.to_string());
                    }
                }
            }
        });
    if let Err(e) = result {
        warn!(error = %e, "failed to spawn fetch worker");
        bridge.lock().unwrap().phase = LoadPhase::Failed(e.to_string());
    }
}

fn fetch_to_spool(
    bridge: &Arc<Mutex<EngineBridge>>,
    url: &str,
    extension: &str,
) -> Result<(), SceneError> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| SceneError::Stream(e.to_string()))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| SceneError::Stream(e.to_string()))?;
    let total = response.content_length().filter(|total| *total > 0);

    // The spool keeps the scene's extension so the engine picks the right
    // decoder, and deletes itself when the bridge drops it.
    let mut spool = tempfile::Builder::new()
        .prefix("splatview-")
        .suffix(&format!(".{extension}"))
        .tempfile()?;

    let mut buffer = [0u8; 64 * 1024];
    let mut received: u64 = 0;
    loop {
        if bridge.lock().unwrap().disposed {
            debug!(url = %url, "download abandoned, handle disposed");
            return Ok(());
        }
        let read = response
            .read(&mut buffer)
            .map_err(|e| SceneError::Stream(e.to_string()))?;
        if read == 0 {
            break;
        }
        spool.write_all(&buffer[..read])?;
        received += read as u64;
        if let Some(total) = total {
            let fraction = (received as f32 / total as f32).min(1.0);
            bridge.lock().unwrap().phase = LoadPhase::Fetching(fraction);
        }
    }
    spool.flush()?;

    let path = spool.path().to_path_buf();
    let mut guard = bridge.lock().unwrap();
    if guard.disposed {
        return Ok(());
    }
    info!(bytes = received, "remote scene staged");
    guard.pending_scene = Some(PendingScene { path });
    guard.spool = Some(spool);
    guard.phase = LoadPhase::Decoding;
    Ok(())
}

/// Marker for the live splat cloud entity
#[derive(Component)]
pub struct SplatScene;

/// The cloud entity and asset handle currently on screen, plus the bridge
/// that owns them; the owner outliving the slot is what lets teardown find
/// scenes whose handle was already replaced
#[derive(Resource, Default)]
pub struct ActiveScene {
    entity: Option<Entity>,
    handle: Option<Handle<PlanarGaussian3d>>,
    owner: Option<Arc<Mutex<EngineBridge>>>,
}

/// Engine-side half of the renderer adapter
pub struct SplatScenePlugin;

impl Plugin for SplatScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(GaussianSplattingPlugin)
            .init_resource::<ActiveScene>()
            .add_systems(
                Update,
                (
                    spawn_pending_scenes,
                    track_load_state,
                    sync_cloud_settings,
                    sync_clear_color,
                    cleanup_disposed,
                )
                    .chain(),
            );
    }
}

fn live_bridge(slot: &RenderBridgeSlot) -> Option<Arc<Mutex<EngineBridge>>> {
    slot.0.lock().unwrap().clone()
}

/// Spawn the cloud entity once a staged scene path is available
fn spawn_pending_scenes(
    slot: Res<RenderBridgeSlot>,
    mut active: ResMut<ActiveScene>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
) {
    let Some(bridge) = live_bridge(&slot) else {
        return;
    };
    let (pending, scene_scale) = {
        let mut guard = bridge.lock().unwrap();
        if guard.disposed {
            return;
        }
        (guard.pending_scene.take(), guard.scene_scale)
    };
    let Some(pending) = pending else {
        return;
    };

    if let Some(previous) = active.entity.take() {
        commands.entity(previous).despawn();
    }

    info!(path = %pending.path.display(), "streaming scene into the renderer");
    let handle: Handle<PlanarGaussian3d> = asset_server.load(pending.path);
    let entity = commands
        .spawn((
            PlanarGaussian3dHandle(handle.clone()),
            CloudSettings::default(),
            Transform::from_scale(Vec3::from_array(scene_scale)),
            Visibility::Hidden,
            SplatScene,
        ))
        .id();
    active.entity = Some(entity);
    active.handle = Some(handle);
    active.owner = Some(bridge);
}

/// Publish decode completion, failure, and the splat count
fn track_load_state(
    slot: Res<RenderBridgeSlot>,
    active: Res<ActiveScene>,
    asset_server: Res<AssetServer>,
    clouds: Res<Assets<PlanarGaussian3d>>,
) {
    let Some(bridge) = live_bridge(&slot) else {
        return;
    };
    let Some(handle) = active.handle.as_ref() else {
        return;
    };
    // Only the scene spawned for this handle may publish into it.
    let owned = active
        .owner
        .as_ref()
        .map(|owner| Arc::ptr_eq(owner, &bridge))
        .unwrap_or(false);
    if !owned {
        return;
    }
    let mut bridge = bridge.lock().unwrap();
    if bridge.disposed {
        return;
    }

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Failed(cause)) => {
            if !matches!(bridge.phase, LoadPhase::Failed(_)) {
                bridge.phase = LoadPhase::Failed(cause.to_string());
            }
        }
        Some(LoadState::Loaded) => {
            if let Some(cloud) = clouds.get(handle) {
                bridge.splat_count = Some(cloud.len() as u64);
            }
            if bridge.phase == LoadPhase::Decoding {
                bridge.phase = LoadPhase::Ready;
            }
        }
        _ => {}
    }
}

/// Mirror reveal state and mesh tuning into the cloud entity
fn sync_cloud_settings(
    slot: Res<RenderBridgeSlot>,
    active: Res<ActiveScene>,
    mut clouds: Query<(&mut Visibility, &mut CloudSettings), With<SplatScene>>,
) {
    let Some(bridge) = live_bridge(&slot) else {
        return;
    };
    let owned = active
        .owner
        .as_ref()
        .map(|owner| Arc::ptr_eq(owner, &bridge))
        .unwrap_or(false);
    if !owned {
        return;
    }
    let bridge = bridge.lock().unwrap();
    let Some(entity) = active.entity else {
        return;
    };
    let Ok((mut visibility, mut settings)) = clouds.get_mut(entity) else {
        return;
    };

    if bridge.reveal && *visibility != Visibility::Visible {
        *visibility = Visibility::Visible;
    }

    let scale = if bridge.tuning.point_cloud_mode {
        bridge.tuning.splat_scale * POINT_MODE_FOOTPRINT
    } else {
        bridge.tuning.splat_scale
    };
    if settings.global_scale != scale {
        settings.global_scale = scale;
    }
}

/// Keep the window clear color in step with the active background setting
fn sync_clear_color(slot: Res<RenderBridgeSlot>, mut clear_color: ResMut<ClearColor>) {
    let desired = match live_bridge(&slot) {
        Some(bridge) => rgb_to_color(bridge.lock().unwrap().clear_color),
        None => rgb_to_color(BACKGROUND_BLACK),
    };
    if clear_color.0 != desired {
        clear_color.0 = desired;
    }
}

/// Tear down the scene of a disposed handle and drop its bridge (which
/// deletes any staged download)
fn cleanup_disposed(
    slot: Res<RenderBridgeSlot>,
    mut active: ResMut<ActiveScene>,
    mut commands: Commands,
) {
    // The owning bridge is checked directly: by the time a new load has
    // replaced the slot, the old bridge is only reachable from here.
    let owner_disposed = active
        .owner
        .as_ref()
        .map(|bridge| bridge.lock().unwrap().disposed)
        .unwrap_or(false);
    if owner_disposed {
        if let Some(entity) = active.entity.take() {
            commands.entity(entity).despawn();
        }
        active.handle = None;
        active.owner = None;
        debug!("disposed scene cleaned up");
    }

    let mut slot_guard = slot.0.lock().unwrap();
    let slot_disposed = slot_guard
        .as_ref()
        .map(|bridge| bridge.lock().unwrap().disposed)
        .unwrap_or(false);
    if slot_disposed {
        *slot_guard = None;
    }
}

/// Convert a packed 24-bit RGB value to an engine color
pub fn rgb_to_color(rgb: u32) -> Color {
    Color::srgb_u8(
        ((rgb >> 16) & 0xff) as u8,
        ((rgb >> 8) & 0xff) as u8,
        (rgb & 0xff) as u8,
    )
}

/// Camera pose helpers crossing the core/engine math boundary
pub fn pose_to_engine(pose: &CameraPose) -> (Vec3, Vec3, Vec3) {
    (
        Vec3::from_array(pose.position.to_array()),
        Vec3::from_array(pose.target.to_array()),
        Vec3::from_array(pose.up.to_array()),
    )
}

pub fn pose_from_engine(position: Vec3, target: Vec3, up: Vec3) -> CameraPose {
    CameraPose {
        position: glam::Vec3::from_array(position.to_array()),
        target: glam::Vec3::from_array(target.to_array()),
        up: glam::Vec3::from_array(up.to_array()),
    }
}

/// Camera intents left by the lifecycle manager for the camera systems
pub struct CameraIntents {
    /// Pose the auto-rotate driver wants applied this frame
    pub override_pose: Option<CameraPose>,
    pub reset: bool,
    /// Pose restored by a reset, recorded at handle creation
    pub initial: CameraPose,
    pub antialiased: bool,
}

/// Drain the camera intents of the live handle; consumed once per frame by
/// the camera systems
pub fn take_camera_intents(slot: &RenderBridgeSlot) -> Option<CameraIntents> {
    let bridge = live_bridge(slot)?;
    let mut bridge = bridge.lock().unwrap();
    let override_pose = bridge.camera_override.take();
    let reset = bridge.reset_camera;
    bridge.reset_camera = false;
    Some(CameraIntents {
        override_pose,
        reset,
        initial: bridge.options.camera,
        antialiased: bridge.options.antialiased,
    })
}

/// Publish the camera pose the shell is actually using, so the manager
/// and the auto-rotate driver see the live placement
pub fn publish_camera_pose(slot: &RenderBridgeSlot, pose: CameraPose) {
    if let Some(bridge) = live_bridge(slot) {
        bridge.lock().unwrap().camera = pose;
    }
}
