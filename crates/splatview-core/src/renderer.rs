//! The renderer-handle contract consumed by the lifecycle manager
//!
//! The external renderer owns splat decoding, GPU upload, and rasterization.
//! The manager only ever talks to it through [`SplatRenderer`]; the concrete
//! engine adapter lives in the application crate, and tests substitute a
//! mock. At most one handle exists at a time, and a new handle may only be
//! created after the previous one was fully disposed.

use std::path::PathBuf;

use glam::Vec3;
use thiserror::Error;

use crate::format::SceneFormat;

/// Display name used when none can be derived from a URL
pub const FALLBACK_SCENE_NAME: &str = "sample.splat";

/// Load failures surfaced by the factory or the handle
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("display surface is not available")]
    SurfaceUnavailable,
    #[error("unreadable scene source: {0}")]
    Source(String),
    #[error("streaming failed: {0}")]
    Stream(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera placement, expressed as position / look-at target / up vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Fixed construction parameters for a renderer handle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    /// Initial camera, also the pose restored by `reset_camera`
    pub camera: CameraPose,
    pub antialiased: bool,
    /// Spherical-harmonics detail streamed from the scene; 0 keeps only the
    /// base color band
    pub sh_degree: u8,
    /// Reveal the scene as soon as it is on the GPU instead of fading it in
    pub instant_reveal: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            camera: CameraPose::default(),
            antialiased: true,
            sh_degree: 0,
            instant_reveal: true,
        }
    }
}

/// Where a scene comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSource {
    /// A file on the local filesystem (picked or dropped)
    File(PathBuf),
    /// A remote scene streamed over HTTP
    Url(String),
}

impl SceneSource {
    /// The name shown in the info panel.
    ///
    /// Local files use their own file name; URLs use the last path segment
    /// with any query string stripped, falling back to
    /// [`FALLBACK_SCENE_NAME`] when nothing usable remains.
    pub fn display_name(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| FALLBACK_SCENE_NAME.to_string()),
            Self::Url(url) => {
                let segment = url.rsplit('/').next().unwrap_or("");
                let name = segment.split('?').next().unwrap_or("");
                if name.is_empty() {
                    FALLBACK_SCENE_NAME.to_string()
                } else {
                    name.to_string()
                }
            }
        }
    }
}

/// One scene-streaming request handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRequest {
    pub source: SceneSource,
    pub format: SceneFormat,
    /// Per-axis scale applied to the whole scene at load time
    pub scale: [f32; 3],
    /// Stream incrementally with partial renders and progress reporting
    pub progressive_load: bool,
}

/// Streaming state reported by [`SplatRenderer::poll_load`]
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// Still streaming; fraction in [0, 1], non-decreasing
    Streaming(f32),
    /// The scene is on the GPU and the render loop may start
    Ready,
    /// Streaming or decoding failed; the cause is for the log, not the user
    Failed(String),
}

/// Handle to the external renderer bound to the display surface.
///
/// Exclusively owned by the lifecycle manager; no other component may hold
/// one across calls.
pub trait SplatRenderer {
    /// Begin streaming a scene into the renderer
    fn begin_scene(&mut self, request: &SceneRequest) -> Result<(), SceneError>;

    /// Current streaming state; polled once per frame while loading
    fn poll_load(&mut self) -> LoadStatus;

    /// Start the render loop once the scene is ready
    fn start(&mut self);

    /// Release everything the handle created: GPU buffers, staged source
    /// files, frame subscriptions. Must be idempotent.
    fn dispose(&mut self);

    fn set_clear_color(&mut self, rgb: u32);
    fn set_point_cloud_mode(&mut self, enabled: bool);
    fn set_splat_scale(&mut self, scale: f32);

    /// Splat count of the loaded scene. `None` while the scene's mesh
    /// handle is not yet available, `Some(0)` while buffers are still
    /// uploading.
    fn splat_count(&self) -> Option<u64>;

    fn camera_pose(&self) -> CameraPose;
    fn set_camera_pose(&mut self, pose: CameraPose);

    /// Restore the camera to the pose recorded at construction
    fn reset_camera(&mut self);

    /// GPU memory attributed to the scene, if the graphics backend can
    /// estimate it
    fn gpu_memory_bytes(&self) -> Option<u64>;
}

/// Creates renderer handles bound to the display surface
pub trait RendererFactory {
    type Renderer: SplatRenderer;

    /// Construct a fresh handle. Fails when no display surface is mounted.
    fn create(&mut self, options: &RendererOptions) -> Result<Self::Renderer, SceneError>;
}
