//! Splatview Core - Viewer orchestration around an external splat renderer
//!
//! This crate provides the engine-free core of the splatview viewer:
//! - Display settings model with immutable partial updates
//! - Scene format inference from filenames and URLs
//! - The viewer lifecycle manager that sequences loading, teardown, and
//!   live settings application against a renderer handle
//! - Frame-rate and memory telemetry sampling
//! - The auto-rotate camera driver
//!
//! The renderer itself (splat decoding, GPU upload, rasterization) is an
//! external collaborator behind the [`renderer::SplatRenderer`] trait; the
//! `splatview-app` crate supplies the engine-backed implementation.

pub mod format;
pub mod orbit;
pub mod renderer;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod viewer;

pub use format::SceneFormat;
pub use orbit::AutoRotateDriver;
pub use renderer::{
    CameraPose, LoadStatus, RendererFactory, RendererOptions, SceneError, SceneRequest,
    SceneSource, SplatRenderer,
};
pub use settings::{BackgroundColor, SettingsUpdate, ViewerSettings};
pub use state::{ViewerPhase, ViewerState};
pub use telemetry::{format_bytes, FpsCounter, HeapProbe, MemoryProbe};
pub use viewer::{ViewerManager, LOAD_FAILURE_MESSAGE};
