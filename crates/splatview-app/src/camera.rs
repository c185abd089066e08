//! Orbit camera controls
//!
//! Y-up orbit rig around the scene's look-at target: left-drag orbits,
//! right-drag pans, scroll zooms. While the auto-rotate driver is active
//! its per-frame pose overrides the rig, and the rig is re-synced from it
//! so stopping rotation causes no jump.

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use bevy_gaussian_splatting::GaussianCamera;

use crate::render::{
    pose_from_engine, pose_to_engine, publish_camera_pose, take_camera_intents, RenderBridgeSlot,
    SurfaceReady,
};

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Orbit rig state around the look-at target
#[derive(Debug, Clone, Resource)]
pub struct CameraRig {
    pub distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.0,
            target: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
        }
    }
}

impl CameraRig {
    /// Camera position for the current rig parameters
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Re-derive the rig parameters from an explicit camera placement
    pub fn sync_from(&mut self, position: Vec3, target: Vec3) {
        let offset = position - target;
        self.target = target;
        self.distance = offset.length().max(0.05);
        self.azimuth = offset.x.atan2(offset.z);
        self.elevation = (offset.y / self.distance).clamp(-1.0, 1.0).asin();
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraRig>()
            .add_systems(Startup, setup_camera)
            .add_systems(Update, (update_camera, apply_camera_intents).chain());
    }
}

fn setup_camera(mut commands: Commands, surface_ready: Res<SurfaceReady>) {
    commands.spawn((
        Camera3d::default(),
        Msaa::Sample4,
        Transform::from_xyz(0.0, 0.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
        // The splat renderer only draws through cameras carrying its marker.
        GaussianCamera::default(),
        MainCamera,
    ));
    // The display surface now exists; renderer handles may be created.
    surface_ready.0.store(true, std::sync::atomic::Ordering::Release);
}

/// Mouse orbit / pan / zoom, skipped while the UI wants the pointer
fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut rig: ResMut<CameraRig>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut mouse_wheel: EventReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut contexts: bevy_egui::EguiContexts,
) {
    let egui_wants_pointer = contexts.ctx_mut().unwrap().wants_pointer_input();

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer {
        rig.azimuth -= total_motion.x * rig.sensitivity;
        rig.elevation =
            (rig.elevation + total_motion.y * rig.sensitivity).clamp(-1.5, 1.5);
    }

    // Pan in the camera's screen plane with right drag.
    if mouse_button.pressed(MouseButton::Right) && !egui_wants_pointer {
        let right = Vec3::new(rig.azimuth.cos(), 0.0, -rig.azimuth.sin());
        let up = Vec3::Y;
        let pan_speed = rig.distance * 0.002;
        let pan = right * -total_motion.x * pan_speed + up * total_motion.y * pan_speed;
        rig.target += pan;
    }

    if !egui_wants_pointer {
        for scroll in mouse_wheel.read() {
            let zoom_factor = 1.0 - scroll.y * rig.zoom_speed * 0.3;
            rig.distance = (rig.distance * zoom_factor).clamp(0.1, 100.0);
        }
    } else {
        for _ in mouse_wheel.read() {}
    }

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = rig.position();
        transform.look_at(rig.target, Vec3::Y);
    }
}

/// Apply manager-side camera intents (auto-rotate poses, resets) after the
/// manual controls, then publish the final pose back to the bridge
fn apply_camera_intents(
    slot: Res<RenderBridgeSlot>,
    mut rig: ResMut<CameraRig>,
    mut camera_query: Query<(&mut Transform, &mut Msaa), With<MainCamera>>,
) {
    let Ok((mut transform, mut msaa)) = camera_query.single_mut() else {
        return;
    };
    let Some(intents) = take_camera_intents(&slot) else {
        return;
    };

    let desired_msaa = if intents.antialiased {
        Msaa::Sample4
    } else {
        Msaa::Off
    };
    if *msaa != desired_msaa {
        *msaa = desired_msaa;
    }

    if intents.reset {
        let (position, target, up) = pose_to_engine(&intents.initial);
        rig.sync_from(position, target);
        transform.translation = position;
        transform.look_at(target, up);
    }

    if let Some(pose) = intents.override_pose {
        let (position, target, up) = pose_to_engine(&pose);
        rig.sync_from(position, target);
        transform.translation = position;
        transform.look_at(target, up);
    }

    publish_camera_pose(
        &slot,
        pose_from_engine(transform.translation, rig.target, Vec3::Y),
    );
}
