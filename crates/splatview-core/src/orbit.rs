//! Auto-rotate camera driver
//!
//! Orbits the camera around the scene's look-at target on a horizontal
//! circle, keeping the height it had when rotation started. The driver is
//! advanced once per rendered frame by the lifecycle manager.

use glam::Vec3;

use crate::renderer::CameraPose;

/// Base angular step per frame, scaled by the speed multiplier
pub const RADIANS_PER_FRAME: f32 = 0.005;

#[derive(Debug, Clone, Default)]
pub struct AutoRotateDriver {
    angle: f32,
    radius: f32,
    height: f32,
    target: Vec3,
    up: Vec3,
    speed: f32,
    running: bool,
}

impl AutoRotateDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin orbiting from the camera's current placement.
    ///
    /// Derives the horizontal orbit radius and fixed height from the
    /// position relative to the target, and the initial angle via
    /// `atan2(dx, dz)`. Calling `start` while already running replaces the
    /// previous orbit parameters; there is never more than one active loop.
    pub fn start(&mut self, pose: CameraPose, speed: f32) {
        let offset = pose.position - pose.target;
        self.radius = (offset.x * offset.x + offset.z * offset.z).sqrt();
        self.height = offset.y;
        self.angle = offset.x.atan2(offset.z);
        self.target = pose.target;
        self.up = pose.up;
        self.speed = speed;
        self.running = true;
    }

    /// Stop advancing. The accumulated angle survives; only an explicit
    /// camera reset clears it.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Zero the angle accumulator (camera reset)
    pub fn reset_angle(&mut self) {
        self.angle = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Advance one frame and return the camera pose for it
    pub fn advance(&mut self) -> CameraPose {
        self.angle += RADIANS_PER_FRAME * self.speed;
        let position = self.target
            + Vec3::new(
                self.radius * self.angle.sin(),
                self.height,
                self.radius * self.angle.cos(),
            );
        CameraPose {
            position,
            target: self.target,
            up: self.up,
        }
    }
}
