use std::f32::consts::PI;
use three_d::prelude::*;
use three_d::{vec3, Event, MouseButton, Vec3};

use crate::config::{to_vec3, CameraConfig, ControlsConfig};
use crate::utils::{are_floats_equal, is_float_zero};


const EPS: f32 = 0.000001;


/// Where the camera is, what it looks at, and its projection parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}
impl CameraPose {
    pub fn new(config: &CameraConfig, target: Vec3, aspect: f32) -> Self {
        Self {
            position: to_vec3(config.position),
            target,
            up: vec3(0.0, 1.0, 0.0),
            fov: config.fov,
            near: config.near,
            far: config.far,
            aspect,
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn forward(&self) -> Vec3 {
        let d = self.target - self.position;
        if d.magnitude2() < EPS * EPS {
            vec3(0.0, 0.0, -1.0)
        } else {
            d.normalize()
        }
    }

    /// Camera-space x and y axes in world space
    pub fn screen_axes(&self) -> (Vec3, Vec3) {
        let forward = self.forward();
        let mut right = forward.cross(self.up);
        if right.magnitude2() < EPS * EPS {
            right = vec3(1.0, 0.0, 0.0);
        }
        let right = right.normalize();
        (right, right.cross(forward))
    }
}


/// Re-implementation of three_d::OrbitControl with damped (inertial) motion.
///
/// Input accumulates into pending rotation, pan and zoom; [OrbitControls::update]
/// applies a `damping_factor` share of it each frame and keeps the rest.
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
    last_position: Option<Vec3>,
    last_target: Vec3,
}
impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        let target = to_vec3(config.target);
        Self {
            target,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance.unwrap_or(f32::INFINITY),
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: vec3(0.0, 0.0, 0.0),
            last_position: None,
            last_target: target,
        }
    }

    /// Moves the orbit center without animating towards it
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.pan_offset = vec3(0.0, 0.0, 0.0);
    }

    /// Pending motion that damping has not applied yet
    pub fn is_settled(&self) -> bool {
        is_float_zero(self.theta_delta, EPS)
            && is_float_zero(self.phi_delta, EPS)
            && is_float_zero(self.pan_offset.magnitude(), EPS)
            && are_floats_equal(self.scale, 1.0, EPS)
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.theta_delta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.phi_delta -= angle;
    }

    /// Moves closer for factors below one
    pub fn dolly(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    /// Pans by a screen-space pixel delta
    pub fn pan(&mut self, dx: f32, dy: f32, pose: &CameraPose, viewport_height: u32) {
        let distance = (pose.position - self.target).magnitude() * (pose.fov.to_radians() * 0.5).tan();
        let height = viewport_height.max(1) as f32;
        let (right, up) = pose.screen_axes();
        self.pan_offset += right * (-2.0 * dx * distance / height * self.pan_speed);
        self.pan_offset += up * (2.0 * dy * distance / height * self.pan_speed);
    }

    fn zoom_scale(&self) -> f32 {
        0.95_f32.powf(self.zoom_speed)
    }

    /// Left drag orbits, right drag pans, middle drag and wheel zoom.
    /// Returns true if any event was consumed.
    pub fn handle_events(&mut self, events: &mut [Event], pose: &CameraPose, viewport_height: u32) -> bool {
        let height = viewport_height.max(1) as f32;
        let mut consumed = false;
        for event in events.iter_mut() {
            match event {
                Event::MouseMotion {
                    button: Some(button),
                    delta,
                    handled,
                    ..
                } if !*handled => {
                    match button {
                        MouseButton::Left => {
                            self.rotate_left(2.0 * PI * delta.0 / height * self.rotate_speed);
                            self.rotate_up(2.0 * PI * delta.1 / height * self.rotate_speed);
                        }
                        MouseButton::Right => self.pan(delta.0, delta.1, pose, viewport_height),
                        MouseButton::Middle => {
                            if delta.1 > 0.0 {
                                self.dolly(1.0 / self.zoom_scale());
                            } else if delta.1 < 0.0 {
                                self.dolly(self.zoom_scale());
                            }
                        }
                    }
                    *handled = true;
                    consumed = true;
                }
                Event::MouseWheel { delta, handled, .. } if !*handled => {
                    if delta.1 > 0.0 {
                        self.dolly(self.zoom_scale());
                    } else if delta.1 < 0.0 {
                        self.dolly(1.0 / self.zoom_scale());
                    }
                    *handled = true;
                    consumed = true;
                }
                _ => {}
            }
        }
        consumed
    }

    /// Moves the camera on its orbit. Must be called each frame.
    /// Returns true if the camera moved.
    pub fn update(&mut self, pose: &mut CameraPose) -> bool {
        let offset = pose.position - self.target;
        let mut radius = offset.magnitude();
        let (mut theta, mut phi) = if radius < EPS {
            (0.0, 0.0)
        } else {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        };

        let share = if self.enable_damping { self.damping_factor } else { 1.0 };
        theta += self.theta_delta * share;
        phi += self.phi_delta * share;
        phi = phi.clamp(EPS, PI - EPS);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * share;

        let sin_phi_radius = phi.sin() * radius;
        let offset = vec3(sin_phi_radius * theta.sin(), phi.cos() * radius, sin_phi_radius * theta.cos());
        pose.position = self.target + offset;
        pose.target = self.target;

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = vec3(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        let moved = match self.last_position {
            Some(last) => {
                (last - pose.position).magnitude2() > EPS || (self.last_target - self.target).magnitude2() > EPS
            }
            None => true,
        };
        self.last_position = Some(pose.position);
        self.last_target = self.target;
        moved
    }
}
