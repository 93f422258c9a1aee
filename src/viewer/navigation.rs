use super::tween::{Tween, TweenGroup, TRANSITION_MS};
use super::DEFAULT_CAMERA;
use crate::scene::{NodeId, SceneGraph, Transform};
use glam::{Quat, Vec3};
use std::f32::consts::PI;

/// Zoom in/out step, applied to the camera's distance from the origin.
pub const ZOOM_FACTOR: f32 = 1.2;

const MIN_POLAR: f32 = 1e-6;

/// Orbit/pan/dolly controller around a target point.
///
/// Input only accumulates deltas; [`OrbitControls::update`] applies them to the
/// camera once per frame and re-aims it at the target.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub screen_space_panning: bool,
    pub auto_rotate: bool,
    /// Full turns per minute; negative turns clockwise seen from above.
    pub auto_rotate_speed: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
    saved_target: Vec3,
    saved_position: Vec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enabled: true,
            target: Vec3::ZERO,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            screen_space_panning: true,
            auto_rotate: false,
            auto_rotate_speed: -10.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            saved_target: Vec3::ZERO,
            saved_position: Vec3::ZERO,
        }
    }
}

impl OrbitControls {
    pub fn rotate(&mut self, left: f32, up: f32) {
        if self.enabled {
            self.theta_delta -= left;
            self.phi_delta -= up;
        }
    }

    /// `factor > 1` moves the camera towards the target.
    pub fn dolly(&mut self, factor: f32) {
        if self.enabled && factor > 0.0 {
            self.scale /= factor;
        }
    }

    /// Moves the target (and camera) by `right`/`up` along the camera's screen axes.
    pub fn pan(&mut self, camera: &Transform, right: f32, up: f32) {
        if !self.enabled {
            return;
        }
        let right_axis = camera.rotation * Vec3::X;
        let up_axis = if self.screen_space_panning {
            camera.rotation * Vec3::Y
        } else {
            Vec3::Y.cross(right_axis).normalize_or_zero()
        };
        self.pan_offset += right_axis * right + up_axis * up;
    }

    pub fn save_state(&mut self, camera: &Transform) {
        self.saved_target = self.target;
        self.saved_position = camera.translation;
    }

    pub fn reset(&mut self, camera: &mut Transform) {
        self.target = self.saved_target;
        camera.translation = self.saved_position;
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    /// Applies pending input and auto-rotation, clamps the distance and aims the camera.
    pub fn update(&mut self, camera: &mut Transform, up: Vec3, dt: f32) {
        let to_y_up = Quat::from_rotation_arc(up.normalize_or_zero(), Vec3::Y);
        let offset = to_y_up * (camera.translation - self.target);
        let radius = offset.length();
        if radius > f32::EPSILON {
            let mut theta = offset.x.atan2(offset.z);
            let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
            if self.auto_rotate && self.enabled {
                theta -= 2.0 * PI / 60.0 * self.auto_rotate_speed * dt;
            }
            theta += self.theta_delta;
            phi = (phi + self.phi_delta).clamp(MIN_POLAR, PI - MIN_POLAR);
            let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
            self.target += self.pan_offset;
            let offset = Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
            camera.translation = self.target + to_y_up.inverse() * offset;
            camera.look_at(self.target, up);
        }
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }
}

/// Active camera selection, user navigation and animated camera moves.
#[derive(Debug)]
pub struct Navigation {
    pub controls: OrbitControls,
    default_camera: NodeId,
    active_camera: NodeId,
    home: Vec3,
    fullscreen: bool,
    tweens: TweenGroup,
}

impl Navigation {
    pub fn new(default_camera: NodeId) -> Self {
        Self {
            controls: OrbitControls::default(),
            default_camera,
            active_camera: default_camera,
            home: Vec3::ZERO,
            fullscreen: false,
            tweens: TweenGroup::default(),
        }
    }

    pub fn default_camera(&self) -> NodeId {
        self.default_camera
    }

    pub fn active_camera(&self) -> NodeId {
        self.active_camera
    }

    pub fn is_default_active(&self) -> bool {
        self.active_camera == self.default_camera
    }

    pub fn home(&self) -> Vec3 {
        self.home
    }

    pub fn set_home(&mut self, position: Vec3) {
        self.home = position;
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn is_animating(&self) -> bool {
        !self.tweens.is_empty()
    }

    /// Selects the default camera or the first embedded camera named `name` below `content`.
    /// Unknown names change nothing and return false.
    pub fn set_camera(&mut self, name: &str, graph: &SceneGraph, content: Option<NodeId>) -> bool {
        if name == DEFAULT_CAMERA {
            self.controls.enabled = true;
            self.active_camera = self.default_camera;
            return true;
        }
        let found = content.and_then(|root| {
            graph.find(root, |node| node.is_camera() && node.name == name)
        });
        match found {
            Some(camera) => {
                self.controls.enabled = false;
                self.active_camera = camera;
                true
            }
            None => {
                log::warn!("No camera named '{}' in the content", name);
                false
            }
        }
    }

    /// Falls back to the default camera if the active one is no longer in `graph`.
    pub fn forget_missing_camera(&mut self, graph: &SceneGraph) {
        if !graph.contains(self.active_camera) {
            self.active_camera = self.default_camera;
            self.controls.enabled = true;
        }
    }

    /// Drops pending camera moves, e.g. when their target leaves the scene.
    pub fn cancel_transitions(&mut self) {
        self.tweens.clear();
        self.controls.enabled = self.is_default_active();
    }

    pub fn zoom_in(&mut self, graph: &SceneGraph) {
        self.transition(graph, |position, _| position / ZOOM_FACTOR);
    }

    pub fn zoom_out(&mut self, graph: &SceneGraph) {
        self.transition(graph, |position, _| position * ZOOM_FACTOR);
    }

    /// Eases the active camera back to where the content was framed.
    pub fn reset(&mut self, graph: &SceneGraph) {
        self.transition(graph, |_, home| home);
    }

    fn transition(&mut self, graph: &SceneGraph, destination: impl Fn(Vec3, Vec3) -> Vec3) {
        let Some(camera) = graph.get(self.active_camera) else {
            return;
        };
        let from = camera.transform.translation;
        self.controls.enabled = false;
        self.tweens.add(Tween::new(
            self.active_camera,
            from,
            destination(from, self.home),
            TRANSITION_MS,
        ));
    }

    /// Per-frame step: orbit controls on the default camera, then camera tweens.
    pub fn update(&mut self, graph: &mut SceneGraph, now_ms: f64, dt: f32) {
        if let Some(node) = graph.get_mut(self.default_camera) {
            self.controls.update(&mut node.transform, Vec3::Y, dt);
        }
        if self.tweens.update(now_ms, graph) > 0 && self.tweens.is_empty() {
            self.controls.enabled = self.is_default_active();
        }
    }
}
