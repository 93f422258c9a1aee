use crate::scene::{Camera, Helper, Node, NodeId, NodeKind, PerspectiveCamera, Scene};
use glam::Vec3;

/// Edge length of the square overlay surface, in logical pixels.
pub const GIZMO_PIXELS: u32 = 100;

const GIZMO_FOV: f32 = 50.0;
const GIZMO_NEAR: f32 = 0.1;
const GIZMO_FAR: f32 = 10.0;
const CORNER_AXES: f32 = 5.0;

/// Orientation indicator: an axes helper in its own scene, seen from the
/// default camera's direction. Independent of the loaded content.
#[derive(Debug)]
pub struct Gizmo {
    scene: Scene,
    camera: NodeId,
    corner: NodeId,
}

impl Default for Gizmo {
    fn default() -> Self {
        Self::new()
    }
}

impl Gizmo {
    pub fn new() -> Self {
        let mut scene = Scene::new("AxesScene");
        let camera = scene.graph.add(
            scene.root(),
            Node::new(
                "AxesCamera",
                NodeKind::Camera(Camera::Perspective(PerspectiveCamera::new(
                    GIZMO_FOV, 1.0, GIZMO_NEAR, GIZMO_FAR,
                ))),
            ),
        );
        let corner = scene.graph.add(
            scene.root(),
            Node::new("AxesCorner", NodeKind::Helper(Helper::Axes { size: CORNER_AXES })),
        );
        Self {
            scene,
            camera,
            corner,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> NodeId {
        self.camera
    }

    pub fn corner(&self) -> NodeId {
        self.corner
    }

    /// Mirrors a new framing: camera placement, clipping and axes scale follow `size`.
    pub fn frame(&mut self, position: Vec3, size: f32) {
        self.follow(position);
        if let Some(camera) = self.scene.graph.get_mut(self.camera).and_then(Node::camera_mut) {
            camera.set_clipping(size / 100.0, size * 100.0);
        }
        if let Some(corner) = self.scene.graph.get_mut(self.corner) {
            corner.transform.scale = Vec3::splat(size);
        }
    }

    /// Places the gizmo camera at `position`, looking at the origin.
    pub fn follow(&mut self, position: Vec3) {
        if let Some(node) = self.scene.graph.get_mut(self.camera) {
            node.transform.translation = position;
            node.transform.look_at(Vec3::ZERO, Vec3::Y);
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Some(camera) = self.scene.graph.get_mut(self.camera).and_then(Node::camera_mut) {
            camera.set_aspect(aspect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Gizmo;
    use glam::Vec3;

    #[test]
    fn frame_scales_corner_and_clipping() {
        let mut gizmo = Gizmo::new();
        gizmo.frame(Vec3::new(5.0, 3.0, 5.0), 10.0);
        let graph = &gizmo.scene().graph;
        let camera = graph.get(gizmo.camera()).unwrap();
        assert_eq!(camera.camera().unwrap().clipping(), (0.1, 1000.0));
        assert_eq!(camera.transform.translation, Vec3::new(5.0, 3.0, 5.0));
        let corner = graph.get(gizmo.corner()).unwrap();
        assert_eq!(corner.transform.scale, Vec3::splat(10.0));
    }
}
