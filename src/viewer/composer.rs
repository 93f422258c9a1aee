use super::{Content, Viewer, DEFAULT_CAMERA};
use crate::config::Recentering;
use crate::render::Renderer;
use crate::scene::{
    dedupe_clip_names, AnimationClip, AnimationMixer, GpuResource, NodeId, NodeKind, SceneGraph,
};
use glam::Vec3;
use std::collections::HashSet;

impl<R: Renderer> Viewer<R> {
    /// Replaces the displayed content with `graph`, frames the default camera on it
    /// and starts every clip. Returns the id of the attached content root.
    pub fn set_content(&mut self, graph: SceneGraph, mut clips: Vec<AnimationClip>) -> NodeId {
        self.clear();
        dedupe_clip_names(&mut clips);

        let mut graph = graph;
        let bounds = graph.bounding_box(graph.root());
        let diagonal = bounds.diagonal();
        let size = if bounds.is_empty() || !diagonal.is_finite() || diagonal <= 0.0 {
            1.0
        } else {
            diagonal
        };
        let center = bounds.center();

        if let Some(camera) = self.scene.graph.get_mut(self.default_camera) {
            self.navigation.controls.reset(&mut camera.transform);
        }

        let root = graph.root();
        if let Some(node) = graph.get_mut(root) {
            let translation = &mut node.transform.translation;
            match self.options.recentering {
                Recentering::Origin => *translation -= center,
                Recentering::Legacy => *translation += *translation - center,
            }
        }

        self.navigation.controls.max_distance = size * 10.0;
        let position = match self.options.camera_position {
            Some(position) => Vec3::from(position),
            None => center + Vec3::new(size / 2.0, size / 3.0, size / 2.0),
        };
        let look_at = if self.options.camera_position.is_some() {
            Vec3::ZERO
        } else {
            center
        };
        if let Some(camera) = self.scene.graph.get_mut(self.default_camera) {
            if let Some(projection) = camera.camera_mut() {
                projection.set_clipping(size / 100.0, size * 100.0);
            }
            camera.transform.translation = position;
            camera.transform.look_at(look_at, Vec3::Y);
        }
        self.navigation.set_home(position);
        self.set_camera(DEFAULT_CAMERA);
        self.gizmo.frame(position, size);
        if let Some(camera) = self.scene.graph.get(self.default_camera) {
            self.navigation.controls.save_state(&camera.transform);
        }

        let content = self.scene.graph.attach(self.scene.root(), graph);
        let mut has_lights = false;
        self.scene.graph.traverse_mut(content, |_, node| {
            has_lights |= node.is_light();
            if let Some(mesh) = node.mesh_mut() {
                mesh.material.depth_write = !mesh.material.transparent;
            }
        });
        self.state.punctual_lights = !has_lights;

        self.state.action_states.clear();
        if !clips.is_empty() {
            let mut mixer = AnimationMixer::new(&self.scene.graph, content);
            mixer.set_time_scale(self.state.playback_speed);
            for clip in &clips {
                mixer.clip_action(clip).reset().play();
                self.state.action_states.insert(clip.name.clone(), true);
            }
            self.mixer = Some(mixer);
        }
        self.content = Some(Content {
            root: content,
            clips,
            size,
        });

        self.update_lights();
        self.update_environment();
        self.update_texture_encoding();
        self.update_background();
        self.update_display();

        log::debug!(
            "Framed content: size {:.3}, center {:?}, camera at {:?}",
            size,
            center,
            position
        );
        self.print_graph(content);
        content
    }

    /// Removes the current content and frees its GPU resources. A no-op when empty.
    pub fn clear(&mut self) {
        let Some(content) = self.content.take() else {
            return;
        };
        for helper in self.display.skeleton_helpers.drain(..) {
            self.scene.graph.remove(helper);
        }
        if let Some(mut mixer) = self.mixer.take() {
            mixer.stop_all_action();
        }
        self.state.action_states.clear();

        let removed = self.scene.graph.remove(content.root);
        let mut seen = HashSet::new();
        for node in &removed {
            let NodeKind::Mesh(mesh) = &node.kind else {
                continue;
            };
            let geometry = GpuResource::Geometry(mesh.geometry.id);
            if seen.insert(geometry) {
                self.renderer.release(geometry);
            }
            for texture in mesh.material.maps.iter() {
                let texture = GpuResource::Texture(texture.id);
                if seen.insert(texture) {
                    self.renderer.release(texture);
                }
            }
        }
        log::debug!(
            "Cleared {} nodes, released {} GPU resources",
            removed.len(),
            seen.len()
        );

        self.navigation.forget_missing_camera(&self.scene.graph);
        self.navigation.cancel_transitions();
        if self.navigation.is_default_active() {
            self.state.camera = DEFAULT_CAMERA.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Recentering, ViewerOptions};
    use crate::render::HeadlessRenderer;
    use crate::scene::{
        Aabb, AnimationClip, Camera, Geometry, GeometryId, GpuResource, Light, LightKind, Material, Mesh, Node,
        NodeKind, SceneGraph, Texture, TextureEncoding, TextureId, Transform,
    };
    use crate::viewer::{Viewer, ViewerServices};
    use glam::Vec3;
    use std::sync::Arc;

    fn viewer(options: ViewerOptions) -> Viewer<HeadlessRenderer> {
        Viewer::new(
            HeadlessRenderer::new(),
            options,
            (640, 480),
            1.0,
            ViewerServices::default(),
        )
    }

    fn texture(id: TextureId) -> Texture {
        Texture {
            id,
            name: None,
            uri: "textures/albedo.png".into(),
            mime_type: Some("image/png".into()),
            data: Arc::from(vec![0u8; 4]),
            encoding: TextureEncoding::Srgb,
            version: 0,
        }
    }

    fn mesh_node(name: &str, geometry: GeometryId, texture_id: TextureId, bounds: Aabb) -> Node {
        let mut material = Material::new(name);
        material.transparent = name.contains("glass");
        material.maps.base_color = Some(texture(texture_id));
        Node::new(
            name,
            NodeKind::Mesh(Box::new(Mesh {
                geometry: Geometry {
                    id: geometry,
                    bounds,
                    vertex_count: 3,
                },
                material,
                skin: None,
            })),
        )
    }

    /// Two meshes sharing one geometry and one texture, spanning (0,0,0)-(6,8,0).
    fn box_content(with_light: bool) -> (SceneGraph, GeometryId, TextureId) {
        let geometry = GeometryId::next();
        let texture = TextureId::next();
        let mut graph = SceneGraph::new("model");
        let root = graph.root();
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0));
        graph.add(root, mesh_node("body", geometry, texture, bounds));
        graph.add(
            root,
            mesh_node("glass", geometry, texture, bounds)
                .with_transform(Transform::from_translation(Vec3::new(3.0, 4.0, 0.0))),
        );
        if with_light {
            graph.add(
                root,
                Node::new(
                    "Sun",
                    NodeKind::Light(Light {
                        kind: LightKind::Directional,
                        color: crate::scene::Color::WHITE,
                        intensity: 2.0,
                    }),
                ),
            );
        }
        (graph, geometry, texture)
    }

    #[test]
    fn framing_follows_content_size() {
        let mut viewer = viewer(ViewerOptions::default());
        let (graph, _, _) = box_content(false);
        let content = viewer.set_content(graph, Vec::new());

        let camera = viewer.scene().graph.get(viewer.default_camera()).unwrap();
        assert_eq!(camera.camera().unwrap().clipping(), (0.1, 1000.0));
        assert_eq!(viewer.navigation().controls.max_distance, 100.0);
        let expected = Vec3::new(8.0, 4.0 + 10.0 / 3.0, 5.0);
        assert!((camera.transform.translation - expected).length() < 1e-4);
        assert_eq!(viewer.navigation().home(), camera.transform.translation);

        let root = viewer.scene().graph.get(content).unwrap();
        assert_eq!(root.transform.translation, Vec3::new(-3.0, -4.0, 0.0));
        let centered = viewer.scene().graph.bounding_box(content);
        assert!(centered.center().length() < 1e-5);
    }

    #[test]
    fn legacy_recentering_doubles_the_offset() {
        let mut viewer = viewer(ViewerOptions {
            recentering: Recentering::Legacy,
            ..ViewerOptions::default()
        });
        let (mut graph, _, _) = box_content(false);
        let root = graph.root();
        graph.get_mut(root).unwrap().transform.translation = Vec3::new(1.0, 0.0, 0.0);
        let content = viewer.set_content(graph, Vec::new());
        let root = viewer.scene().graph.get(content).unwrap();
        // center is (4,4,0): 1 + (1 - 4) = -2
        assert_eq!(root.transform.translation, Vec3::new(-2.0, -4.0, 0.0));
    }

    #[test]
    fn configured_camera_position_looks_at_origin() {
        let mut viewer = viewer(ViewerOptions {
            camera_position: Some([0.0, 0.0, 20.0]),
            ..ViewerOptions::default()
        });
        let (graph, _, _) = box_content(false);
        viewer.set_content(graph, Vec::new());
        let camera = viewer.scene().graph.get(viewer.default_camera()).unwrap();
        assert_eq!(camera.transform.translation, Vec3::new(0.0, 0.0, 20.0));
        let forward = camera.transform.rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn empty_content_frames_with_unit_size() {
        let mut viewer = viewer(ViewerOptions::default());
        let mut graph = SceneGraph::new("empty");
        let root = graph.root();
        graph.add(root, Node::group("nothing"));
        viewer.set_content(graph, Vec::new());
        let camera = viewer.scene().graph.get(viewer.default_camera()).unwrap();
        assert_eq!(camera.camera().unwrap().clipping(), (0.01, 100.0));
        assert_eq!(viewer.navigation().controls.max_distance, 10.0);
    }

    #[test]
    fn transparent_materials_skip_depth_writes() {
        let mut viewer = viewer(ViewerOptions::default());
        let (graph, _, _) = box_content(false);
        let content = viewer.set_content(graph, Vec::new());
        let mut writes = Vec::new();
        viewer.scene().graph.traverse(content, |_, node| {
            if let Some(mesh) = node.mesh() {
                writes.push((node.name.clone(), mesh.material.depth_write));
            }
        });
        assert_eq!(
            writes,
            vec![("body".to_string(), true), ("glass".to_string(), false)]
        );
    }

    #[test]
    fn replacing_content_keeps_a_single_root_and_light_rig() {
        let mut viewer = viewer(ViewerOptions::default());
        let (first, geometry, texture) = box_content(false);
        let first_root = viewer.set_content(first, Vec::new());
        assert!(viewer.state().punctual_lights);
        let nodes_with_first = viewer.scene().graph.len();

        let (second, _, _) = box_content(false);
        let second_root = viewer.set_content(second, Vec::new());
        assert!(!viewer.scene().graph.contains(first_root));
        assert_eq!(viewer.content_root(), Some(second_root));
        assert_eq!(viewer.scene().graph.len(), nodes_with_first);

        let released = &viewer.renderer().released;
        assert_eq!(
            released,
            &vec![GpuResource::Geometry(geometry), GpuResource::Texture(texture)]
        );

        let lights = viewer
            .scene()
            .graph
            .descendants(viewer.scene().root())
            .into_iter()
            .filter(|id| viewer.scene().graph.get(*id).is_some_and(|node| node.is_light()))
            .count();
        assert_eq!(lights, 2);
    }

    #[test]
    fn reload_drops_camera_moves_aimed_at_old_content() {
        let mut viewer = viewer(ViewerOptions::default());
        let (mut first, _, _) = box_content(false);
        let root = first.root();
        let perspective = crate::scene::PerspectiveCamera::new(45.0, 1.0, 0.1, 100.0);
        let closeup = Node::new("Closeup", NodeKind::Camera(Camera::Perspective(perspective)))
            .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)));
        first.add(root, closeup);
        viewer.set_content(first, Vec::new());
        assert!(viewer.set_camera("Closeup"));
        viewer.zoom_in();
        assert!(viewer.navigation().is_animating());

        let (second, _, _) = box_content(false);
        let content = viewer.set_content(second, Vec::new());
        assert!(!viewer.navigation().is_animating());
        assert!(viewer.navigation().is_default_active());
        assert!(viewer.navigation().controls.enabled);

        let before: Vec<_> = viewer
            .scene()
            .graph
            .descendants(content)
            .into_iter()
            .map(|id| viewer.scene().graph.get(id).unwrap().transform.translation)
            .collect();
        viewer.animate(0.0);
        viewer.animate(500.0);
        let after: Vec<_> = viewer
            .scene()
            .graph
            .descendants(content)
            .into_iter()
            .map(|id| viewer.scene().graph.get(id).unwrap().transform.translation)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn clips_sharing_a_name_all_play() {
        let mut viewer = viewer(ViewerOptions::default());
        let (graph, _, _) = box_content(false);
        let clips = vec![
            AnimationClip::new("Take", Vec::new()),
            AnimationClip::new("Take", Vec::new()),
        ];
        viewer.set_content(graph, clips);

        let mixer = viewer.mixer().unwrap();
        assert_eq!(mixer.actions().len(), 2);
        assert!(mixer.actions().iter().all(|action| action.is_running()));
        let states: Vec<_> = viewer
            .state()
            .action_states
            .iter()
            .map(|(name, enabled)| (name.as_str(), *enabled))
            .collect();
        assert_eq!(states, vec![("Take", true), ("Take_1", true)]);

        viewer.set_clip_enabled("Take_1", false);
        let running: Vec<_> = viewer
            .mixer()
            .unwrap()
            .actions()
            .iter()
            .map(|action| (action.clip().name.as_str(), action.is_running()))
            .collect();
        assert_eq!(running, vec![("Take", true), ("Take_1", false)]);
    }

    #[test]
    fn content_lights_disable_punctual_lights() {
        let mut viewer = viewer(ViewerOptions::default());
        let (graph, _, _) = box_content(true);
        viewer.set_content(graph, Vec::new());
        assert!(!viewer.state().punctual_lights);
        let names: Vec<_> = viewer
            .scene()
            .graph
            .descendants(viewer.default_camera())
            .into_iter()
            .filter_map(|id| viewer.scene().graph.get(id))
            .filter(|node| node.is_light())
            .map(|node| node.name.clone())
            .collect();
        assert!(names.is_empty());
    }

    #[test]
    fn clear_without_content_is_a_no_op() {
        let mut viewer = viewer(ViewerOptions::default());
        let nodes = viewer.scene().graph.len();
        viewer.clear();
        viewer.clear();
        assert_eq!(viewer.scene().graph.len(), nodes);
        assert!(viewer.renderer().released.is_empty());
        assert!(matches!(
            viewer
                .scene()
                .graph
                .get(viewer.default_camera())
                .and_then(|node| node.camera()),
            Some(Camera::Perspective(_))
        ));
    }
}
