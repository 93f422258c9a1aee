use super::Viewer;
use crate::render::{EnvironmentError, Renderer};
use crate::scene::{
    Color, Helper, Light, LightKind, Node, NodeId, NodeKind, SceneGraph, Transform, Vignette,
};
use glam::Vec3;
use std::collections::BTreeSet;

const GRID_SIZE: f32 = 10.0;
const GRID_DIVISIONS: u32 = 10;
const AXES_SIZE: f32 = 1.0;
const AXES_RENDER_ORDER: i32 = 999;
const SKELETON_LINE_WIDTH: f32 = 3.0;
const MAIN_LIGHT_POSITION: Vec3 = Vec3::new(0.5, 0.0, 0.866);

/// Nodes the viewer adds around the content and keeps in sync with the view state.
#[derive(Debug, Default)]
pub(super) struct DisplayNodes {
    pub(super) lights: Vec<NodeId>,
    pub(super) skeleton_helpers: Vec<NodeId>,
    grid: Option<(NodeId, NodeId)>,
    vignette: Option<NodeId>,
    vignette_style: Option<Vignette>,
}

impl DisplayNodes {
    pub(super) fn new(vignette_style: Option<Vignette>) -> Self {
        Self {
            vignette_style,
            ..Self::default()
        }
    }

    pub(super) fn set_vignette_aspect(&mut self, graph: &mut SceneGraph, aspect: f32) {
        if let Some(style) = &mut self.vignette_style {
            style.aspect = aspect;
        }
        self.write_vignette(graph);
    }

    fn set_vignette_colors(&mut self, graph: &mut SceneGraph, colors: [Color; 2]) {
        if let Some(style) = &mut self.vignette_style {
            style.colors = colors;
        }
        self.write_vignette(graph);
    }

    fn write_vignette(&self, graph: &mut SceneGraph) {
        let (Some(id), Some(style)) = (self.vignette, self.vignette_style) else {
            return;
        };
        if let Some(node) = graph.get_mut(id) {
            node.kind = NodeKind::Helper(Helper::Vignette(style));
        }
    }

    /// Adds or removes the vignette backdrop. Without a configured style this does nothing.
    fn show_vignette(&mut self, graph: &mut SceneGraph, visible: bool) {
        let Some(style) = self.vignette_style else {
            return;
        };
        match (visible, self.vignette) {
            (true, None) => {
                let mut node = Node::new("Vignette", NodeKind::Helper(Helper::Vignette(style)));
                node.render_order = -1;
                self.vignette = Some(graph.add(graph.root(), node));
            }
            (false, Some(id)) => {
                graph.remove(id);
                self.vignette = None;
            }
            _ => {}
        }
    }
}

impl<R: Renderer> Viewer<R> {
    /// Keeps the default light rig in line with `punctual_lights` and pushes tone mapping.
    pub(super) fn update_lights(&mut self) {
        let has_rig = !self.display.lights.is_empty();
        if self.state.punctual_lights && !has_rig {
            self.add_lights();
        } else if !self.state.punctual_lights && has_rig {
            self.remove_lights();
        }

        self.renderer
            .set_tone_mapping(self.state.tone_mapping, self.state.exposure_factor());

        if let [ambient, direct] = self.display.lights[..] {
            let state = &self.state;
            if let Some(light) = self.scene.graph.get_mut(ambient).and_then(Node::light_mut) {
                light.color = state.ambient_color;
                light.intensity = state.ambient_intensity;
            }
            if let Some(light) = self.scene.graph.get_mut(direct).and_then(Node::light_mut) {
                light.color = state.direct_color;
                light.intensity = state.direct_intensity;
            }
        }
    }

    fn add_lights(&mut self) {
        if self.options.is_asset_generator() {
            let hemi = Node::new(
                "hemi_light",
                NodeKind::Light(Light {
                    kind: LightKind::Hemisphere {
                        ground: Color::WHITE,
                    },
                    color: Color::WHITE,
                    intensity: 1.0,
                }),
            );
            let id = self.scene.graph.add(self.scene.root(), hemi);
            self.display.lights.push(id);
            return;
        }

        let ambient = Node::new(
            "ambient_light",
            NodeKind::Light(Light {
                kind: LightKind::Ambient,
                color: self.state.ambient_color,
                intensity: self.state.ambient_intensity,
            }),
        );
        let main = Node::new(
            "main_light",
            NodeKind::Light(Light {
                kind: LightKind::Directional,
                color: self.state.direct_color,
                intensity: self.state.direct_intensity,
            }),
        )
        .with_transform(Transform::from_translation(MAIN_LIGHT_POSITION));
        // Parented to the camera so the rig follows the view.
        let ambient = self.scene.graph.add(self.default_camera, ambient);
        let main = self.scene.graph.add(self.default_camera, main);
        self.display.lights.extend([ambient, main]);
    }

    fn remove_lights(&mut self) {
        for light in self.display.lights.drain(..) {
            self.scene.graph.remove(light);
        }
    }

    /// Applies the selected environment as lighting (and optionally background),
    /// then decides whether the vignette backdrop shows.
    pub(super) fn update_environment(&mut self) {
        let id = &self.state.environment;
        let map = self
            .catalog
            .find(id)
            .ok_or_else(|| EnvironmentError::Unknown(id.clone()))
            .and_then(|entry| self.environments.lookup(entry))
            .unwrap_or_else(|err| {
                log::warn!("Rendering without environment lighting: {}", err);
                None
            });

        let show_vignette = (map.is_none() || !self.state.background)
            && self.navigation.is_default_active();
        self.display.show_vignette(&mut self.scene.graph, show_vignette);

        self.scene.background = if self.state.background {
            map.clone()
        } else {
            None
        };
        self.scene.environment = map;
    }

    pub(super) fn update_texture_encoding(&mut self) {
        let Some(root) = self.content_root() else {
            return;
        };
        let encoding = self.state.texture_encoding;
        let mut touched = 0usize;
        self.scene.graph.traverse_mut(root, |_, node| {
            if let Some(mesh) = node.mesh_mut() {
                if mesh.material.set_color_encoding(encoding) {
                    touched += 1;
                }
            }
        });
        log::debug!("Texture encoding {:?} applied to {} materials", encoding, touched);
    }

    pub(super) fn update_background(&mut self) {
        self.renderer.set_clear_color(self.state.bg_color);
        self.display.set_vignette_colors(
            &mut self.scene.graph,
            [self.state.bg_color1, self.state.bg_color2],
        );
    }

    /// Wireframe, skeleton helpers and the grid with its axes.
    pub(super) fn update_display(&mut self) {
        if let Some(root) = self.content_root() {
            let wireframe = self.state.wireframe;
            self.scene.graph.traverse_mut(root, |_, node| {
                if let Some(mesh) = node.mesh_mut() {
                    if mesh.material.wireframe != wireframe {
                        mesh.material.wireframe = wireframe;
                        mesh.material.needs_update();
                    }
                }
            });
        }

        self.update_skeleton_helpers();

        match (self.state.grid, self.display.grid) {
            (true, None) => {
                let root = self.scene.root();
                let grid = self.scene.graph.add(
                    root,
                    Node::new(
                        "Grid",
                        NodeKind::Helper(Helper::Grid {
                            size: GRID_SIZE,
                            divisions: GRID_DIVISIONS,
                        }),
                    ),
                );
                let mut axes = Node::new("Axes", NodeKind::Helper(Helper::Axes { size: AXES_SIZE }));
                axes.render_order = AXES_RENDER_ORDER;
                axes.clear_depth = true;
                let axes = self.scene.graph.add(root, axes);
                self.display.grid = Some((grid, axes));
            }
            (false, Some((grid, axes))) => {
                self.scene.graph.remove(grid);
                self.scene.graph.remove(axes);
                self.display.grid = None;
                self.renderer.clear_overlay();
            }
            _ => {}
        }
    }

    fn update_skeleton_helpers(&mut self) {
        if !self.state.skeleton {
            for helper in self.display.skeleton_helpers.drain(..) {
                self.scene.graph.remove(helper);
            }
            return;
        }
        if !self.display.skeleton_helpers.is_empty() {
            return;
        }
        let Some(content) = self.content_root() else {
            return;
        };

        let graph = &self.scene.graph;
        let mut roots = BTreeSet::new();
        graph.traverse(content, |_, node| {
            let Some(first_joint) = node
                .mesh()
                .and_then(|mesh| mesh.skin.as_ref())
                .and_then(|skin| skin.joints.first().copied())
            else {
                return;
            };
            let root = graph
                .get(first_joint)
                .and_then(|joint| joint.parent())
                .unwrap_or(first_joint);
            roots.insert(root);
        });

        for root in roots {
            let helper = Node::new(
                "SkeletonHelper",
                NodeKind::Helper(Helper::Skeleton {
                    root,
                    line_width: SKELETON_LINE_WIDTH,
                }),
            );
            let id = self.scene.graph.add(self.scene.root(), helper);
            self.display.skeleton_helpers.push(id);
        }
        log::debug!("Showing {} skeleton helpers", self.display.skeleton_helpers.len());
    }
}
