//! The viewer: live scene, camera navigation, view-state reconciliation and
//! the per-frame render tick.

mod composer;
mod display;
mod gizmo;
mod navigation;
mod state;
mod tween;

pub use gizmo::{Gizmo, GIZMO_PIXELS};
pub use navigation::{Navigation, OrbitControls, ZOOM_FACTOR};
pub use state::{ViewState, DEFAULT_CAMERA};
pub use tween::{cubic_in_out, Tween, TweenGroup, TRANSITION_MS};

use crate::assets::{DefaultFetcher, Fetcher, ObjectUrlStore, ResourceBundle};
use crate::config::ViewerOptions;
use crate::error::LoadError;
use crate::loader::{DecodedScene, GltfDecoder, ModelDecoder, SceneLoader};
use crate::render::{EnvironmentCache, EnvironmentCatalog, Renderer};
use crate::scene::{
    AnimationClip, AnimationMixer, Camera, Node, NodeId, NodeKind, PerspectiveCamera, Scene,
    Vignette,
};
use display::DisplayNodes;
use glam::Vec3;
use std::rc::Rc;
use std::sync::Arc;

const DEFAULT_FOV: f32 = 60.0;
const DEFAULT_NEAR: f32 = 0.01;
const DEFAULT_FAR: f32 = 1000.0;
const VIGNETTE_GRAIN: f32 = 0.001;

/// External capabilities a viewer loads through.
pub struct ViewerServices {
    pub decoder: Box<dyn ModelDecoder>,
    pub fetcher: Rc<dyn Fetcher>,
    pub handles: ObjectUrlStore,
}

impl Default for ViewerServices {
    /// glTF decoding over the default fetcher.
    fn default() -> Self {
        let handles = ObjectUrlStore::new();
        Self {
            decoder: Box::new(GltfDecoder::new()),
            fetcher: Rc::new(DefaultFetcher::new(handles.clone())),
            handles,
        }
    }
}

/// Identifies one load; only the most recent ticket may attach content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// What a successful load put on screen.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub url: String,
    pub content: NodeId,
    pub clips: Vec<String>,
    pub scene_count: usize,
    pub size: f32,
    pub center: Vec3,
    /// Parsed document for introspection.
    pub raw: Arc<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<LoadedModel>),
    /// A newer load started meanwhile; this result was dropped.
    Superseded,
}

struct Content {
    root: NodeId,
    clips: Vec<AnimationClip>,
    size: f32,
}

pub struct Viewer<R: Renderer> {
    renderer: R,
    options: ViewerOptions,
    catalog: EnvironmentCatalog,
    environments: EnvironmentCache,
    loader: SceneLoader,
    scene: Scene,
    default_camera: NodeId,
    state: ViewState,
    display: DisplayNodes,
    navigation: Navigation,
    gizmo: Gizmo,
    content: Option<Content>,
    mixer: Option<AnimationMixer>,
    load_sequence: u64,
    prev_time_ms: Option<f64>,
}

impl<R: Renderer> Viewer<R> {
    pub fn new(
        mut renderer: R,
        options: ViewerOptions,
        size: (u32, u32),
        pixel_ratio: f32,
        services: ViewerServices,
    ) -> Self {
        let catalog = options.catalog();
        let state = ViewState::from_options(&options, &catalog);
        let aspect = aspect_of(size);

        let mut scene = Scene::new("Scene");
        let fov = if options.is_asset_generator() {
            0.8 * 180.0 / std::f32::consts::PI
        } else {
            DEFAULT_FOV
        };
        let default_camera = scene.graph.add(
            scene.root(),
            Node::new(
                "DefaultCamera",
                NodeKind::Camera(Camera::Perspective(PerspectiveCamera::new(
                    fov,
                    aspect,
                    DEFAULT_NEAR,
                    DEFAULT_FAR,
                ))),
            ),
        );

        renderer.set_clear_color(state.bg_color);
        renderer.set_pixel_ratio(pixel_ratio);
        renderer.set_size(size.0, size.1);
        renderer.set_overlay_size(GIZMO_PIXELS, GIZMO_PIXELS);

        let vignette = options.vignette.then_some(Vignette {
            colors: [state.bg_color1, state.bg_color2],
            aspect,
            grain_scale: VIGNETTE_GRAIN,
        });

        log::info!(
            "Viewer ready: {}x{} @{}, environment '{}'",
            size.0,
            size.1,
            pixel_ratio,
            state.environment
        );
        Self {
            renderer,
            environments: EnvironmentCache::new(services.fetcher.clone()),
            loader: SceneLoader::new(services.decoder, services.fetcher, services.handles),
            catalog,
            options,
            scene,
            default_camera,
            state,
            display: DisplayNodes::new(vignette),
            navigation: Navigation::new(default_camera),
            gizmo: Gizmo::new(),
            content: None,
            mixer: None,
            load_sequence: 0,
            prev_time_ms: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn catalog(&self) -> &EnvironmentCatalog {
        &self.catalog
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn navigation_mut(&mut self) -> &mut Navigation {
        &mut self.navigation
    }

    pub fn gizmo(&self) -> &Gizmo {
        &self.gizmo
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn default_camera(&self) -> NodeId {
        self.default_camera
    }

    pub fn content_root(&self) -> Option<NodeId> {
        self.content.as_ref().map(|content| content.root)
    }

    pub fn object_urls(&self) -> &ObjectUrlStore {
        self.loader.handles()
    }

    /// Loads `url` and shows it. Bundle entries shadow resources referenced by the document.
    pub fn load(
        &mut self,
        url: &str,
        root_path: &str,
        bundle: &ResourceBundle,
    ) -> Result<LoadOutcome, LoadError> {
        let ticket = self.begin_load();
        let decoded = self.decode(url, root_path, bundle);
        self.finish_load(ticket, url, decoded)
    }

    /// Starts a load; any earlier ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_sequence += 1;
        LoadTicket(self.load_sequence)
    }

    pub fn decode(
        &self,
        url: &str,
        root_path: &str,
        bundle: &ResourceBundle,
    ) -> Result<DecodedScene, LoadError> {
        self.loader.load(url, root_path, bundle)
    }

    /// Attaches a decoded result if `ticket` is still the latest load; stale results,
    /// failed or not, are dropped silently.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        url: &str,
        decoded: Result<DecodedScene, LoadError>,
    ) -> Result<LoadOutcome, LoadError> {
        if ticket.0 != self.load_sequence {
            log::debug!(
                "Dropping result of load #{} for {}, load #{} is current",
                ticket.0,
                url,
                self.load_sequence
            );
            return Ok(LoadOutcome::Superseded);
        }
        let decoded = decoded?;
        let clips: Vec<String> = decoded.clips.iter().map(|clip| clip.name.clone()).collect();
        let root = self.set_content(decoded.scene, decoded.clips);
        let (size, center) = self.framing();
        log::info!(
            "Loaded {}: {} nodes, {} clips, size {:.3}",
            url,
            self.scene.graph.descendants(root).len(),
            clips.len(),
            size
        );
        Ok(LoadOutcome::Loaded(Arc::new(LoadedModel {
            url: url.to_string(),
            content: root,
            clips,
            scene_count: decoded.scene_count,
            size,
            center,
            raw: decoded.raw,
        })))
    }

    fn framing(&self) -> (f32, Vec3) {
        let Some(content) = &self.content else {
            return (0.0, Vec3::ZERO);
        };
        let bounds = self.scene.graph.bounding_box(content.root);
        (content.size, bounds.center())
    }

    /// Mutates the view state and reconciles whatever the change touched.
    pub fn update_state(&mut self, change: impl FnOnce(&mut ViewState)) {
        let before = self.state.clone();
        change(&mut self.state);
        let after = self.state.clone();

        if after.camera != before.camera && !self.set_camera(&after.camera) {
            self.state.camera = before.camera.clone();
        }
        if after.lights_changed(&before) {
            self.update_lights();
        }
        if after.environment != before.environment
            || after.background != before.background
            || self.state.camera != before.camera
        {
            self.update_environment();
        }
        if after.texture_encoding != before.texture_encoding {
            self.update_texture_encoding();
        }
        if after.background_changed(&before) {
            self.update_background();
        }
        if after.display_changed(&before) {
            self.update_display();
        }
        if after.playback_speed != before.playback_speed {
            if let Some(mixer) = &mut self.mixer {
                mixer.set_time_scale(after.playback_speed);
            }
        }
        if after.action_states != before.action_states {
            self.sync_actions();
        }
    }

    pub fn set_clip_enabled(&mut self, name: &str, enabled: bool) {
        self.update_state(|state| {
            if let Some(flag) = state.action_states.get_mut(name) {
                *flag = enabled;
            }
        });
    }

    fn sync_actions(&mut self) {
        let (Some(mixer), Some(content)) = (&mut self.mixer, &self.content) else {
            return;
        };
        for clip in &content.clips {
            let enabled = self.state.action_states.get(&clip.name).copied().unwrap_or(false);
            let action = mixer.clip_action(clip);
            if enabled && !action.is_running() {
                action.reset().play();
            } else if !enabled && action.is_running() {
                action.stop();
            }
        }
    }

    /// Makes `name` the active camera; see [`Navigation::set_camera`].
    pub fn set_camera(&mut self, name: &str) -> bool {
        let content = self.content_root();
        let changed = self.navigation.set_camera(name, &self.scene.graph, content);
        if changed {
            self.state.camera = name.to_string();
        }
        changed
    }

    /// One frame: navigation, tweens, animation, then the main and gizmo renders.
    pub fn animate(&mut self, time_ms: f64) {
        let dt = self
            .prev_time_ms
            .map_or(0.0, |prev| ((time_ms - prev) / 1000.0).max(0.0) as f32);
        self.prev_time_ms = Some(time_ms);

        self.navigation.update(&mut self.scene.graph, time_ms, dt);
        if let Some(mixer) = &mut self.mixer {
            mixer.update(dt, &mut self.scene.graph);
        }
        self.render();
    }

    fn render(&mut self) {
        self.renderer
            .render(&self.scene, self.navigation.active_camera());
        if self.state.grid {
            let position = self
                .scene
                .graph
                .get(self.default_camera)
                .map_or(Vec3::ZERO, |node| node.transform.translation);
            self.gizmo.follow(position);
            self.renderer
                .render_overlay(self.gizmo.scene(), self.gizmo.camera());
        }
    }

    /// Resizes to the container's parent, or to the viewport while fullscreen.
    pub fn resize(&mut self, parent: (u32, u32), viewport: (u32, u32)) {
        let size = if self.navigation.is_fullscreen() {
            viewport
        } else {
            parent
        };
        let aspect = aspect_of(size);
        if let Some(camera) = self
            .scene
            .graph
            .get_mut(self.default_camera)
            .and_then(Node::camera_mut)
        {
            camera.set_aspect(aspect);
        }
        self.display.set_vignette_aspect(&mut self.scene.graph, aspect);
        self.renderer.set_size(size.0, size.1);

        self.gizmo.set_aspect(1.0);
        self.renderer.set_overlay_size(GIZMO_PIXELS, GIZMO_PIXELS);
        log::debug!("Resized to {}x{}", size.0, size.1);
    }

    /// Host notification that fullscreen was entered or left.
    pub fn fullscreen_changed(&mut self, fullscreen: bool) {
        self.navigation.set_fullscreen(fullscreen);
    }

    pub fn zoom_in(&mut self) {
        self.navigation.zoom_in(&self.scene.graph);
    }

    pub fn zoom_out(&mut self) {
        self.navigation.zoom_out(&self.scene.graph);
    }

    pub fn reset_camera(&mut self) {
        self.navigation.reset(&self.scene.graph);
    }

    /// Logs the subtree below `id`, one node per line, indented by depth.
    pub fn print_graph(&self, id: NodeId) {
        let base = self.scene.graph.depth(id);
        self.scene.graph.traverse(id, |node_id, node| {
            let depth = self.scene.graph.depth(node_id) - base;
            log::debug!("{}<{}> {}", "  ".repeat(depth), node.type_name(), node.name);
        });
    }
}

fn aspect_of((width, height): (u32, u32)) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}
