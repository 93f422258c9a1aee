use super::{Renderer, ToneMapping};
use crate::scene::{Color, GpuResource, NodeId, NodeKind, Scene};

/// What one `render` call saw.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub camera: NodeId,
    pub nodes: usize,
    pub meshes: usize,
    pub lights: usize,
    pub helpers: usize,
    pub environment: Option<String>,
    pub background: bool,
}

/// Renderer that draws nothing and records every call. Drives the CLI and the tests.
#[derive(Debug)]
pub struct HeadlessRenderer {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub clear_color: Color,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub frames: u64,
    pub overlay_frames: u64,
    pub overlay_clears: u64,
    pub overlay_size: (u32, u32),
    pub released: Vec<GpuResource>,
    pub last_frame: Option<FrameRecord>,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_ratio: 1.0,
            clear_color: Color::WHITE,
            tone_mapping: ToneMapping::default(),
            exposure: 1.0,
            frames: 0,
            overlay_frames: 0,
            overlay_clears: 0,
            overlay_size: (0, 0),
            released: Vec::new(),
            last_frame: None,
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn set_tone_mapping(&mut self, mode: ToneMapping, exposure: f32) {
        self.tone_mapping = mode;
        self.exposure = exposure;
    }

    fn release(&mut self, resource: GpuResource) {
        self.released.push(resource);
    }

    fn render(&mut self, scene: &Scene, camera: NodeId) {
        let mut record = FrameRecord {
            camera,
            nodes: 0,
            meshes: 0,
            lights: 0,
            helpers: 0,
            environment: scene.environment.as_ref().map(|map| map.id.clone()),
            background: scene.background.is_some(),
        };
        scene.graph.traverse(scene.root(), |_, node| {
            record.nodes += 1;
            match node.kind {
                NodeKind::Mesh(_) => record.meshes += 1,
                NodeKind::Light(_) => record.lights += 1,
                NodeKind::Helper(_) => record.helpers += 1,
                NodeKind::Group | NodeKind::Camera(_) => {}
            }
        });
        self.frames += 1;
        self.last_frame = Some(record);
    }

    fn set_overlay_size(&mut self, width: u32, height: u32) {
        self.overlay_size = (width, height);
    }

    fn render_overlay(&mut self, _scene: &Scene, _camera: NodeId) {
        self.overlay_frames += 1;
    }

    fn clear_overlay(&mut self) {
        self.overlay_clears += 1;
    }
}
