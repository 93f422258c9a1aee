mod environment;
mod headless;

pub use environment::{
    EnvironmentCache, EnvironmentCatalog, EnvironmentEntry, EnvironmentError, EnvironmentLevel,
    EnvironmentMap, NEUTRAL_ENVIRONMENT, NO_ENVIRONMENT,
};
pub use headless::{FrameRecord, HeadlessRenderer};

use crate::scene::{Color, GpuResource, NodeId, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ToneMapping {
    None,
    #[default]
    Linear,
    Reinhard,
    Cineon,
    #[serde(rename = "ACESFilmic")]
    AcesFilmic,
}

/// Backend that turns a scene graph plus a camera into pixels.
///
/// The viewer owns one renderer for the main view and draws the orientation
/// gizmo through the `overlay` calls into a second, small surface.
pub trait Renderer {
    fn set_size(&mut self, width: u32, height: u32);
    fn set_pixel_ratio(&mut self, ratio: f32);
    fn set_clear_color(&mut self, color: Color);
    /// `exposure` is the linear multiplier, i.e. already `2^stops`.
    fn set_tone_mapping(&mut self, mode: ToneMapping, exposure: f32);
    /// Frees the GPU copy of a geometry or texture of content that left the scene.
    fn release(&mut self, resource: GpuResource);
    fn render(&mut self, scene: &Scene, camera: NodeId);

    fn set_overlay_size(&mut self, width: u32, height: u32);
    fn render_overlay(&mut self, scene: &Scene, camera: NodeId);
    fn clear_overlay(&mut self);
}
