pub mod animation;
pub mod bounds;
pub mod graph;
pub mod material;

pub use animation::{
    dedupe_clip_names, AnimationClip, AnimationMixer, Channel, ClipAction, ClipId, Interpolation,
    Keyframes,
};
pub use bounds::Aabb;
pub use graph::{NodeId, SceneGraph};
pub use material::{
    GeometryId, GpuResource, Material, Texture, TextureEncoding, TextureId, TextureMaps,
};

use crate::render::EnvironmentMap;
use glam::{Mat3, Mat4, Quat, Vec3};
use std::sync::Arc;

/// RGB color packed as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct Color(pub u32);

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Number(u32),
    Text(String),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid color '{0}', expected 0xRRGGBB or \"#RRGGBB\"")]
pub struct ColorParseError(String);

impl Color {
    pub const WHITE: Color = Color(0xFF_FF_FF);

    pub fn parse(text: &str) -> Result<Self, ColorParseError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .unwrap_or(trimmed);
        if digits.len() != 6 {
            return Err(ColorParseError(text.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Color)
            .map_err(|_| ColorParseError(text.to_string()))
    }

    pub fn to_rgb(self) -> [f32; 3] {
        [
            ((self.0 >> 16) & 0xFF) as f32 / 255.0,
            ((self.0 >> 8) & 0xFF) as f32 / 255.0,
            (self.0 & 0xFF) as f32 / 255.0,
        ]
    }

    pub fn from_rgb(rgb: [f32; 3]) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
        Color((channel(rgb[0]) << 16) | (channel(rgb[1]) << 8) | channel(rgb[2]))
    }
}

impl TryFrom<ColorRepr> for Color {
    type Error = ColorParseError;

    fn try_from(value: ColorRepr) -> Result<Self, Self::Error> {
        match value {
            ColorRepr::Number(value) if value <= 0xFF_FF_FF => Ok(Color(value)),
            ColorRepr::Number(value) => Err(ColorParseError(value.to_string())),
            ColorRepr::Text(text) => Color::parse(&text),
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{:06X}", color.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Orients the local -Z axis towards `target`, the way cameras look.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let back = self.translation - target;
        if back.length_squared() <= f32::EPSILON {
            return;
        }
        let z = back.normalize();
        let mut x = up.cross(z);
        if x.length_squared() <= f32::EPSILON {
            // Looking straight along `up`; nudge the reference axis.
            x = Vec3::Z.cross(z);
            if x.length_squared() <= f32::EPSILON {
                x = Vec3::X;
            }
        }
        let x = x.normalize();
        let y = z.cross(x);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_deg,
            aspect,
            near,
            far,
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicCamera {
    pub xmag: f32,
    pub ymag: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Camera {
    Perspective(PerspectiveCamera),
    Orthographic(OrthographicCamera),
}

impl Camera {
    pub fn set_clipping(&mut self, near: f32, far: f32) {
        match self {
            Camera::Perspective(camera) => {
                camera.near = near;
                camera.far = far;
            }
            Camera::Orthographic(camera) => {
                camera.near = near;
                camera.far = far;
            }
        }
    }

    pub fn clipping(&self) -> (f32, f32) {
        match self {
            Camera::Perspective(camera) => (camera.near, camera.far),
            Camera::Orthographic(camera) => (camera.near, camera.far),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Camera::Perspective(camera) = self {
            camera.aspect = aspect;
        }
    }

    pub fn fov_deg(&self) -> Option<f32> {
        match self {
            Camera::Perspective(camera) => Some(camera.fov_deg),
            Camera::Orthographic(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    Hemisphere { ground: Color },
    Point { range: Option<f32> },
    Spot {
        range: Option<f32>,
        inner_cone: f32,
        outer_cone: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vignette {
    pub colors: [Color; 2],
    pub aspect: f32,
    pub grain_scale: f32,
}

/// Viewer-owned debug and decoration nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Helper {
    Grid { size: f32, divisions: u32 },
    Axes { size: f32 },
    Skeleton { root: NodeId, line_width: f32 },
    Vignette(Vignette),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub id: GeometryId,
    pub bounds: Aabb,
    pub vertex_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub joints: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub skin: Option<Skin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Box<Mesh>),
    Camera(Camera),
    Light(Light),
    Helper(Helper),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub render_order: i32,
    /// Clears the depth buffer before drawing so the node stays on top.
    pub clear_depth: bool,
    /// Index of the node in the source document, used to bind animations.
    pub source_index: Option<usize>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            render_order: 0,
            clear_depth: false,
            source_index: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_light(&self) -> bool {
        matches!(self.kind, NodeKind::Light(_))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self.kind, NodeKind::Camera(_))
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Group => "Group",
            NodeKind::Mesh(mesh) if mesh.skin.is_some() => "SkinnedMesh",
            NodeKind::Mesh(_) => "Mesh",
            NodeKind::Camera(Camera::Perspective(_)) => "PerspectiveCamera",
            NodeKind::Camera(Camera::Orthographic(_)) => "OrthographicCamera",
            NodeKind::Light(light) => match light.kind {
                LightKind::Ambient => "AmbientLight",
                LightKind::Directional => "DirectionalLight",
                LightKind::Hemisphere { .. } => "HemisphereLight",
                LightKind::Point { .. } => "PointLight",
                LightKind::Spot { .. } => "SpotLight",
            },
            NodeKind::Helper(Helper::Grid { .. }) => "GridHelper",
            NodeKind::Helper(Helper::Axes { .. }) => "AxesHelper",
            NodeKind::Helper(Helper::Skeleton { .. }) => "SkeletonHelper",
            NodeKind::Helper(Helper::Vignette(_)) => "Vignette",
        }
    }
}

/// The live scene handed to the renderer.
#[derive(Debug)]
pub struct Scene {
    pub graph: SceneGraph,
    pub environment: Option<Arc<EnvironmentMap>>,
    pub background: Option<Arc<EnvironmentMap>>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            graph: SceneGraph::new(name),
            environment: None,
            background: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.graph.root()
    }
}
