use super::{DecodedDocument, ModelDecoder, ResourceHooks};
use crate::assets::extract_url_base;
use crate::error::LoadError;
use crate::scene::{
    dedupe_clip_names, Aabb, AnimationClip, Camera, Channel, Color, Geometry, GeometryId,
    Interpolation, Keyframes, Light, LightKind, Material, Mesh, Node, NodeId, NodeKind,
    OrthographicCamera, PerspectiveCamera, SceneGraph, Skin, Texture, TextureEncoding, TextureId,
    Transform,
};
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Property;
use std::collections::HashMap;
use std::sync::Arc;

/// Far plane of embedded perspective cameras that leave `zfar` open.
const INFINITE_FAR: f32 = 2e6;

/// glTF 2.0 decoder for `.gltf` documents and `.glb` containers.
#[derive(Debug, Default)]
pub struct GltfDecoder;

impl GltfDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ModelDecoder for GltfDecoder {
    fn decode(
        &self,
        url: &str,
        hooks: &mut dyn ResourceHooks,
    ) -> Result<DecodedDocument, LoadError> {
        let resolved = hooks.resolve_url(url, None);
        let bytes = hooks.fetch(&resolved)?;
        let gltf = gltf::Gltf::from_slice(&bytes).map_err(|err| LoadError::Parse {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let base = extract_url_base(url);
        let document = &gltf.document;

        let buffers = load_buffers(document, gltf.blob.as_deref(), &base, url, hooks)?;
        let textures = load_textures(document, &buffers, &base, url, hooks)?;
        let mut builder = SceneBuilder {
            textures: &textures,
            geometries: HashMap::new(),
        };
        let scenes: Vec<SceneGraph> = document
            .scenes()
            .map(|scene| builder.build(&scene))
            .collect();
        let mut animations: Vec<_> = document
            .animations()
            .map(|animation| read_animation(&animation, &buffers))
            .collect();
        dedupe_clip_names(&mut animations);
        let raw = serde_json::to_value(document.as_json()).unwrap_or(serde_json::Value::Null);

        log::info!(
            "Decoded {}: {} scenes, {} textures, {} buffers",
            url,
            scenes.len(),
            textures.len(),
            buffers.len()
        );
        Ok(DecodedDocument {
            scenes,
            default_scene: document.default_scene().map(|scene| scene.index()),
            animations,
            raw,
        })
    }
}

/// Joins a document-relative reference onto `base`. Absolute, `data:` and `blob:`
/// references pass through; host-relative ones keep only the scheme and host of `base`.
fn resolve_reference(uri: &str, base: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || uri.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("blob:")
    {
        return uri.to_string();
    }
    if uri.starts_with('/') {
        if let Some(scheme_end) = base.find("://") {
            let host_end = base[scheme_end + 3..]
                .find('/')
                .map_or(base.len(), |index| scheme_end + 3 + index);
            return format!("{}{}", &base[..host_end], uri);
        }
    }
    format!("{}{}", base, uri)
}

fn load_buffers(
    document: &gltf::Document,
    blob: Option<&[u8]>,
    base: &str,
    url: &str,
    hooks: &mut dyn ResourceHooks,
) -> Result<Vec<Arc<[u8]>>, LoadError> {
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        let data: Arc<[u8]> = match buffer.source() {
            gltf::buffer::Source::Bin => {
                Arc::from(blob.ok_or_else(|| LoadError::Parse {
                    url: url.to_string(),
                    message: "binary buffer referenced but the file has no BIN chunk".into(),
                })?)
            }
            gltf::buffer::Source::Uri(uri) => {
                let resolved = hooks.resolve_url(&resolve_reference(uri, base), None);
                hooks.fetch(&resolved)?
            }
        };
        if data.len() < buffer.length() {
            return Err(LoadError::Parse {
                url: url.to_string(),
                message: format!(
                    "buffer {} holds {} bytes, {} declared",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            });
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// One texture per glTF texture, so materials sharing it share the GPU upload.
fn load_textures(
    document: &gltf::Document,
    buffers: &[Arc<[u8]>],
    base: &str,
    url: &str,
    hooks: &mut dyn ResourceHooks,
) -> Result<Vec<Texture>, LoadError> {
    let mut images: HashMap<usize, (String, Option<String>, Arc<[u8]>)> = HashMap::new();
    let mut textures = Vec::new();
    for texture in document.textures() {
        let image = texture.source();
        if !images.contains_key(&image.index()) {
            let loaded = match image.source() {
                gltf::image::Source::View { view, mime_type } => {
                    let uri = image
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("image_{}", image.index()));
                    let data = view_bytes(
                        buffers,
                        view.buffer().index(),
                        view.offset(),
                        view.length(),
                    )
                    .ok_or_else(|| LoadError::Parse {
                        url: url.to_string(),
                        message: format!(
                            "image {} reads {} bytes at {} past the end of buffer {}",
                            uri,
                            view.length(),
                            view.offset(),
                            view.buffer().index()
                        ),
                    })?;
                    (uri, Some(mime_type.to_string()), data)
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    let resolved = hooks.resolve_url(&resolve_reference(uri, base), None);
                    let data = hooks.fetch(&resolved).map_err(|source| {
                        LoadError::MissingTexture {
                            file: uri.rsplit('/').next().unwrap_or(uri).to_string(),
                            source,
                        }
                    })?;
                    (uri.to_string(), mime_type.map(str::to_string), data)
                }
            };
            images.insert(image.index(), loaded);
        }
        let Some((uri, mime_type, data)) = images.get(&image.index()) else {
            continue;
        };
        textures.push(Texture {
            id: TextureId::next(),
            name: texture.name().map(str::to_string),
            uri: uri.clone(),
            mime_type: mime_type.clone(),
            data: data.clone(),
            encoding: TextureEncoding::Linear,
            version: 0,
        });
    }
    Ok(textures)
}

struct SceneBuilder<'a> {
    textures: &'a [Texture],
    /// Keyed by (mesh, primitive) so instanced meshes share one upload.
    geometries: HashMap<(usize, usize), GeometryId>,
}

impl SceneBuilder<'_> {
    fn build(&mut self, scene: &gltf::Scene) -> SceneGraph {
        let name = scene
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Scene_{}", scene.index()));
        let mut graph = SceneGraph::new(&name);
        let mut nodes: HashMap<usize, NodeId> = HashMap::new();
        let mut skinned: Vec<(NodeId, gltf::Skin)> = Vec::new();
        let mut pending: Vec<(NodeId, gltf::Node)> = scene
            .nodes()
            .map(|node| (graph.root(), node))
            .collect();
        pending.reverse();

        while let Some((parent, node)) = pending.pop() {
            let id = self.add_node(&mut graph, parent, &node, &mut skinned);
            nodes.insert(node.index(), id);
            let mut children: Vec<_> = node.children().map(|child| (id, child)).collect();
            children.reverse();
            pending.extend(children);
        }

        for (mesh_node, skin) in skinned {
            let joints: Vec<NodeId> = skin
                .joints()
                .filter_map(|joint| nodes.get(&joint.index()).copied())
                .collect();
            if let Some(mesh) = graph.get_mut(mesh_node).and_then(Node::mesh_mut) {
                mesh.skin = Some(Skin { joints });
            }
        }
        graph
    }

    /// Adds `node`; a node carrying more than one component (primitives, camera,
    /// light) becomes a group with one child per component.
    fn add_node<'d>(
        &mut self,
        graph: &mut SceneGraph,
        parent: NodeId,
        node: &gltf::Node<'d>,
        skinned: &mut Vec<(NodeId, gltf::Skin<'d>)>,
    ) -> NodeId {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mut components: Vec<(NodeKind, bool)> = Vec::new();
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let mesh = self.mesh(&mesh, &primitive);
                components.push((NodeKind::Mesh(Box::new(mesh)), node.skin().is_some()));
            }
        }
        if let Some(camera) = node.camera() {
            components.push((NodeKind::Camera(camera_from(&camera)), false));
        }
        if let Some(light) = node.light() {
            components.push((NodeKind::Light(light_from(&light)), false));
        }

        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        };

        let mut kind = NodeKind::Group;
        let mut kind_skinned = false;
        if components.len() == 1 {
            if let Some((only, skinned)) = components.pop() {
                kind = only;
                kind_skinned = skinned;
            }
        }
        let mut own = Node::new(name.clone(), kind).with_transform(transform);
        own.source_index = Some(node.index());
        let id = graph.add(parent, own);
        if kind_skinned {
            if let Some(skin) = node.skin() {
                skinned.push((id, skin));
            }
        }

        for (index, (kind, is_skinned)) in components.into_iter().enumerate() {
            let child = graph.add(id, Node::new(format!("{}_{}", name, index), kind));
            if is_skinned {
                if let Some(skin) = node.skin() {
                    skinned.push((child, skin));
                }
            }
        }
        id
    }

    fn mesh(&mut self, mesh: &gltf::Mesh, primitive: &gltf::Primitive) -> Mesh {
        let id = *self
            .geometries
            .entry((mesh.index(), primitive.index()))
            .or_insert_with(GeometryId::next);
        let bounds = primitive.bounding_box();
        let vertex_count = primitive
            .get(&gltf::Semantic::Positions)
            .map_or(0, |accessor| accessor.count());
        Mesh {
            geometry: Geometry {
                id,
                bounds: Aabb::new(Vec3::from_array(bounds.min), Vec3::from_array(bounds.max)),
                vertex_count,
            },
            material: self.material(&primitive.material()),
            skin: None,
        }
    }

    fn material(&self, material: &gltf::Material) -> Material {
        let mut out = Material::new(material.name().unwrap_or("default"));
        out.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;
        out.double_sided = material.double_sided();
        let texture = |index: usize, encoding: TextureEncoding| {
            self.textures.get(index).cloned().map(|mut texture| {
                texture.encoding = encoding;
                texture
            })
        };
        let pbr = material.pbr_metallic_roughness();
        out.maps.base_color = pbr
            .base_color_texture()
            .and_then(|info| texture(info.texture().index(), TextureEncoding::Srgb));
        out.maps.metallic_roughness = pbr
            .metallic_roughness_texture()
            .and_then(|info| texture(info.texture().index(), TextureEncoding::Linear));
        out.maps.emissive = material
            .emissive_texture()
            .and_then(|info| texture(info.texture().index(), TextureEncoding::Srgb));
        out.maps.normal = material
            .normal_texture()
            .and_then(|info| texture(info.texture().index(), TextureEncoding::Linear));
        out.maps.occlusion = material
            .occlusion_texture()
            .and_then(|info| texture(info.texture().index(), TextureEncoding::Linear));
        out
    }
}

fn camera_from(camera: &gltf::Camera) -> Camera {
    match camera.projection() {
        gltf::camera::Projection::Perspective(perspective) => {
            Camera::Perspective(PerspectiveCamera::new(
                perspective.yfov().to_degrees(),
                perspective.aspect_ratio().unwrap_or(1.0),
                perspective.znear(),
                perspective.zfar().unwrap_or(INFINITE_FAR),
            ))
        }
        gltf::camera::Projection::Orthographic(orthographic) => {
            Camera::Orthographic(OrthographicCamera {
                xmag: orthographic.xmag(),
                ymag: orthographic.ymag(),
                near: orthographic.znear(),
                far: orthographic.zfar(),
            })
        }
    }
}

fn light_from(light: &gltf::khr_lights_punctual::Light) -> Light {
    let kind = match light.kind() {
        gltf::khr_lights_punctual::Kind::Directional => LightKind::Directional,
        gltf::khr_lights_punctual::Kind::Point => LightKind::Point {
            range: light.range(),
        },
        gltf::khr_lights_punctual::Kind::Spot {
            inner_cone_angle,
            outer_cone_angle,
        } => LightKind::Spot {
            range: light.range(),
            inner_cone: inner_cone_angle,
            outer_cone: outer_cone_angle,
        },
    };
    Light {
        kind,
        color: Color::from_rgb(light.color()),
        intensity: light.intensity(),
    }
}

/// Bytes of a buffer view, or `None` when the view runs past its buffer.
fn view_bytes(
    buffers: &[Arc<[u8]>],
    buffer: usize,
    offset: usize,
    length: usize,
) -> Option<Arc<[u8]>> {
    let end = offset.checked_add(length)?;
    buffers
        .get(buffer)
        .and_then(|data| data.get(offset..end))
        .map(Arc::<[u8]>::from)
}

fn read_animation(animation: &gltf::Animation, buffers: &[Arc<[u8]>]) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));
    let mut channels = Vec::new();
    for channel in animation.channels() {
        let target = channel.target();
        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };
        let values = match (target.property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                Keyframes::Translation(spline_values(values.map(Vec3::from_array), cubic))
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                Keyframes::Scale(spline_values(values.map(Vec3::from_array), cubic))
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                let rotations = values.into_f32().map(|value| {
                    let quat = Quat::from_array(value);
                    if quat.length_squared() > 0.0 {
                        quat.normalize()
                    } else {
                        Quat::IDENTITY
                    }
                });
                Keyframes::Rotation(spline_values(rotations, cubic))
            }
            _ => {
                log::debug!(
                    "Animation '{}': skipping morph target channel on node {}",
                    name,
                    target.node().index()
                );
                continue;
            }
        };
        if values.len() != times.len() {
            log::warn!(
                "Animation '{}': channel on node {} has {} keys for {} times, skipped",
                name,
                target.node().index(),
                values.len(),
                times.len()
            );
            continue;
        }
        channels.push(Channel {
            target: target.node().index(),
            times,
            values,
            interpolation,
        });
    }
    AnimationClip::new(name, channels)
}

/// Cubic-spline outputs come as (in-tangent, value, out-tangent) triplets; keep the values.
fn spline_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if !cubic {
        return values.collect();
    }
    values
        .enumerate()
        .filter(|(index, _)| index % 3 == 1)
        .map(|(_, value)| value)
        .collect()
}
